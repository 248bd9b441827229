// src/config/validate.rs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SupervisorError};
use crate::supervisor::classify::EXIT_COMMAND_NOT_FOUND;

static ENV_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name pattern is valid")
});

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.defaults, raw.command))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_commands(cfg)?;
    validate_env_names("[defaults]", &cfg.defaults.env)?;
    for (name, cmd) in cfg.command.iter() {
        if cmd.cmd.trim().is_empty() {
            return Err(SupervisorError::ConfigError(format!(
                "command '{}' has an empty `cmd`",
                name
            )));
        }
        validate_env_names(&format!("[command.{}]", name), &cmd.env)?;
        validate_exit_codes(name, &cmd.parsed_exit_codes()?)?;
    }
    Ok(())
}

fn ensure_has_commands(cfg: &RawConfigFile) -> Result<()> {
    if cfg.command.is_empty() {
        return Err(SupervisorError::ConfigError(
            "config must contain at least one [command.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_env_names(section: &str, env: &BTreeMap<String, String>) -> Result<()> {
    for key in env.keys() {
        if !ENV_NAME.is_match(key) {
            return Err(SupervisorError::ConfigError(format!(
                "{} has invalid environment variable name '{}'",
                section, key
            )));
        }
    }
    Ok(())
}

fn validate_exit_codes(name: &str, codes: &BTreeMap<u8, String>) -> Result<()> {
    for code in codes.keys() {
        if *code == 0 {
            return Err(SupervisorError::ConfigError(format!(
                "command '{}' maps exit code 0, which always means success",
                name
            )));
        }
        if i32::from(*code) == EXIT_COMMAND_NOT_FOUND {
            return Err(SupervisorError::ConfigError(format!(
                "command '{}' maps exit code 127, which is reserved for command-not-found",
                name
            )));
        }
    }
    Ok(())
}
