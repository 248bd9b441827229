// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::command::{CommandSpec, Environment};
use crate::errors::{CustomExitError, Result, SupervisorError};

/// Command file as read from TOML, before validation.
///
/// ```toml
/// [defaults]
/// shell = "/bin/bash"
/// inherit_env = true
///
/// [command.install]
/// cmd = "yarn"
/// args = ["install", "--production=false"]
/// stream = true
///
/// [command.install.exit_codes]
/// 2 = "lockfile out of date"
/// ```
///
/// All sections are optional at parse time; validation requires at least
/// one command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Options shared by every command, from `[defaults]`.
    #[serde(default)]
    pub defaults: DefaultSection,

    /// All commands from `[command.<name>]`, keyed by name.
    #[serde(default)]
    pub command: BTreeMap<String, CommandConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultSection {
    #[serde(default)]
    pub shell: Option<PathBuf>,

    /// Working directory; relative paths are taken from the command file's
    /// directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Start from a snapshot of the supervisor's own environment.
    #[serde(default)]
    pub inherit_env: bool,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Files sourced before every command, in order.
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Echo command output to the console.
    #[serde(default)]
    pub stream: bool,
}

/// `[command.<name>]` section.
///
/// Unset options fall back to `[defaults]`. `env` is merged over the
/// default env and `sources` are appended after the default sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    pub cmd: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub shell: Option<PathBuf>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub inherit_env: Option<bool>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub sources: Vec<PathBuf>,

    #[serde(default)]
    pub stream: Option<bool>,

    /// Resolve `cmd` before running it.
    #[serde(default)]
    pub check_executable: bool,

    /// Exit code (as a TOML key, so a string) to error message.
    #[serde(default)]
    pub exit_codes: BTreeMap<String, String>,
}

impl CommandConfig {
    /// `exit_codes` with numeric keys.
    pub fn parsed_exit_codes(&self) -> Result<BTreeMap<u8, String>> {
        self.exit_codes
            .iter()
            .map(|(key, msg)| {
                key.trim()
                    .parse::<u8>()
                    .map(|code| (code, msg.clone()))
                    .map_err(|_| {
                        SupervisorError::ConfigError(format!(
                            "exit code '{}' is not in 0..=255",
                            key
                        ))
                    })
            })
            .collect()
    }
}

/// A validated command file.
///
/// Only constructed through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub defaults: DefaultSection,
    pub command: BTreeMap<String, CommandConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        defaults: DefaultSection,
        command: BTreeMap<String, CommandConfig>,
    ) -> Self {
        Self { defaults, command }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.command.keys().map(String::as_str)
    }

    /// Build the [`CommandSpec`] for command `name`.
    ///
    /// `base_dir` anchors relative `cwd` values, normally the directory the
    /// command file lives in.
    pub fn spec_for(&self, name: &str, base_dir: &Path) -> Result<CommandSpec> {
        let cmd = self.command.get(name).ok_or_else(|| {
            SupervisorError::ConfigError(format!("unknown command '{}'", name))
        })?;
        let defaults = &self.defaults;

        let mut env = if cmd.inherit_env.unwrap_or(defaults.inherit_env) {
            Environment::inherit()
        } else {
            Environment::new()
        };
        env.merge(&defaults.env.iter().collect());
        env.merge(&cmd.env.iter().collect());

        let mut builder = CommandSpec::builder()
            .command(cmd.cmd.as_str())
            .args(cmd.args.iter().cloned())
            .environment(&env)
            .sources(defaults.sources.iter().chain(cmd.sources.iter()).cloned())
            .stream_to_console(cmd.stream.unwrap_or(defaults.stream))
            .check_executable(cmd.check_executable);

        if let Some(shell) = cmd.shell.as_ref().or(defaults.shell.as_ref()) {
            builder = builder.shell(shell.clone());
        }

        if let Some(cwd) = cmd.cwd.as_ref().or(defaults.cwd.as_ref()) {
            builder = builder.working_dir(base_dir.join(cwd));
        }

        for (code, msg) in cmd.parsed_exit_codes()? {
            builder = builder.exit_code_error(code, CustomExitError::msg(msg));
        }

        builder.build()
    }
}
