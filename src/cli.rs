// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `procvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procvisor",
    version,
    about = "Run shell commands under supervision: streamed output, signal relay, typed exit codes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the command file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Procvisor.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    /// Run named commands from the command file, in order, stopping at the
    /// first failure.
    Run {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,

        /// Print the assembled command lines without running anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run an ad-hoc command.
    Exec(ExecArgs),

    /// Print where a command resolves to.
    Which {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        #[arg(long = "source", value_name = "PATH")]
        sources: Vec<PathBuf>,

        #[arg(long, value_name = "PATH")]
        shell: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
    #[arg(long, value_name = "PATH")]
    pub shell: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Environment variable for the command, as KEY=VALUE.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Pass the current environment through to the command.
    #[arg(long)]
    pub inherit_env: bool,

    /// File to `source` before the command; repeatable.
    #[arg(long = "source", value_name = "PATH")]
    pub sources: Vec<PathBuf>,

    /// Echo command output instead of logging it.
    #[arg(long)]
    pub stream: bool,

    /// Resolve the command before running it.
    #[arg(long)]
    pub check: bool,

    #[arg(value_name = "CMD", required = true)]
    pub command: String,

    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("invalid KEY=VALUE: no `=` found in '{s}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
