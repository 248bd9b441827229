// src/command/spec.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::command::CommandSpecBuilder;
use crate::errors::CustomExitError;

/// Interpreter used when a spec doesn't name one. It has to understand
/// `source`, which init sources are rendered with.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Immutable description of one shell invocation.
///
/// Built once through [`CommandSpec::builder`] and then shared read-only
/// (as `Arc<CommandSpec>`) with every event the run produces.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub(crate) shell: PathBuf,
    pub(crate) working_dir: PathBuf,
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) sources: Vec<PathBuf>,
    pub(crate) exit_codes: BTreeMap<u8, CustomExitError>,
    pub(crate) stream_to_console: bool,
    pub(crate) check_executable: bool,
}

impl CommandSpec {
    pub fn builder() -> CommandSpecBuilder {
        CommandSpecBuilder::default()
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn exit_codes(&self) -> &BTreeMap<u8, CustomExitError> {
        &self.exit_codes
    }

    pub fn stream_to_console(&self) -> bool {
        self.stream_to_console
    }

    pub fn check_executable(&self) -> bool {
        self.check_executable
    }

    /// Caller-defined error for a process exit code, if one is mapped.
    ///
    /// Codes outside `0..=255` never match.
    pub fn custom_error(&self, code: i32) -> Option<&CustomExitError> {
        u8::try_from(code)
            .ok()
            .and_then(|code| self.exit_codes.get(&code))
    }

    /// The string handed to `shell -c`.
    ///
    /// Sources come first, each as `source <path> && `, then the command and
    /// its arguments joined by single spaces. Nothing is escaped: shell
    /// metacharacters in arguments are interpreted by the shell.
    pub fn command_line(&self) -> String {
        let mut line = render_sources(&self.sources);
        line.push_str(&self.command);
        if !self.args.is_empty() {
            line.push(' ');
            line.push_str(&self.args.join(" "));
        }
        line
    }
}

pub(crate) fn render_sources(sources: &[PathBuf]) -> String {
    sources
        .iter()
        .map(|path| format!("source {} && ", path.display()))
        .collect()
}
