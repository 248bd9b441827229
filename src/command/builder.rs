// src/command/builder.rs

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use crate::command::{CommandSpec, DEFAULT_SHELL, Environment};
use crate::errors::{CustomExitError, Result, SupervisorError};

/// Options for a [`CommandSpec`]. No field is required.
#[derive(Debug, Clone, Default)]
pub struct CommandSpecBuilder {
    shell: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    command: String,
    args: Vec<String>,
    env: Environment,
    sources: Vec<PathBuf>,
    exit_codes: BTreeMap<u8, CustomExitError>,
    stream_to_console: bool,
    check_executable: bool,
}

impl CommandSpecBuilder {
    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key, value);
        self
    }

    /// Merge a whole environment; later keys override earlier ones.
    pub fn environment(mut self, env: &Environment) -> Self {
        self.env.merge(env);
        self
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Map exit `code` to the caller's own `error`.
    pub fn exit_code<E>(mut self, code: u8, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.exit_codes.insert(code, CustomExitError::new(error));
        self
    }

    pub fn exit_code_error(mut self, code: u8, error: CustomExitError) -> Self {
        self.exit_codes.insert(code, error);
        self
    }

    pub fn stream_to_console(mut self, enabled: bool) -> Self {
        self.stream_to_console = enabled;
        self
    }

    /// Resolve the command on the search path before spawning it.
    pub fn check_executable(mut self, enabled: bool) -> Self {
        self.check_executable = enabled;
        self
    }

    /// Apply defaults and validate.
    ///
    /// - `shell` defaults to [`DEFAULT_SHELL`].
    /// - `working_dir` defaults to the current directory; a relative path is
    ///   made absolute against it. Either way it must be an existing
    ///   directory.
    pub fn build(self) -> Result<CommandSpec> {
        let working_dir = resolve_working_dir(self.working_dir)?;

        Ok(CommandSpec {
            shell: self.shell.unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL)),
            working_dir,
            command: self.command,
            args: self.args,
            env: self.env.into_map(),
            sources: self.sources,
            exit_codes: self.exit_codes,
            stream_to_console: self.stream_to_console,
            check_executable: self.check_executable,
        })
    }
}

fn resolve_working_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    let Some(dir) = dir else {
        return std::env::current_dir()
            .map_err(|source| SupervisorError::WorkingDirectoryUnresolvable { path: None, source });
    };

    let unresolvable = |source| SupervisorError::WorkingDirectoryUnresolvable {
        path: Some(dir.clone()),
        source,
    };

    let absolute = std::path::absolute(&dir).map_err(unresolvable)?;
    let meta = std::fs::metadata(&absolute).map_err(unresolvable)?;
    if !meta.is_dir() {
        return Err(unresolvable(io::Error::new(
            io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }

    Ok(absolute)
}
