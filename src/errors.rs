// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Every failure of a supervised run surfaces synchronously from
//! [`Supervisor::run`](crate::supervisor::Supervisor::run) as one
//! [`SupervisorError`]. The command-file layer reuses the same enum so the
//! binary only has one error type to report.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use thiserror::Error;

use crate::events::EventKind;
use crate::resolver::ResolveError;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("cannot resolve working directory{}: {source}", display_opt_path(.path))]
    WorkingDirectoryUnresolvable {
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    #[error("cannot register a {got} handler as the {expected} handler")]
    UnrecognizedHandlerKind { expected: EventKind, got: EventKind },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("command not executable: {command} ({})", .path.display())]
    NotExecutable { command: String, path: PathBuf },

    #[error("command exited with code {code}: {error}")]
    CustomExitCode {
        code: u8,
        #[source]
        error: CustomExitError,
    },

    #[error("error running command `{command}`: {reason}")]
    RunFailed {
        command: String,
        #[source]
        reason: RunFailure,
    },

    #[error("{kind} handler failed: {source}")]
    HandlerFailed {
        kind: EventKind,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl SupervisorError {
    /// Exit code of the child process behind this error, when there was one.
    ///
    /// Processes killed by a signal have no code and yield `None`.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SupervisorError::CommandNotFound { .. } => Some(127),
            SupervisorError::CustomExitCode { code, .. } => Some(i32::from(*code)),
            SupervisorError::RunFailed {
                reason: RunFailure::Exited(status),
                ..
            } => status.code(),
            _ => None,
        }
    }

    /// The caller's own error value for a [`SupervisorError::CustomExitCode`].
    pub fn custom_error<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            SupervisorError::CustomExitCode { error, .. } => error.downcast_ref::<E>(),
            _ => None,
        }
    }
}

fn display_opt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" {}", p.display()),
        None => String::new(),
    }
}

/// What went wrong underneath a [`SupervisorError::RunFailed`].
#[derive(Error, Debug)]
pub enum RunFailure {
    #[error("{0}")]
    Exited(ExitStatus),

    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to wait for process: {0}")]
    Wait(#[source] io::Error),

    #[error("failed to listen for signals: {0}")]
    Signals(#[source] io::Error),
}

/// A caller-defined error attached to a specific exit code.
///
/// Cheap to clone: the same value is handed out on every run of the
/// [`CommandSpec`](crate::command::CommandSpec) that owns it.
#[derive(Clone)]
pub struct CustomExitError(Arc<dyn StdError + Send + Sync + 'static>);

impl CustomExitError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Wrap a plain message, as used by the command file.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(ExitMessage(message.into()))
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for CustomExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for CustomExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for CustomExitError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Plain-text custom exit error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ExitMessage(pub String);

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SupervisorError>;
