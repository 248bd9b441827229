// src/events.rs

//! Event model for supervised runs.
//!
//! A run reports two kinds of events:
//! - [`OutputEvent`]: one line read from the child's stdout or stderr.
//! - [`ExitEvent`]: the final outcome, delivered exactly once per run.
//!
//! Callers register at most one [`Handler`] per [`EventKind`]. The handler
//! enum is closed, so the kind of a handler is known when it is registered
//! rather than discovered when an event is dispatched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::command::CommandSpec;
use crate::errors::{Result, SupervisorError};

/// The two event kinds a supervisor can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Output,
    Exit,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Output => f.write_str("output"),
            EventKind::Exit => f.write_str("exit"),
        }
    }
}

/// Which standard stream a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// One line of output, trailing newline stripped.
#[derive(Debug, Clone)]
pub struct OutputEvent {
    pub line: String,
    pub stream: OutputStream,
    pub spec: Arc<CommandSpec>,
}

/// Final outcome of a run.
#[derive(Debug, Clone)]
pub struct ExitEvent {
    pub succeeded: bool,
    /// `0` on success, `-1` when the process was killed by a signal.
    pub exit_code: i32,
    pub spec: Arc<CommandSpec>,
    /// Diagnostic text captured on failure: whatever stdout nothing else
    /// consumed during the run.
    pub error: Option<String>,
}

impl ExitEvent {
    pub(crate) fn success(spec: Arc<CommandSpec>) -> Self {
        Self {
            succeeded: true,
            exit_code: 0,
            spec,
            error: None,
        }
    }

    pub(crate) fn failure(spec: Arc<CommandSpec>, exit_code: i32, error: String) -> Self {
        Self {
            succeeded: false,
            exit_code,
            spec,
            error: Some(error),
        }
    }
}

pub type OutputHandler = Arc<dyn Fn(&OutputEvent) -> anyhow::Result<()> + Send + Sync>;
pub type ExitHandler = Arc<dyn Fn(&ExitEvent) -> anyhow::Result<()> + Send + Sync>;

/// A callback for one event kind.
#[derive(Clone)]
pub enum Handler {
    Output(OutputHandler),
    Exit(ExitHandler),
}

impl Handler {
    /// Output handler, called once per line.
    ///
    /// It runs synchronously on the stream's reader task, inside the tokio
    /// runtime. While it runs, that stream is not read and the worker thread
    /// is occupied; on a `current_thread` runtime the whole run waits for it.
    /// Keep it short, or hand the line to a channel and do slow work
    /// (disk writes, contended locks) elsewhere.
    pub fn output<F>(f: F) -> Self
    where
        F: Fn(&OutputEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Handler::Output(Arc::new(f))
    }

    pub fn exit<F>(f: F) -> Self
    where
        F: Fn(&ExitEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Handler::Exit(Arc::new(f))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Handler::Output(_) => EventKind::Output,
            Handler::Exit(_) => EventKind::Exit,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

/// Registered handlers, at most one per kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct HandlerSet {
    handlers: BTreeMap<EventKind, Handler>,
}

impl HandlerSet {
    /// Register `handler` for `kind`, replacing any earlier registration.
    pub(crate) fn register(&mut self, kind: EventKind, handler: Handler) -> Result<()> {
        if handler.kind() != kind {
            return Err(SupervisorError::UnrecognizedHandlerKind {
                expected: kind,
                got: handler.kind(),
            });
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    /// Register `handler` under its own kind.
    pub(crate) fn insert(&mut self, handler: Handler) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub(crate) fn output(&self) -> Option<OutputHandler> {
        match self.handlers.get(&EventKind::Output) {
            Some(Handler::Output(h)) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    pub(crate) fn exit(&self) -> Option<ExitHandler> {
        match self.handlers.get(&EventKind::Exit) {
            Some(Handler::Exit(h)) => Some(Arc::clone(h)),
            _ => None,
        }
    }
}
