// src/supervisor/mod.rs

//! Process supervision.
//!
//! A [`Supervisor`] owns exactly one run of one [`CommandSpec`]:
//!
//! 1. optional preflight through the [`resolver`](crate::resolver),
//! 2. arm signal listeners, then spawn `shell -c <line>` in a new session,
//! 3. start one [`pump`] per output stream and the signal [`relay`], all in
//!    a single `JoinSet`,
//! 4. wait for the child, give the pumps a bounded window to drain, then
//!    stop the relay and join every task,
//! 5. [`classify`] the exit status and deliver the exit event.
//!
//! `run` consumes the supervisor, so a second run is impossible by
//! construction. Dropping the `run` future aborts the tasks and kills the
//! child.

pub mod classify;
pub(crate) mod pump;
pub(crate) mod relay;
pub(crate) mod spawn;

use std::sync::Arc;

use nix::unistd::Pid;
use tokio::sync::{oneshot, watch};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::command::CommandSpec;
use crate::errors::{Result, RunFailure, SupervisorError};
use crate::events::{EventKind, ExitEvent, ExitHandler, Handler, HandlerSet, OutputEvent, OutputStream};
use crate::resolver::{self, ResolveContext, ResolveError};

use self::classify::{Disposition, classify, reported_code};
use self::pump::{DRAIN_WINDOW, Pump, PumpReport};
use self::relay::SignalRelay;

/// Summary of a run that ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Raw exit code of the child; `-1` if it died of a signal.
    pub exit_code: i32,
    /// The child stopped because an interrupt was relayed to it.
    pub interrupted: bool,
    /// Lines read across both streams.
    pub lines: usize,
}

/// Spawns, monitors and reports on one process.
#[derive(Debug)]
pub struct Supervisor {
    spec: Arc<CommandSpec>,
    handlers: HandlerSet,
}

enum TaskReport {
    Pump(PumpReport),
    Relay(bool),
}

#[derive(Default)]
struct Joined {
    pumps: Vec<PumpReport>,
    relayed: bool,
}

impl Joined {
    fn captured_stdout(&self) -> String {
        self.pumps
            .iter()
            .filter(|p| p.stream == OutputStream::Stdout)
            .map(|p| p.captured.as_str())
            .collect()
    }

    fn lines(&self) -> usize {
        self.pumps.iter().map(|p| p.lines).sum()
    }

    fn take_handler_error(&mut self) -> Option<anyhow::Error> {
        self.pumps.iter_mut().find_map(|p| p.handler_error.take())
    }

    /// Record one joined task; returns whether it was an output pump.
    fn record(
        &mut self,
        res: std::result::Result<(task::Id, TaskReport), JoinError>,
        relay: Option<task::Id>,
    ) -> bool {
        match res {
            Ok((_, TaskReport::Pump(report))) => {
                self.pumps.push(report);
                true
            }
            Ok((_, TaskReport::Relay(relayed))) => {
                self.relayed |= relayed;
                false
            }
            Err(e) => {
                warn!(error = %e, "supervisor task did not complete");
                Some(e.id()) != relay
            }
        }
    }
}

impl Supervisor {
    pub fn new(spec: CommandSpec) -> Self {
        Self::from_shared(Arc::new(spec))
    }

    pub fn from_shared(spec: Arc<CommandSpec>) -> Self {
        Self {
            spec,
            handlers: HandlerSet::default(),
        }
    }

    pub fn spec(&self) -> &Arc<CommandSpec> {
        &self.spec
    }

    /// Register `handler` for `kind`, replacing any earlier one.
    ///
    /// Fails with [`SupervisorError::UnrecognizedHandlerKind`] if the
    /// handler is not of that kind.
    pub fn register_handler(&mut self, kind: EventKind, handler: Handler) -> Result<()> {
        self.handlers.register(kind, handler)
    }

    /// Set the output handler. See [`Handler::output`] for where it runs.
    pub fn on_output<F>(mut self, f: F) -> Self
    where
        F: Fn(&OutputEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(Handler::output(f));
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExitEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(Handler::exit(f));
        self
    }

    /// Run the command to completion.
    pub async fn run(self) -> Result<()> {
        self.run_summary().await.map(|_| ())
    }

    /// Run the command to completion and describe how it ended.
    pub async fn run_summary(self) -> Result<RunSummary> {
        let spec = Arc::clone(&self.spec);
        let command_line = spec.command_line();

        if spec.check_executable() {
            preflight(&spec).await?;
        }

        let relay = SignalRelay::arm().map_err(|e| SupervisorError::RunFailed {
            command: command_line.clone(),
            reason: RunFailure::Signals(e),
        })?;

        let mut child = spawn::spawn(&spec).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SupervisorError::CommandNotFound {
                    command: spec.shell().display().to_string(),
                }
            } else {
                SupervisorError::RunFailed {
                    command: command_line.clone(),
                    reason: RunFailure::Spawn(e),
                }
            }
        })?;

        let pid = child.id();
        info!(
            command = %command_line,
            pid,
            cwd = %spec.working_dir().display(),
            "started command"
        );

        // Held open for the lifetime of the child, closed once it's reaped.
        let stdin = child.stdin.take();

        let mut tasks: JoinSet<TaskReport> = JoinSet::new();
        let output_handler = self.handlers.output();
        let (stop_tx, stop_rx) = watch::channel(false);

        if let Some(stdout) = child.stdout.take() {
            let mut pump = Pump::new(stdout, OutputStream::Stdout, Arc::clone(&spec))
                .deliver_to(output_handler.clone())
                .stop_on(stop_rx.clone());
            if spec.stream_to_console() {
                pump = pump.echo_to(Box::new(tokio::io::stdout()));
            }
            tasks.spawn(async move { TaskReport::Pump(pump.run().await) });
        }

        if let Some(stderr) = child.stderr.take() {
            let mut pump = Pump::new(stderr, OutputStream::Stderr, Arc::clone(&spec))
                .deliver_to(output_handler)
                .stop_on(stop_rx);
            if spec.stream_to_console() {
                pump = pump.echo_to(Box::new(tokio::io::stderr()));
            }
            tasks.spawn(async move { TaskReport::Pump(pump.run().await) });
        }

        let pumps = tasks.len();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let relay_id = match pid.and_then(|id| i32::try_from(id).ok()) {
            Some(raw) => {
                let pgid = Pid::from_raw(raw);
                let handle = tasks
                    .spawn(async move { TaskReport::Relay(relay.run(pgid, shutdown_rx).await) });
                Some(handle.id())
            }
            None => {
                warn!(command = %command_line, "child has no pid; signals will not be relayed");
                drop(relay);
                None
            }
        };

        let waited = child.wait().await;
        drop(stdin);

        let mut joined = Joined::default();
        drain_pumps(&mut tasks, &mut joined, pumps, relay_id, &stop_tx).await;

        // Signals stay relayed until the pumps are done.
        let _ = shutdown_tx.send(());
        join_all(&mut tasks, &mut joined, relay_id).await;
        if joined.pumps.iter().any(|p| p.stopped_early) {
            warn!(
                command = %command_line,
                "output still held open by a descendant; later output was not read"
            );
        }

        let status = waited.map_err(|e| SupervisorError::RunFailed {
            command: command_line.clone(),
            reason: RunFailure::Wait(e),
        })?;

        let disposition = classify(&status, joined.relayed, &spec);
        let exit_code = reported_code(&status);
        info!(
            command = %command_line,
            exit_code,
            success = disposition.is_success(),
            interrupted = matches!(disposition, Disposition::Interrupted),
            "command exited"
        );

        let exit_handler = self.handlers.exit();

        if disposition.is_success() {
            emit_exit(exit_handler.as_ref(), ExitEvent::success(Arc::clone(&spec)))?;

            if let Some(source) = joined.take_handler_error() {
                return Err(SupervisorError::HandlerFailed {
                    kind: EventKind::Output,
                    source,
                });
            }

            return Ok(RunSummary {
                exit_code,
                interrupted: matches!(disposition, Disposition::Interrupted),
                lines: joined.lines(),
            });
        }

        emit_exit(
            exit_handler.as_ref(),
            ExitEvent::failure(Arc::clone(&spec), exit_code, joined.captured_stdout()),
        )?;

        Err(match disposition {
            Disposition::CommandNotFound => SupervisorError::CommandNotFound {
                command: spec.command().to_string(),
            },
            Disposition::Custom(code, error) => SupervisorError::CustomExitCode { code, error },
            _ => SupervisorError::RunFailed {
                command: command_line,
                reason: RunFailure::Exited(status),
            },
        })
    }
}

async fn preflight(spec: &CommandSpec) -> Result<()> {
    let ctx = ResolveContext::from_spec(spec);
    match resolver::resolve(spec.command(), &ctx).await {
        Ok(path) => {
            debug!(command = %spec.command(), path = %path.display(), "preflight passed");
            Ok(())
        }
        Err(ResolveError::NotFound { name }) => Err(SupervisorError::CommandNotFound { command: name }),
        Err(ResolveError::NotExecutable { name, path }) => {
            Err(SupervisorError::NotExecutable { command: name, path })
        }
        Err(e) => Err(SupervisorError::Resolve(e)),
    }
}

/// Join the `pumps` pump tasks once the child is gone.
///
/// A descendant that inherited the child's stdout or stderr keeps the pipe
/// open after the child exits. Pumps still reading after [`DRAIN_WINDOW`]
/// are told to stop and report what they have.
async fn drain_pumps(
    tasks: &mut JoinSet<TaskReport>,
    joined: &mut Joined,
    pumps: usize,
    relay: Option<task::Id>,
    stop: &watch::Sender<bool>,
) {
    let deadline = tokio::time::sleep(DRAIN_WINDOW);
    tokio::pin!(deadline);
    let mut remaining = pumps;
    let mut stop_sent = false;

    while remaining > 0 {
        tokio::select! {
            next = tasks.join_next_with_id() => match next {
                Some(res) => {
                    if joined.record(res, relay) {
                        remaining -= 1;
                    }
                }
                None => break,
            },
            () = &mut deadline, if !stop_sent => {
                debug!(
                    remaining,
                    window = ?DRAIN_WINDOW,
                    "drain window elapsed; stopping readers"
                );
                stop.send_replace(true);
                stop_sent = true;
            }
        }
    }
}

/// Join every remaining task, whatever state it ended in.
async fn join_all(tasks: &mut JoinSet<TaskReport>, joined: &mut Joined, relay: Option<task::Id>) {
    while let Some(res) = tasks.join_next_with_id().await {
        joined.record(res, relay);
    }
}

fn emit_exit(handler: Option<&ExitHandler>, event: ExitEvent) -> Result<()> {
    let Some(handler) = handler else {
        return Ok(());
    };
    handler(&event).map_err(|source| SupervisorError::HandlerFailed {
        kind: EventKind::Exit,
        source,
    })
}
