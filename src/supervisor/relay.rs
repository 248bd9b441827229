// src/supervisor/relay.rs

//! Forwarding interrupt/terminate to the child's process group.
//!
//! While at least one run is active, SIGINT and SIGTERM are caught by
//! tokio's signal listener and relayed. When the last active run ends, the
//! dispositions the host process had before the first run are put back, so
//! the host is interruptible again between runs.

use std::io;
use std::sync::{Mutex, OnceLock, PoisonError};

use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, killpg, sigaction};
use nix::unistd::Pid;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const RELAYED: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

/// Host dispositions, saved while any run is active.
struct Saved {
    runs: usize,
    host: [SigAction; 2],
}

static ACTIVE: Mutex<Option<Saved>> = Mutex::new(None);

/// tokio's installed action for each relayed signal. tokio installs it once
/// per process and never again, so it is reinstalled from here on later runs.
static LISTENER: OnceLock<[SigAction; 2]> = OnceLock::new();

/// Keeps the listener installed; the last guard dropped restores the host.
struct DispositionGuard(());

impl DispositionGuard {
    /// Must be called with the `ACTIVE` lock held, before the tokio
    /// listeners for this run are created.
    fn acquire(active: &mut Option<Saved>) -> io::Result<Self> {
        if let Some(saved) = active.as_mut() {
            saved.runs += 1;
            return Ok(Self(()));
        }

        // Park the host dispositions on SIG_IGN while tokio (possibly)
        // installs its own action, then read back whatever is there.
        let host = [swap(RELAYED[0], &ignore())?, swap(RELAYED[1], &ignore())?];
        let listener = match listener_action(&host) {
            Ok(listener) => listener,
            Err(e) => {
                restore(&host);
                return Err(e);
            }
        };
        for (sig, action) in RELAYED.iter().zip(listener.iter()) {
            if let Err(e) = swap(*sig, action) {
                restore(&host);
                return Err(e);
            }
        }

        *active = Some(Saved { runs: 1, host });
        Ok(Self(()))
    }
}

impl Drop for DispositionGuard {
    fn drop(&mut self) {
        let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(saved) = active.as_mut() else {
            return;
        };
        saved.runs -= 1;
        if saved.runs == 0 {
            restore(&saved.host);
            *active = None;
            debug!("restored host signal dispositions");
        }
    }
}

fn listener_action(host: &[SigAction; 2]) -> io::Result<[SigAction; 2]> {
    if let Some(listener) = LISTENER.get() {
        return Ok(*listener);
    }

    // Registering is what makes tokio install its process-wide action.
    drop(signal(SignalKind::interrupt())?);
    drop(signal(SignalKind::terminate())?);

    let mut listener = [ignore(); 2];
    for (i, sig) in RELAYED.iter().enumerate() {
        let current = swap(*sig, &ignore())?;
        // Still SIG_IGN: tokio had already installed its action before the
        // first run, so the host's disposition *is* tokio's action.
        listener[i] = if current.handler() == SigHandler::SigIgn {
            host[i]
        } else {
            current
        };
    }
    Ok(*LISTENER.get_or_init(|| listener))
}

fn ignore() -> SigAction {
    SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty())
}

fn swap(sig: Signal, action: &SigAction) -> io::Result<SigAction> {
    // SAFETY: `action` is SIG_IGN or an action previously returned by
    // sigaction(2) for this same signal.
    unsafe { sigaction(sig, action) }.map_err(io::Error::from)
}

fn restore(host: &[SigAction; 2]) {
    for (sig, action) in RELAYED.iter().zip(host.iter()) {
        if let Err(e) = swap(*sig, action) {
            warn!(signal = %sig, error = %e, "failed to restore signal disposition");
        }
    }
}

/// Signal listeners armed before the child is spawned.
///
/// Tokio buffers a delivery that arrives before `recv` is first polled, so
/// a signal raised between arming and spawning is not lost.
pub(crate) struct SignalRelay {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    _guard: DispositionGuard,
}

impl SignalRelay {
    pub(crate) fn arm() -> io::Result<Self> {
        let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = DispositionGuard::acquire(&mut active)?;
        drop(active);

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            _guard: guard,
        })
    }

    /// Relay SIGINT/SIGTERM until shutdown.
    ///
    /// Every delivery sends SIGINT to the whole group `pgid` (the child and
    /// any descendants it started). Returns whether at least one interrupt
    /// was delivered. Dropping the relay ends signal handling for this run.
    pub(crate) async fn run(mut self, pgid: Pid, mut shutdown: oneshot::Receiver<()>) -> bool {
        let mut relayed = false;

        loop {
            let received = tokio::select! {
                _ = &mut shutdown => break,
                Some(()) = self.interrupt.recv() => "SIGINT",
                Some(()) = self.terminate.recv() => "SIGTERM",
                else => break,
            };

            match killpg(pgid, Signal::SIGINT) {
                Ok(()) => {
                    info!(
                        pgid = pgid.as_raw(),
                        received,
                        "relayed interrupt to command process group"
                    );
                    relayed = true;
                }
                Err(Errno::ESRCH) => {
                    debug!(pgid = pgid.as_raw(), received, "command process group already gone");
                }
                Err(errno) => {
                    warn!(
                        pgid = pgid.as_raw(),
                        received,
                        error = %errno,
                        "failed to relay interrupt to command process group"
                    );
                }
            }
        }

        debug!(pgid = pgid.as_raw(), relayed, "signal relay shut down");
        relayed
    }
}
