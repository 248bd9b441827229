// src/supervisor/classify.rs

//! Turning an [`ExitStatus`] into a run outcome.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

use crate::command::CommandSpec;
use crate::errors::CustomExitError;

/// Conventional exit code of a shell whose command could not be found.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Conventional exit code of a shell whose child died of SIGINT.
const EXIT_INTERRUPTED: i32 = 128 + Signal::SIGINT as i32;

#[derive(Debug, Clone)]
pub(crate) enum Disposition {
    Success,
    /// Ended by the interrupt we relayed; not a failure.
    Interrupted,
    CommandNotFound,
    Custom(u8, CustomExitError),
    Failed,
}

impl Disposition {
    pub(crate) fn is_success(&self) -> bool {
        matches!(self, Disposition::Success | Disposition::Interrupted)
    }
}

/// Classify how the child ended.
///
/// `relayed` tells whether the supervisor forwarded an interrupt to the
/// child's group during the run. A child that then died of SIGINT (or whose
/// shell reported `128 + SIGINT`) stopped because we asked it to.
pub(crate) fn classify(status: &ExitStatus, relayed: bool, spec: &CommandSpec) -> Disposition {
    if status.success() {
        return Disposition::Success;
    }

    if relayed && interrupted(status) {
        return Disposition::Interrupted;
    }

    let Some(code) = status.code() else {
        return Disposition::Failed;
    };

    if code == EXIT_COMMAND_NOT_FOUND {
        return Disposition::CommandNotFound;
    }

    match spec.custom_error(code) {
        Some(err) => Disposition::Custom(code as u8, err.clone()),
        None => Disposition::Failed,
    }
}

fn interrupted(status: &ExitStatus) -> bool {
    status.signal() == Some(Signal::SIGINT as i32) || status.code() == Some(EXIT_INTERRUPTED)
}

/// Exit code as reported in events: `-1` for signal deaths.
pub(crate) fn reported_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
