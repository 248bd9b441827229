// src/supervisor/spawn.rs

//! Building the OS process for a [`CommandSpec`].

use std::io;
use std::process::Stdio;

use nix::unistd::setsid;
use tokio::process::{Child, Command};

use crate::command::CommandSpec;

/// `shell -c <command line>` in the command's directory and environment.
///
/// The child:
/// - gets `env_clear()` followed by the command's variables only.
/// - has all three standard streams piped; `spawn` fails as a whole if any
///   pipe can't be created.
/// - leads a new session, so its pgid equals its pid and the whole group
///   can be signalled.
/// - is killed if the handle is dropped before it's reaped.
pub(crate) fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(spec.shell());
    cmd.arg("-c")
        .arg(spec.command_line())
        .current_dir(spec.working_dir())
        .env_clear()
        .envs(spec.env())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // SAFETY: the closure runs in the forked child before exec and only
    // calls setsid(2), which is async-signal-safe.
    unsafe {
        cmd.pre_exec(|| setsid().map(|_| ()).map_err(io::Error::from));
    }

    cmd
}

pub(crate) fn spawn(spec: &CommandSpec) -> io::Result<Child> {
    build_command(spec).spawn()
}
