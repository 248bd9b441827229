// src/resolver.rs

//! Executable lookup.
//!
//! Answers "can this command be run?" in the same context the command would
//! run in: the command's shell, environment, init sources and working directory.
//! A name containing `/` is checked directly against the working directory;
//! anything else is looked up with the shell's own `command -v`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use nix::errno::Errno;
use nix::unistd::{AccessFlags, access};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::command::spec::render_sources;
use crate::command::{CommandSpec, DEFAULT_SHELL};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{name}: command not found")]
    NotFound { name: String },

    #[error("{name}: {} is not executable", .path.display())]
    NotExecutable { name: String, path: PathBuf },

    #[error("looking up {name} failed: {source}")]
    Lookup {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Where and how to look a command up.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub shell: PathBuf,
    pub env: BTreeMap<String, String>,
    pub sources: Vec<PathBuf>,
    pub cwd: Option<PathBuf>,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            env: BTreeMap::new(),
            sources: Vec::new(),
            cwd: None,
        }
    }
}

impl ResolveContext {
    pub fn from_spec(spec: &CommandSpec) -> Self {
        Self {
            shell: spec.shell().to_path_buf(),
            env: spec.env().clone(),
            sources: spec.sources().to_vec(),
            cwd: Some(spec.working_dir().to_path_buf()),
        }
    }
}

/// Resolve `name` to something runnable.
///
/// Returns the absolute path for files on the search path. Shell builtins
/// and functions resolve to their bare name.
pub async fn resolve(name: &str, ctx: &ResolveContext) -> Result<PathBuf, ResolveError> {
    if name.trim().is_empty() {
        return Err(ResolveError::NotFound {
            name: name.to_string(),
        });
    }

    let candidate = if name.contains('/') {
        let path = match &ctx.cwd {
            Some(cwd) => cwd.join(name),
            None => PathBuf::from(name),
        };
        if !path.exists() {
            return Err(ResolveError::NotFound {
                name: name.to_string(),
            });
        }
        path
    } else {
        lookup_on_path(name, ctx).await?
    };

    // `command -v` prints builtins and functions without a path.
    if !candidate.is_absolute() && !name.contains('/') {
        debug!(command = %name, "resolved to a shell builtin or function");
        return Ok(candidate);
    }

    ensure_executable(name, &candidate)?;
    debug!(command = %name, path = %candidate.display(), "resolved executable");
    Ok(candidate)
}

async fn lookup_on_path(name: &str, ctx: &ResolveContext) -> Result<PathBuf, ResolveError> {
    let line = format!("{}command -v {}", render_sources(&ctx.sources), name);

    let mut cmd = Command::new(&ctx.shell);
    cmd.arg("-c")
        .arg(&line)
        .env_clear()
        .envs(&ctx.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(cwd) = &ctx.cwd {
        cmd.current_dir(cwd);
    }

    let output = cmd.output().await.map_err(|source| ResolveError::Lookup {
        name: name.to_string(),
        source,
    })?;

    match output.status.code() {
        Some(0) => {}
        Some(1) | Some(127) => {
            return Err(ResolveError::NotFound {
                name: name.to_string(),
            });
        }
        _ => {
            return Err(ResolveError::Lookup {
                name: name.to_string(),
                source: io::Error::other(format!("`command -v` ended with {}", output.status)),
            });
        }
    }

    let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if found.is_empty() {
        return Err(ResolveError::NotFound {
            name: name.to_string(),
        });
    }

    Ok(PathBuf::from(found))
}

fn ensure_executable(name: &str, path: &Path) -> Result<(), ResolveError> {
    if path.is_dir() {
        return Err(ResolveError::NotExecutable {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    match access(path, AccessFlags::X_OK) {
        Ok(()) => Ok(()),
        Err(Errno::EACCES) => Err(ResolveError::NotExecutable {
            name: name.to_string(),
            path: path.to_path_buf(),
        }),
        Err(Errno::ENOENT) => Err(ResolveError::NotFound {
            name: name.to_string(),
        }),
        Err(errno) => Err(ResolveError::Lookup {
            name: name.to_string(),
            source: io::Error::from(errno),
        }),
    }
}
