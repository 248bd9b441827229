// src/lib.rs

#[cfg(not(unix))]
compile_error!("procvisor relies on POSIX sessions and process groups");

pub mod cli;
pub mod command;
pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod resolver;
pub mod supervisor;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{Action, CliArgs, ExecArgs};
use crate::command::{CommandSpec, Environment};
use crate::config::{config_root_dir, load_and_validate};
use crate::events::{ExitEvent, OutputEvent, OutputStream};
use crate::resolver::ResolveContext;
use crate::supervisor::Supervisor;

pub use crate::command::CommandSpecBuilder;
pub use crate::errors::SupervisorError;
pub use crate::events::{EventKind, Handler};
pub use crate::supervisor::RunSummary;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.action {
        Action::Run { names, dry_run } => run_named(&args.config, &names, dry_run).await,
        Action::Exec(exec) => run_exec(exec).await,
        Action::Which {
            name,
            cwd,
            sources,
            shell,
        } => {
            let mut ctx = ResolveContext {
                env: Environment::inherit().into_map(),
                sources,
                cwd,
                ..ResolveContext::default()
            };
            if let Some(shell) = shell {
                ctx.shell = shell;
            }
            let path = resolver::resolve(&name, &ctx).await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Run commands from the command file one after another.
///
/// Stops at the first failure, and also after a command that ended because
/// an interrupt was relayed to it.
async fn run_named(config: &str, names: &[String], dry_run: bool) -> Result<()> {
    let config_path = PathBuf::from(config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading command file {}", config_path.display()))?;
    let base_dir = config_root_dir(&config_path);

    let specs = names
        .iter()
        .map(|name| cfg.spec_for(name, &base_dir).map(|spec| (name.as_str(), spec)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if dry_run {
        print_dry_run(&specs);
        return Ok(());
    }

    for (name, spec) in specs {
        info!(command = %name, "running");
        let summary = logged_supervisor(name, spec).run_summary().await?;
        if summary.interrupted {
            warn!(command = %name, "interrupted; skipping remaining commands");
            break;
        }
    }

    Ok(())
}

async fn run_exec(exec: ExecArgs) -> Result<()> {
    let mut env = if exec.inherit_env {
        Environment::inherit()
    } else {
        Environment::new()
    };
    for (k, v) in exec.env {
        env.insert(k, v);
    }

    let mut builder = CommandSpec::builder()
        .command(exec.command.as_str())
        .args(exec.args)
        .environment(&env)
        .sources(exec.sources)
        .stream_to_console(exec.stream)
        .check_executable(exec.check);
    if let Some(shell) = exec.shell {
        builder = builder.shell(shell);
    }
    if let Some(cwd) = exec.cwd {
        builder = builder.working_dir(cwd);
    }

    let spec = builder.build()?;
    let name = spec.command().to_string();
    logged_supervisor(&name, spec).run_summary().await?;
    Ok(())
}

/// Supervisor that reports through `tracing`.
///
/// Output lines are logged unless the command already echoes them.
fn logged_supervisor(name: &str, spec: CommandSpec) -> Supervisor {
    let echo = spec.stream_to_console();
    let mut supervisor = Supervisor::new(spec);

    if !echo {
        let label = name.to_string();
        supervisor = supervisor.on_output(move |ev: &OutputEvent| {
            match ev.stream {
                OutputStream::Stdout => info!(command = %label, "{}", ev.line),
                OutputStream::Stderr => warn!(command = %label, "{}", ev.line),
            }
            Ok(())
        });
    }

    let label = name.to_string();
    supervisor.on_exit(move |ev: &ExitEvent| {
        if ev.succeeded {
            info!(command = %label, "finished");
        } else {
            warn!(
                command = %label,
                exit_code = ev.exit_code,
                diagnostic = ev.error.as_deref().unwrap_or(""),
                "failed"
            );
        }
        Ok(())
    })
}

/// Dry-run output: print each command and how it would be invoked.
fn print_dry_run(specs: &[(&str, CommandSpec)]) {
    println!("procvisor dry-run");
    for (name, spec) in specs {
        println!("  - {name}");
        println!(
            "      {} -c {:?}",
            spec.shell().display(),
            spec.command_line()
        );
        println!("      cwd: {}", spec.working_dir().display());
        if !spec.env().is_empty() {
            println!("      env: {} variable(s)", spec.env().len());
        }
        if spec.stream_to_console() {
            println!("      stream: true");
        }
        if spec.check_executable() {
            println!("      check_executable: true");
        }
        for (code, err) in spec.exit_codes() {
            println!("      exit {code}: {err}");
        }
    }
}
