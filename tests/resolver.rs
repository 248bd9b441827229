// tests/resolver.rs
mod common;
use crate::common::builders::{TestExitError, spec};
use crate::common::{Recorder, init_tracing, with_timeout};

use std::error::Error;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use procvisor::command::CommandSpec;
use procvisor::errors::SupervisorError;
use procvisor::resolver::{ResolveContext, ResolveError, resolve};
use procvisor::supervisor::Supervisor;
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn write_file(path: &std::path::Path, contents: &str, mode: u32) -> TestResult {
    std::fs::write(path, contents)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[tokio::test]
async fn program_on_the_default_path_resolves_to_an_absolute_path() -> TestResult {
    init_tracing();

    let path = resolve("sh", &ResolveContext::default()).await?;

    assert!(path.is_absolute(), "{} is not absolute", path.display());
    assert!(path.exists());
    Ok(())
}

#[tokio::test]
async fn shell_builtin_resolves_to_its_name() -> TestResult {
    init_tracing();

    let path = resolve("cd", &ResolveContext::default()).await?;

    assert_eq!(path, PathBuf::from("cd"));
    Ok(())
}

#[tokio::test]
async fn unknown_program_is_not_found() {
    init_tracing();

    let err = resolve("definitely-not-a-real-command-4f2a", &ResolveContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn relative_path_is_checked_against_cwd() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    write_file(&dir.path().join("run.sh"), "#!/bin/sh\necho ran\n", 0o755)?;
    write_file(&dir.path().join("data.txt"), "just data\n", 0o644)?;

    let ctx = ResolveContext {
        cwd: Some(dir.path().to_path_buf()),
        ..ResolveContext::default()
    };

    let path = resolve("./run.sh", &ctx).await?;
    assert_eq!(path, dir.path().join("./run.sh"));

    let err = resolve("./data.txt", &ctx).await.unwrap_err();
    assert!(matches!(err, ResolveError::NotExecutable { .. }), "got {err:?}");

    let err = resolve("./missing.sh", &ctx).await.unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn lookup_sees_the_spec_environment() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let bin = dir.path().join("bin");
    std::fs::create_dir(&bin)?;
    write_file(&bin.join("only-here-7c1d"), "#!/bin/sh\nexit 0\n", 0o755)?;

    let cmd = CommandSpec::builder()
        .command("only-here-7c1d")
        .env("PATH", format!("{}:/usr/bin:/bin", bin.display()))
        .build()?;

    let path = resolve(cmd.command(), &ResolveContext::from_spec(&cmd)).await?;
    assert_eq!(path, bin.join("only-here-7c1d"));
    Ok(())
}

#[tokio::test]
async fn preflight_stops_missing_commands_before_spawning() {
    init_tracing();

    let rec = Recorder::new();
    let supervisor = rec.attach_exit(Supervisor::new(spec(
        CommandSpec::builder()
            .command("definitely-not-a-real-command-4f2a")
            .exit_code(1, TestExitError("unused"))
            .check_executable(true),
    )));

    let err = with_timeout(supervisor.run()).await.unwrap_err();

    assert!(
        matches!(err, SupervisorError::CommandNotFound { .. }),
        "expected CommandNotFound, got {err:?}"
    );
    assert!(rec.exits().is_empty(), "nothing was spawned, so nothing exited");
}

#[tokio::test]
async fn preflight_rejects_non_executable_files() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    write_file(&dir.path().join("data.txt"), "just data\n", 0o644)?;

    let supervisor = Supervisor::new(spec(
        CommandSpec::builder()
            .command("./data.txt")
            .working_dir(dir.path())
            .check_executable(true),
    ));

    let err = with_timeout(supervisor.run()).await.unwrap_err();

    assert!(
        matches!(err, SupervisorError::NotExecutable { .. }),
        "expected NotExecutable, got {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn preflight_passes_for_runnable_commands() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(spec(
        CommandSpec::builder()
            .command("true")
            .check_executable(true),
    ));

    with_timeout(supervisor.run()).await?;
    Ok(())
}
