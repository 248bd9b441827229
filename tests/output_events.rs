// tests/output_events.rs
mod common;
use crate::common::builders::{sh, spec};
use crate::common::{Recorder, init_tracing, with_timeout};

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use procvisor::command::CommandSpec;
use procvisor::errors::SupervisorError;
use procvisor::events::{EventKind, OutputEvent, OutputStream};
use procvisor::supervisor::Supervisor;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn printf_lines_are_recorded_in_order() -> TestResult {
    init_tracing();

    let cmd = CommandSpec::builder()
        .shell("/bin/sh")
        .command("printf")
        .arg(r"'a\nb\n'")
        .build()?;

    let rec = Recorder::new();
    with_timeout(rec.attach(Supervisor::new(cmd)).run()).await?;

    assert_eq!(rec.lines(), vec!["a".to_string(), "b".to_string()]);
    Ok(())
}

#[tokio::test]
async fn handler_is_called_once_per_line_in_emission_order() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let supervisor = rec.attach(Supervisor::new(spec(sh(
        "i=1; while [ $i -le 50 ]; do echo line$i; i=$((i+1)); done",
    ))));

    let summary = with_timeout(supervisor.run_summary()).await?;

    let expected: Vec<String> = (1..=50).map(|i| format!("line{i}")).collect();
    assert_eq!(rec.lines_from(OutputStream::Stdout), expected);
    assert_eq!(summary.lines, 50);
    Ok(())
}

#[tokio::test]
async fn stderr_lines_are_tagged_with_their_stream() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let supervisor = rec.attach(Supervisor::new(spec(sh(
        "echo out1; echo err1 1>&2; echo out2; echo err2 1>&2",
    ))));

    with_timeout(supervisor.run()).await?;

    assert_eq!(rec.lines_from(OutputStream::Stdout), vec!["out1", "out2"]);
    assert_eq!(rec.lines_from(OutputStream::Stderr), vec!["err1", "err2"]);
    Ok(())
}

#[tokio::test]
async fn line_endings_are_stripped_and_partial_last_line_is_delivered() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let supervisor = rec.attach(Supervisor::new(spec(sh(r"printf 'one\r\ntwo\nthree'"))));

    with_timeout(supervisor.run()).await?;

    assert_eq!(rec.lines(), vec!["one", "two", "three"]);
    Ok(())
}

#[tokio::test]
async fn output_event_carries_the_originating_spec() -> TestResult {
    init_tracing();

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen_in_handler = Arc::clone(&seen);

    let supervisor = Supervisor::new(spec(sh("echo hi"))).on_output(move |ev: &OutputEvent| {
        seen_in_handler
            .lock()
            .unwrap()
            .push(ev.spec.command_line());
        Ok(())
    });

    with_timeout(supervisor.run()).await?;

    assert_eq!(*seen.lock().unwrap(), vec!["echo hi".to_string()]);
    Ok(())
}

#[tokio::test]
async fn failing_output_handler_stops_delivery_but_not_the_process() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_handler = Arc::clone(&calls);

    let rec = Recorder::new();
    let supervisor = rec
        .attach_exit(Supervisor::new(spec(sh("echo one; echo two; echo three"))))
        .on_output(move |_ev: &OutputEvent| {
            calls_in_handler.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("refusing output")
        });

    let err = with_timeout(supervisor.run()).await.unwrap_err();

    match err {
        SupervisorError::HandlerFailed { kind, source } => {
            assert_eq!(kind, EventKind::Output);
            assert!(source.to_string().contains("refusing output"));
        }
        other => panic!("expected HandlerFailed, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "delivery stops after the first error");

    let exits = rec.exits();
    assert_eq!(exits.len(), 1);
    assert!(exits[0].succeeded, "the process itself ran to completion");
}

#[tokio::test]
async fn failing_exit_handler_is_reported_as_handler_failure() {
    init_tracing();

    let supervisor = Supervisor::new(spec(sh("true")))
        .on_exit(|_ev| anyhow::bail!("exit handler broke"));

    let err = with_timeout(supervisor.run()).await.unwrap_err();

    assert!(
        matches!(err, SupervisorError::HandlerFailed { kind: EventKind::Exit, .. }),
        "expected HandlerFailed(exit), got {err:?}"
    );
}

#[tokio::test]
async fn console_echo_and_handler_both_see_every_line() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let supervisor = rec.attach(Supervisor::new(spec(
        sh("echo alpha; echo beta 1>&2; echo gamma").stream_to_console(true),
    )));

    with_timeout(supervisor.run()).await?;

    assert_eq!(rec.lines_from(OutputStream::Stdout), vec!["alpha", "gamma"]);
    assert_eq!(rec.lines_from(OutputStream::Stderr), vec!["beta"]);
    Ok(())
}

#[tokio::test]
async fn unconsumed_output_larger_than_a_pipe_does_not_block_the_child() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(spec(sh(
        "i=0; while [ $i -lt 5000 ]; do echo xxxxxxxxxxxxxxxxxxxxxxxx; echo yyyyyyyy 1>&2; i=$((i+1)); done",
    )));

    let summary = with_timeout(supervisor.run_summary()).await?;

    assert_eq!(summary.lines, 10_000);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn slow_blocking_handler_still_sees_every_line_on_one_thread() -> TestResult {
    init_tracing();

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let supervisor = Supervisor::new(spec(sh(
        "for i in 1 2 3 4 5; do echo out$i; echo err$i >&2; done",
    )))
    .on_output(move |ev: &OutputEvent| {
        std::thread::sleep(std::time::Duration::from_millis(20));
        sink.lock().unwrap().push(ev.line.clone());
        Ok(())
    });

    with_timeout(supervisor.run()).await?;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 10);
    let stdout: Vec<_> = seen.iter().filter(|l| l.starts_with("out")).cloned().collect();
    assert_eq!(stdout, vec!["out1", "out2", "out3", "out4", "out5"]);
    Ok(())
}

#[tokio::test]
async fn background_descendant_holding_the_pipe_does_not_hang_the_run() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let supervisor = rec.attach(Supervisor::new(spec(sh("sleep 30 & echo hi"))));

    let started = std::time::Instant::now();
    with_timeout(supervisor.run()).await?;

    assert!(started.elapsed() < std::time::Duration::from_secs(8));
    assert_eq!(rec.lines(), vec!["hi"]);
    let exits = rec.exits();
    assert_eq!(exits.len(), 1);
    assert!(exits[0].succeeded);
    Ok(())
}

#[tokio::test]
async fn failure_with_lingering_descendant_reports_what_was_read() {
    init_tracing();

    let rec = Recorder::new();
    let supervisor = rec.attach_exit(Supervisor::new(spec(sh("sleep 30 & echo boom; exit 4"))));

    let err = with_timeout(supervisor.run()).await.unwrap_err();

    assert_eq!(err.exit_code(), Some(4));
    let exits = rec.exits();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].error.as_deref(), Some("boom\n"));
}
