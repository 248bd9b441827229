// src/supervisor/pump.rs

//! One reader per child stream, fanning each line out to its sinks.
//!
//! A pump owns its stream exclusively. For every line it reads it:
//! - echoes the raw bytes to the console when echo is enabled,
//! - hands the line to the output handler while that handler keeps
//!   succeeding,
//! - otherwise keeps unconsumed stdout as diagnostic text (bounded) and
//!   logs unconsumed stderr at trace level.
//!
//! The pump reads to EOF so the child never blocks on a full pipe. A
//! descendant that outlives the child can hold the pipe open indefinitely,
//! so the supervisor may ask a pump to stop early; what was read by then is
//! reported as usual.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::command::CommandSpec;
use crate::events::{OutputEvent, OutputHandler, OutputStream};

/// Upper bound on captured diagnostic stdout, in bytes.
pub(crate) const CAPTURE_LIMIT: usize = 64 * 1024;

/// How long pumps may keep reading once the child has been reaped.
pub(crate) const DRAIN_WINDOW: Duration = Duration::from_secs(2);

pub(crate) type EchoSink = Box<dyn AsyncWrite + Send + Unpin>;

/// What a pump saw by the time its stream closed.
#[derive(Debug)]
pub(crate) struct PumpReport {
    pub stream: OutputStream,
    pub lines: usize,
    pub handler_error: Option<anyhow::Error>,
    pub captured: String,
    /// Stopped on request before the stream reached EOF.
    pub stopped_early: bool,
}

pub(crate) struct Pump<R> {
    reader: R,
    stream: OutputStream,
    echo: Option<EchoSink>,
    handler: Option<OutputHandler>,
    stop: Option<watch::Receiver<bool>>,
    spec: Arc<CommandSpec>,
}

impl<R> Pump<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    pub(crate) fn new(reader: R, stream: OutputStream, spec: Arc<CommandSpec>) -> Self {
        Self {
            reader,
            stream,
            echo: None,
            handler: None,
            stop: None,
            spec,
        }
    }

    pub(crate) fn echo_to(mut self, sink: EchoSink) -> Self {
        self.echo = Some(sink);
        self
    }

    pub(crate) fn deliver_to(mut self, handler: Option<OutputHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Stop reading once `stop` turns true.
    pub(crate) fn stop_on(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub(crate) async fn run(self) -> PumpReport {
        let Pump {
            reader,
            stream,
            mut echo,
            handler,
            mut stop,
            spec,
        } = self;

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut report = PumpReport {
            stream,
            lines: 0,
            handler_error: None,
            captured: String::new(),
            stopped_early: false,
        };

        loop {
            buf.clear();
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read,
                () = stop_requested(stop.as_mut()) => {
                    debug!(%stream, lines = report.lines, "stopped reading before EOF");
                    report.stopped_early = true;
                    break;
                }
            };
            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(%stream, error = %e, "reading child output failed");
                    break;
                }
            }
            report.lines += 1;

            let mut consumed = false;

            if let Some(sink) = echo.as_mut() {
                if let Err(e) = echo_bytes(sink, &buf).await {
                    warn!(%stream, error = %e, "console echo failed; echo disabled");
                    echo = None;
                } else {
                    consumed = true;
                }
            }

            if let Some(h) = handler.as_ref().filter(|_| report.handler_error.is_none()) {
                consumed = true;
                let event = OutputEvent {
                    line: line_text(&buf),
                    stream,
                    spec: Arc::clone(&spec),
                };
                if let Err(e) = h(&event) {
                    warn!(
                        %stream,
                        error = %e,
                        "output handler failed; no further lines from this stream will be delivered"
                    );
                    report.handler_error = Some(e);
                }
            }

            if !consumed {
                match stream {
                    OutputStream::Stdout => capture(&mut report.captured, &buf),
                    OutputStream::Stderr => trace!(%stream, "{}", line_text(&buf)),
                }
            }
        }

        debug!(%stream, lines = report.lines, "output stream closed");
        report
    }
}

/// Resolves once a stop is requested; never, without a stop channel or
/// once its sender is gone.
async fn stop_requested(stop: Option<&mut watch::Receiver<bool>>) {
    if let Some(stop) = stop {
        if stop.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending().await
}

async fn echo_bytes(sink: &mut EchoSink, bytes: &[u8]) -> std::io::Result<()> {
    sink.write_all(bytes).await?;
    sink.flush().await
}

/// Line contents without the trailing `\n` (or `\r\n`).
fn line_text(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn capture(captured: &mut String, raw: &[u8]) {
    let room = CAPTURE_LIMIT.saturating_sub(captured.len());
    if room == 0 {
        return;
    }
    let text = String::from_utf8_lossy(raw);
    if text.len() <= room {
        captured.push_str(&text);
    } else {
        let mut end = room;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        captured.push_str(&text[..end]);
    }
}
