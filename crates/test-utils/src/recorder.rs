use std::sync::{Arc, Mutex};

use procvisor::events::{ExitEvent, OutputEvent, OutputStream};
use procvisor::supervisor::Supervisor;

/// Collects everything a supervisor reports.
#[derive(Clone, Default)]
pub struct Recorder {
    lines: Arc<Mutex<Vec<(OutputStream, String)>>>,
    exits: Arc<Mutex<Vec<ExitEvent>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register recording output and exit handlers on `supervisor`.
    pub fn attach(&self, supervisor: Supervisor) -> Supervisor {
        let lines = Arc::clone(&self.lines);
        let exits = Arc::clone(&self.exits);
        supervisor
            .on_output(move |ev: &OutputEvent| {
                lines.lock().unwrap().push((ev.stream, ev.line.clone()));
                Ok(())
            })
            .on_exit(move |ev: &ExitEvent| {
                exits.lock().unwrap().push(ev.clone());
                Ok(())
            })
    }

    /// Register only the exit handler.
    pub fn attach_exit(&self, supervisor: Supervisor) -> Supervisor {
        let exits = Arc::clone(&self.exits);
        supervisor.on_exit(move |ev: &ExitEvent| {
            exits.lock().unwrap().push(ev.clone());
            Ok(())
        })
    }

    /// All lines, both streams, in arrival order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn lines_from(&self, stream: OutputStream) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, l)| l.clone())
            .collect()
    }

    pub fn exits(&self) -> Vec<ExitEvent> {
        self.exits.lock().unwrap().clone()
    }
}
