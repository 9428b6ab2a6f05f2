//! Model trace output
//!
//! The trace is the model-level narrative of a run ("Ship#3 is docked and
//! gets loaded"), separate from the kernel's `tracing` diagnostics. Notes are
//! filtered by half-open time windows before they reach a [`TraceSink`]:
//! `Trace` notes only inside the trace window, `Debug` notes only inside the
//! debug window, `Error` notes always.
//!
//! Sinks are called synchronously from the scheduler and must not block. A
//! sink that wants to do real I/O should hand notes off to its own writer.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::process::ProcessId;
use crate::time::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLevel {
    Trace,
    Debug,
    Error,
}

/// One `(time, process, message)` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceNote {
    pub time: SimTime,
    pub process: Option<ProcessId>,
    pub process_name: String,
    pub level: TraceLevel,
    pub message: String,
}

/// Half-open interval `[start, end)` of simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: SimTime,
    pub end: SimTime,
}

impl TimeWindow {
    pub fn new(start: SimTime, end: SimTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: SimTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// Receiver of trace notes.
pub trait TraceSink {
    fn record(&mut self, note: &TraceNote);
}

/// Forwards notes to `tracing` under the `desres::trace` target.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&mut self, note: &TraceNote) {
        let process = note.process_name.as_str();
        match note.level {
            TraceLevel::Trace => {
                info!(target: "desres::trace", time = %note.time, process, "{}", note.message)
            }
            TraceLevel::Debug => {
                debug!(target: "desres::trace", time = %note.time, process, "{}", note.message)
            }
            TraceLevel::Error => {
                error!(target: "desres::trace", time = %note.time, process, "{}", note.message)
            }
        }
    }
}

/// Keeps every note in a shared buffer.
///
/// Clones share the buffer, so a handle kept outside the simulation can read
/// what the sink installed inside it has recorded.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    notes: Rc<RefCell<Vec<TraceNote>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<TraceNote> {
        self.notes.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notes
            .borrow()
            .iter()
            .map(|n| format!("{} {}", n.process_name, n.message))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.borrow().is_empty()
    }
}

impl TraceSink for MemorySink {
    fn record(&mut self, note: &TraceNote) {
        self.notes.borrow_mut().push(note.clone());
    }
}

/// Applies the trace/debug windows and forwards to the installed sink.
pub(crate) struct TraceDispatcher {
    sink: Box<dyn TraceSink>,
    trace_window: Option<TimeWindow>,
    debug_window: Option<TimeWindow>,
}

impl TraceDispatcher {
    pub(crate) fn new(trace_window: Option<TimeWindow>, debug_window: Option<TimeWindow>) -> Self {
        Self {
            sink: Box::new(TracingSink),
            trace_window,
            debug_window,
        }
    }

    pub(crate) fn set_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.sink = sink;
    }

    pub(crate) fn enabled(&self, level: TraceLevel, time: SimTime) -> bool {
        match level {
            TraceLevel::Trace => self.trace_window.is_some_and(|w| w.contains(time)),
            TraceLevel::Debug => self.debug_window.is_some_and(|w| w.contains(time)),
            TraceLevel::Error => true,
        }
    }

    pub(crate) fn note(
        &mut self,
        level: TraceLevel,
        time: SimTime,
        process: Option<ProcessId>,
        process_name: &str,
        message: impl Into<String>,
    ) {
        if !self.enabled(level, time) {
            return;
        }
        let note = TraceNote {
            time,
            process,
            process_name: process_name.to_string(),
            level,
            message: message.into(),
        };
        self.sink.record(&note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_half_open() {
        let w = TimeWindow::new(SimTime::from_secs(0), SimTime::from_secs(100));
        assert!(w.contains(SimTime::zero()));
        assert!(w.contains(SimTime::from_secs(99)));
        assert!(!w.contains(SimTime::from_secs(100)));
    }

    #[test]
    fn test_dispatcher_filters_by_level_window() {
        let sink = MemorySink::new();
        let mut dispatcher = TraceDispatcher::new(
            Some(TimeWindow::new(SimTime::zero(), SimTime::from_secs(100))),
            Some(TimeWindow::new(SimTime::zero(), SimTime::from_secs(50))),
        );
        dispatcher.set_sink(Box::new(sink.clone()));

        let at = SimTime::from_secs;
        dispatcher.note(TraceLevel::Trace, at(10), None, "a", "in trace window");
        dispatcher.note(TraceLevel::Trace, at(100), None, "a", "after trace window");
        dispatcher.note(TraceLevel::Debug, at(49), None, "a", "in debug window");
        dispatcher.note(TraceLevel::Debug, at(60), None, "a", "after debug window");
        dispatcher.note(TraceLevel::Error, at(5_000), None, "a", "always");

        assert_eq!(
            sink.messages(),
            vec!["a in trace window", "a in debug window", "a always"]
        );
    }

    #[test]
    fn test_no_window_disables_level() {
        let sink = MemorySink::new();
        let mut dispatcher = TraceDispatcher::new(None, None);
        dispatcher.set_sink(Box::new(sink.clone()));
        dispatcher.note(TraceLevel::Trace, SimTime::zero(), None, "a", "dropped");
        dispatcher.note(TraceLevel::Debug, SimTime::zero(), None, "a", "dropped");
        assert!(sink.is_empty());
    }
}
