//! Structured logging for the simulation kernel
//!
//! Kernel diagnostics go through `tracing`. They are independent of the model
//! trace (see [`crate::trace`]), which is filtered by the experiment's time
//! windows before it reaches its sink.
//!
//! # Controlling terminal output
//!
//! ```rust
//! use desres_core::init_simulation_logging_with_level;
//! init_simulation_logging_with_level("debug");
//! ```
//!
//! `RUST_LOG` overrides the level passed in code:
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin harbor
//! RUST_LOG=desres_core::resource=trace,desres::trace=info cargo run --bin harbor
//! ```
//!
//! Initialisation only installs a subscriber once per process; later calls
//! are no-ops, so tests can call it freely.
//!
//! # Log level guidelines
//! - **TRACE**: every event pop and process state transition
//! - **DEBUG**: scheduling and resource decisions
//! - **INFO**: simulation start, stop and finish
//! - **WARN**: suspicious conditions (stale events, units held at termination)
//! - **ERROR**: errors that terminated a process

use tracing::{debug, error, info, trace, warn, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::process::ProcessId;
use crate::time::SimTime;
use crate::types::EventId;

/// Initialize logging at INFO with the model trace enabled.
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info")
}

/// Initialize logging with a specific level
///
/// # Arguments
/// * `level` - Log level: "trace", "debug", "info", "warn", or "error"
pub fn init_simulation_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{level},desres::trace=debug").into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Simulation logging initialized at level: {}", level);
    }
}

/// Everything at TRACE, pretty-printed.
pub fn init_detailed_simulation_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "trace".into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Detailed simulation logging initialized");
    }
}

/// Create a span for tracking simulation execution
pub fn simulation_span(name: &str) -> Span {
    tracing::info_span!("simulation", name = name)
}

/// Create a span covering one resumption of a process
pub fn process_span(name: &str, id: ProcessId) -> Span {
    tracing::debug_span!("process", name = name, id = %id)
}

/// Create a span for tracking event processing
pub fn event_span(event_id: EventId, time: SimTime) -> Span {
    tracing::trace_span!("event", id = %event_id, time = %time)
}

/// Logging utilities for common simulation events
pub mod events {
    use super::*;

    pub fn simulation_started(name: &str, end_time: Option<SimTime>) {
        match end_time {
            Some(end) => info!(simulation = name, end_time = %end, "Simulation started"),
            None => info!(simulation = name, "Simulation started (unbounded)"),
        }
    }

    pub fn simulation_stopped(name: &str, time: SimTime, pending_events: usize) {
        info!(
            simulation = name,
            time = %time,
            pending_events,
            "Simulation stopped"
        );
    }

    pub fn simulation_completed(name: &str, final_time: SimTime, events_processed: u64) {
        info!(
            simulation = name,
            final_time = %final_time,
            events_processed,
            "Simulation completed"
        );
    }

    pub fn event_processing_started(event_id: EventId, process: ProcessId, time: SimTime) {
        trace!(event_id = %event_id, %process, time = %time, "Processing event");
    }

    pub fn process_state_changed(process: &str, old_state: &str, new_state: &str) {
        trace!(process, old_state, new_state, "Process state changed");
    }

    pub fn process_activated(process: &str, at: SimTime) {
        debug!(process, at = %at, "Process activated");
    }

    pub fn process_terminated(process: &str, time: SimTime) {
        debug!(process, time = %time, "Process terminated");
    }

    pub fn progress(name: &str, time: SimTime, percent: u64) {
        info!(simulation = name, time = %time, percent, "Simulation progress");
    }
}

/// Logging utilities for error conditions and warnings
pub mod diagnostics {
    use super::*;

    /// An event popped for a process that is no longer scheduled.
    pub fn stale_event(event_id: EventId, process: &str, state: &str) {
        warn!(event_id = %event_id, process, state, "Dropping stale event");
    }

    pub fn terminated_holding_units(process: &str, pool: &str, units: u32) {
        warn!(
            process,
            pool,
            units,
            "Process terminated while still holding units; they stay allocated"
        );
    }

    pub fn process_failed(process: &str, time: SimTime, error: &str) {
        error!(process, time = %time, error, "Process terminated by error");
    }
}
