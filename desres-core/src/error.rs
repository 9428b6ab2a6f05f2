//! Error types for the simulation framework
//!
//! Every error a process can run into is local to that process: the scheduler
//! terminates the offending process and keeps popping events.

use crate::process::{ProcessId, ProcessState};
use crate::time::{SimDuration, SimTime};
use crate::types::PoolKey;
use thiserror::Error;

/// Top-level error type for simulation operations
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Process error: {0}")]
    ProcessLifecycle(#[from] ProcessError),

    /// Failure raised by model code inside a process.
    #[error("Process error: {0}")]
    Process(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Unknown random stream: {0}")]
    UnknownStream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors related to event scheduling (the kernel's scheduling error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("cannot schedule with negative delay {delay} at {now}")]
    NegativeDelay { delay: SimDuration, now: SimTime },

    #[error("scheduling {delay} after {now} overflows the simulation clock")]
    TimeOverflow { delay: SimDuration, now: SimTime },
}

/// Errors raised by resource pools.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// A request for zero units or for more units than the pool can ever hold.
    #[error("invalid request of {units} units from {pool} (capacity {capacity})")]
    InvalidRequest { pool: String, units: u32, capacity: u32 },

    /// A release of units the process does not hold.
    #[error("{process} released {units} units to {pool} but holds {held}")]
    Integrity {
        pool: String,
        process: ProcessId,
        units: u32,
        held: u32,
    },

    #[error("resource pool {pool} must have a capacity greater than zero")]
    InvalidCapacity { pool: String },

    #[error("unknown resource pool {0}")]
    UnknownPool(PoolKey),
}

/// Misuse of the process activation surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),

    #[error("{id} cannot be activated while {state:?}")]
    AlreadyActive { id: ProcessId, state: ProcessState },

    #[error("{0} has terminated")]
    Terminated(ProcessId),
}
