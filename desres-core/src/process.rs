//! Processes: independently resumable units of model logic
//!
//! A process is a state machine. The scheduler calls [`Process::resume`]
//! whenever the process is due; the body runs from wherever it stopped last
//! (its own phase enum plus whatever locals it saved) and hands back a
//! [`Step`] saying how it suspends:
//!
//! - [`Step::Hold`] resumes it again after a delay;
//! - [`Step::Acquire`] takes units from a pool. If they are available the
//!   process is resumed again straight away, in the same scheduler cycle and
//!   at the same time. Otherwise it waits in the pool's queue until a release
//!   hands it the units;
//! - [`Step::Terminate`] ends its lifecycle.
//!
//! Returning an error also ends the lifecycle: the scheduler records the
//! failure, reports it and carries on with the next event.
//!
//! ```
//! use desres_core::{Process, ProcessContext, SimDuration, SimError, Simulation, Step};
//!
//! struct Blinker {
//!     blinks: u32,
//! }
//!
//! impl Process for Blinker {
//!     fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
//!         if self.blinks == 3 {
//!             return Ok(Step::Terminate);
//!         }
//!         self.blinks += 1;
//!         ctx.trace_note(format!("blink {}", self.blinks));
//!         Ok(Step::Hold(SimDuration::from_secs(1)))
//!     }
//! }
//!
//! let mut sim = Simulation::default();
//! sim.spawn(Blinker { blinks: 0 }, SimDuration::ZERO).unwrap();
//! while sim.step() {}
//! assert_eq!(sim.time().as_nanos(), 3_000_000_000);
//! ```

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::randomness::RandomStream;
use crate::resource::ResourcePool;
use crate::scheduler::ClockRef;
use crate::time::{SimDuration, SimTime};
use crate::trace::TraceLevel;
use crate::types::{PoolKey, StreamKey};
use crate::Simulation;

/// Unique identifier of a process within one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub(crate) u64);

impl ProcessId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    /// Created but never activated; will not run.
    Created,
    /// Has a pending event in the event list.
    Scheduled,
    Running,
    /// Parked in a resource pool's wait queue.
    Waiting,
    Terminated,
}

/// How a process suspends after a resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Hold(SimDuration),
    Acquire { pool: PoolKey, units: u32 },
    Terminate,
}

/// Upcasting helper so process bodies can be handed back with their
/// concrete type.
pub trait AsAny: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

pub trait Process: AsAny {
    /// Base name used in traces; the kernel appends `#<id>`.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Run until the next suspension point.
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError>;
}

/// Bookkeeping the kernel keeps for every process, including finished ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub name: String,
    pub state: ProcessState,
    pub created_at: SimTime,
    pub terminated_at: Option<SimTime>,
    /// Error that ended the lifecycle, if it did not end normally.
    pub failure: Option<String>,
}

/// Process records plus the bodies of processes that can still run.
///
/// A body is taken out while it runs and dropped when the process
/// terminates. Records stay for the whole run unless `keep_finished` is
/// off, in which case a normal termination only bumps a counter.
pub(crate) struct ProcessTable {
    next_id: u64,
    records: BTreeMap<ProcessId, ProcessRecord>,
    bodies: HashMap<ProcessId, Box<dyn Process>>,
    keep_finished: bool,
    finished_dropped: usize,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProcessTable {
    pub(crate) fn new(keep_finished: bool) -> Self {
        Self {
            next_id: 0,
            records: BTreeMap::new(),
            bodies: HashMap::new(),
            keep_finished,
            finished_dropped: 0,
        }
    }

    pub(crate) fn insert(&mut self, body: Box<dyn Process>, now: SimTime) -> ProcessId {
        self.next_id += 1;
        let id = ProcessId(self.next_id);
        let name = format!("{}#{}", body.name(), id.0);
        self.records.insert(
            id,
            ProcessRecord {
                id,
                name,
                state: ProcessState::Created,
                created_at: now,
                terminated_at: None,
                failure: None,
            },
        );
        self.bodies.insert(id, body);
        id
    }

    pub(crate) fn record(&self, id: ProcessId) -> Option<&ProcessRecord> {
        self.records.get(&id)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.values()
    }

    pub(crate) fn state(&self, id: ProcessId) -> Option<ProcessState> {
        self.records.get(&id).map(|r| r.state)
    }

    pub(crate) fn name(&self, id: ProcessId) -> &str {
        self.records.get(&id).map_or("<unknown>", |r| r.name.as_str())
    }

    pub(crate) fn set_state(&mut self, id: ProcessId, state: ProcessState) {
        if let Some(record) = self.records.get_mut(&id) {
            record.state = state;
        }
    }

    pub(crate) fn mark_terminated(&mut self, id: ProcessId, now: SimTime, failure: Option<String>) {
        self.bodies.remove(&id);
        if failure.is_none() && !self.keep_finished {
            if self.records.remove(&id).is_some() {
                self.finished_dropped += 1;
            }
            return;
        }
        if let Some(record) = self.records.get_mut(&id) {
            record.state = ProcessState::Terminated;
            record.terminated_at = Some(now);
            record.failure = failure;
        }
    }

    /// Normal terminations whose record was not kept.
    pub(crate) fn finished_dropped(&self) -> usize {
        self.finished_dropped
    }

    pub(crate) fn take_body(&mut self, id: ProcessId) -> Option<Box<dyn Process>> {
        self.bodies.remove(&id)
    }

    pub(crate) fn restore_body(&mut self, id: ProcessId, body: Box<dyn Process>) {
        self.bodies.insert(id, body);
    }

    pub(crate) fn body_mut(&mut self, id: ProcessId) -> Option<&mut Box<dyn Process>> {
        self.bodies.get_mut(&id)
    }
}

/// What a running process can do to the simulation around it.
pub struct ProcessContext<'a> {
    sim: &'a mut Simulation,
    id: ProcessId,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(sim: &'a mut Simulation, id: ProcessId) -> Self {
        Self { sim, id }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Display name, e.g. `Ship#4`.
    pub fn name(&self) -> &str {
        self.sim.processes.name(self.id)
    }

    pub fn now(&self) -> SimTime {
        self.sim.time()
    }

    pub fn clock(&self) -> ClockRef {
        self.sim.clock()
    }

    /// Give back `units` to `pool`. Waiters the release satisfies are
    /// scheduled to resume at the current time; the caller keeps running.
    pub fn release(&mut self, pool: PoolKey, units: u32) -> Result<(), SimError> {
        self.sim.release_units(self.id, pool, units)
    }

    pub fn pool(&self, pool: PoolKey) -> Result<&ResourcePool, SimError> {
        self.sim.pool(pool)
    }

    /// Units of `pool` held by this process.
    pub fn held(&self, pool: PoolKey) -> Result<u32, SimError> {
        Ok(self.sim.pool(pool)?.held_by(self.id))
    }

    pub fn stream(&mut self, stream: StreamKey) -> Result<&mut dyn RandomStream, SimError> {
        self.sim.streams.get_mut(stream)
    }

    /// Register a new process. It will not run until activated.
    pub fn create<P: Process>(&mut self, process: P) -> ProcessId {
        self.sim.create(process)
    }

    pub fn activate(&mut self, process: ProcessId, delay: SimDuration) -> Result<(), SimError> {
        self.sim.activate(process, delay)
    }

    pub fn spawn<P: Process>(
        &mut self,
        process: P,
        delay: SimDuration,
    ) -> Result<ProcessId, SimError> {
        self.sim.spawn(process, delay)
    }

    pub fn process_state(&self, process: ProcessId) -> Option<ProcessState> {
        self.sim.process_state(process)
    }

    /// Note for the model trace, shown inside the trace window.
    pub fn trace_note(&mut self, message: impl Into<String>) {
        self.note(TraceLevel::Trace, message);
    }

    /// Note for the model trace, shown inside the debug window.
    pub fn debug_note(&mut self, message: impl Into<String>) {
        self.note(TraceLevel::Debug, message);
    }

    fn note(&mut self, level: TraceLevel, message: impl Into<String>) {
        let now = self.sim.time();
        let name = self.sim.processes.name(self.id);
        self.sim
            .trace
            .note(level, now, Some(self.id), name, message);
    }
}
