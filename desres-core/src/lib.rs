//! Process-oriented discrete event simulation kernel.
//!
//! This crate provides the building blocks for process-oriented simulation:
//! a clock and event list, processes that suspend by holding for a delay or
//! by waiting for units of a shared resource pool, seeded random streams and
//! a windowed model trace.
//!
//! # Architecture Overview
//!
//! Everything a run needs is owned by one [`Simulation`] value; there is no
//! global state. Its lifecycle is init → run → finish:
//!
//! - **init**: [`Simulation::new`] from a [`SimulationConfig`], then register
//!   pools ([`Simulation::add_pool`]), random streams
//!   ([`Simulation::add_stream`]) and processes ([`Simulation::spawn`]).
//! - **run**: [`Simulation::run`] or [`Simulation::execute`] with an
//!   [`Executor`]. The scheduler pops the earliest event, resumes its
//!   process until it suspends, and repeats. At most one process runs at a
//!   time.
//! - **finish**: [`Simulation::finish`] yields a [`SimulationReport`].
//!
//! Processes are explicit state machines implementing [`Process`]; see the
//! [`process`] module for the suspension model.
//!
//! # Basic Usage
//!
//! ```rust
//! use desres_core::{
//!     Executor, PoolKey, Process, ProcessContext, SimDuration, SimError, SimTime, Simulation,
//!     Step,
//! };
//!
//! enum Phase {
//!     Arriving,
//!     Docked,
//!     Loaded,
//! }
//!
//! /// Takes two berths, keeps them for five seconds and gives them back.
//! struct Loader {
//!     berths: PoolKey,
//!     phase: Phase,
//! }
//!
//! impl Process for Loader {
//!     fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
//!         match self.phase {
//!             Phase::Arriving => {
//!                 self.phase = Phase::Docked;
//!                 Ok(Step::Acquire { pool: self.berths, units: 2 })
//!             }
//!             Phase::Docked => {
//!                 self.phase = Phase::Loaded;
//!                 Ok(Step::Hold(SimDuration::from_secs(5)))
//!             }
//!             Phase::Loaded => {
//!                 ctx.release(self.berths, 2)?;
//!                 Ok(Step::Terminate)
//!             }
//!         }
//!     }
//! }
//!
//! let mut sim = Simulation::default();
//! let berths = sim.add_pool("berths", 3)?;
//! for _ in 0..2 {
//!     sim.spawn(Loader { berths, phase: Phase::Arriving }, SimDuration::ZERO)?;
//! }
//! sim.execute(Executor::unbound());
//!
//! let report = sim.finish();
//! // The second loader waits for the first one to leave.
//! assert_eq!(report.final_time, SimTime::from_secs(10));
//! assert_eq!(report.pool("berths").map(|p| p.stats.queued_requests), Some(1));
//! # Ok::<(), SimError>(())
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`] (an instant) and [`SimDuration`] (a signed
//! span), both in nanoseconds of simulation time, not wall-clock time. Same
//! time events run in the order they were scheduled, so a run is fully
//! determined by its configuration and seed.

pub mod config;
pub mod error;
pub mod execute;
pub mod logging;
pub mod process;
pub mod randomness;
pub mod report;
pub mod resource;
pub mod scheduler;
pub mod stats;
pub mod time;
pub mod trace;
pub mod types;

use tracing::{debug, info, instrument, trace};

pub use config::SimulationConfig;
pub use error::{EventError, ProcessError, ResourceError, SimError};
pub use execute::{Execute, Executor, ExecutorWithSideEffect, ProgressReporter, StopWhen};
pub use logging::{
    event_span, init_detailed_simulation_logging, init_simulation_logging,
    init_simulation_logging_with_level, process_span, simulation_span,
};
pub use process::{Process, ProcessContext, ProcessId, ProcessRecord, ProcessState, Step};
pub use randomness::{derive_seed, RandomStream, SeededStream};
pub use report::{PoolReport, ProcessCounts, ProcessFailure, SimulationReport, StreamReport};
pub use resource::{AcquireOutcome, Grant, Request, ResourcePool};
pub use scheduler::{ClockRef, EventEntry, EventList};
pub use stats::ResourceStats;
pub use time::{SimDuration, SimTime, TimeUnit};
pub use trace::{MemorySink, TimeWindow, TraceLevel, TraceNote, TraceSink, TracingSink};
pub use types::{EventId, PoolKey, StreamKey};

use process::ProcessTable;
use randomness::StreamRegistry;
use trace::TraceDispatcher;

/// What the scheduler does with a process after applying its [`Step`].
enum Flow {
    /// Parked in the event list or a wait queue; keep the body.
    Suspended,
    /// Acquired without waiting; resume again right away.
    Resume,
    Terminated,
}

/// Simulation context: clock, event list, processes, pools, streams and
/// trace sink for one run.
///
/// See the [crate-level documentation](index.html) for more information.
pub struct Simulation {
    config: SimulationConfig,
    events: EventList,
    pub(crate) processes: ProcessTable,
    pools: Vec<ResourcePool>,
    pub(crate) streams: StreamRegistry,
    pub(crate) trace: TraceDispatcher,
    events_processed: u64,
    stop_time: Option<SimTime>,
    /// Set when [`Simulation::run`] ended at the stop time with events left.
    stopped_at: Option<SimTime>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::assemble(SimulationConfig::default(), None, TraceDispatcher::new(None, None))
    }
}

impl Simulation {
    /// Creates an empty simulation at time zero.
    ///
    /// Fails with [`SimError::Configuration`] if the stop time or a trace
    /// window is not a valid instant.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        let stop_time = config.stop_time()?;
        let trace = TraceDispatcher::new(config.trace_window()?, config.debug_window()?);
        Ok(Self::assemble(config, stop_time, trace))
    }

    fn assemble(config: SimulationConfig, stop_time: Option<SimTime>, trace: TraceDispatcher) -> Self {
        let streams = StreamRegistry::new(config.seed);
        let processes = ProcessTable::new(config.keep_finished_records);
        debug!(simulation = %config.name, seed = config.seed, "Simulation created");
        Self {
            config,
            events: EventList::default(),
            processes,
            pools: Vec::new(),
            streams,
            trace,
            events_processed: 0,
            stop_time,
            stopped_at: None,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Registers a resource pool with `capacity` units, all available.
    #[instrument(skip(self))]
    pub fn add_pool(&mut self, name: &str, capacity: u32) -> Result<PoolKey, SimError> {
        let key = PoolKey(self.pools.len());
        let pool = ResourcePool::new(key, name, capacity, self.time())?;
        self.pools.push(pool);
        debug!(%key, capacity, "Added resource pool");
        Ok(key)
    }

    pub fn pool(&self, key: PoolKey) -> Result<&ResourcePool, SimError> {
        self.pools
            .get(key.0)
            .ok_or(SimError::Resource(ResourceError::UnknownPool(key)))
    }

    pub fn pools(&self) -> &[ResourcePool] {
        &self.pools
    }

    fn pool_mut(&mut self, key: PoolKey) -> Result<&mut ResourcePool, SimError> {
        self.pools
            .get_mut(key.0)
            .ok_or(SimError::Resource(ResourceError::UnknownPool(key)))
    }

    /// Registers a [`SeededStream`] whose seed is derived from the master
    /// seed and `name`.
    pub fn add_stream(&mut self, name: &str) -> StreamKey {
        let key = self.streams.add_seeded(name);
        debug!(stream = name, %key, "Added random stream");
        key
    }

    /// Registers a caller-provided stream.
    pub fn add_stream_with(&mut self, name: &str, stream: Box<dyn RandomStream>) -> StreamKey {
        let key = self.streams.add(name, stream);
        debug!(stream = name, %key, "Added random stream");
        key
    }

    pub fn stream(&mut self, key: StreamKey) -> Result<&mut dyn RandomStream, SimError> {
        self.streams.get_mut(key)
    }

    /// Replaces the trace sink. Windows from the configuration still apply.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace.set_sink(sink);
    }

    /// Registers a process in the `Created` state. It will not run until it
    /// is activated.
    pub fn create<P: Process>(&mut self, process: P) -> ProcessId {
        let id = self.processes.insert(Box::new(process), self.time());
        trace!(process = %self.processes.name(id), %id, "Process created");
        id
    }

    /// Schedules the first resumption of a `Created` process after `delay`.
    ///
    /// This is the only way a process enters the event list. A negative
    /// delay is rejected and the process stays `Created`.
    pub fn activate(&mut self, id: ProcessId, delay: SimDuration) -> Result<(), SimError> {
        match self.processes.state(id) {
            None => Err(ProcessError::UnknownProcess(id).into()),
            Some(ProcessState::Created) => {
                self.events.schedule(id, delay)?;
                self.processes.set_state(id, ProcessState::Scheduled);
                let at = self.time().checked_offset(delay).unwrap_or(SimTime::MAX);
                logging::events::process_activated(self.processes.name(id), at);
                self.kernel_note(id, format!("activated, resumes at {at}"));
                Ok(())
            }
            Some(ProcessState::Terminated) => Err(ProcessError::Terminated(id).into()),
            Some(state) => Err(ProcessError::AlreadyActive { id, state }.into()),
        }
    }

    pub fn activate_now(&mut self, id: ProcessId) -> Result<(), SimError> {
        self.activate(id, SimDuration::ZERO)
    }

    /// [`Simulation::create`] followed by [`Simulation::activate`].
    pub fn spawn<P: Process>(&mut self, process: P, delay: SimDuration) -> Result<ProcessId, SimError> {
        let id = self.create(process);
        self.activate(id, delay)?;
        Ok(id)
    }

    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        self.processes.state(id)
    }

    pub fn process_name(&self, id: ProcessId) -> Option<&str> {
        self.processes.record(id).map(|r| r.name.as_str())
    }

    pub fn process_record(&self, id: ProcessId) -> Option<&ProcessRecord> {
        self.processes.record(id)
    }

    pub fn process_records(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.processes.records()
    }

    /// Typed access to the body of a process that has not terminated.
    pub fn process_mut<P: Process>(&mut self, id: ProcessId) -> Option<&mut P> {
        let body = self.processes.body_mut(id)?;
        (**body).as_any_mut().downcast_mut::<P>()
    }

    /// Detaches the body of a process that has not terminated, usually at the
    /// end of a run to inspect its state. The process will not run again.
    ///
    /// Returns `None` for a `Waiting` process: its request cannot leave the
    /// queue, and granting it to a detached body would lose the units.
    pub fn take_process<P: Process>(&mut self, id: ProcessId) -> Option<P> {
        if self.processes.state(id) == Some(ProcessState::Waiting) {
            return None;
        }
        if !(**self.processes.body_mut(id)?).as_any_mut().is::<P>() {
            return None;
        }
        let body = self.processes.take_body(id)?;
        body.into_any().downcast::<P>().ok().map(|p| *p)
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.events.time()
    }

    /// Returns a ClockRef for reading the simulation time.
    pub fn clock(&self) -> ClockRef {
        self.events.clock()
    }

    /// Pending events in the order they will be popped.
    pub fn pending_events(&self) -> Vec<EventEntry> {
        self.events.pending()
    }

    /// Returns the time of the next scheduled event, or None if no events are scheduled.
    pub fn peek_next_event_time(&self) -> Option<SimTime> {
        self.events.peek().map(EventEntry::time)
    }

    /// Check if there are pending events
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Performs one step of the simulation. Returns `true` if there was in fact an event
    /// available to process, and `false` otherwise, which signifies that the simulation
    /// ended.
    pub fn step(&mut self) -> bool {
        let Some(event) = self.events.pop_next() else {
            return false;
        };
        self.events_processed += 1;

        let span = logging::event_span(event.id(), event.time());
        let _enter = span.enter();
        logging::events::event_processing_started(event.id(), event.process(), event.time());

        match self.processes.state(event.process()) {
            Some(ProcessState::Scheduled) => self.run_process(event.process(), event.id()),
            state => {
                let state = state.map_or_else(|| "Unknown".to_string(), |s| format!("{s:?}"));
                logging::diagnostics::stale_event(
                    event.id(),
                    self.processes.name(event.process()),
                    &state,
                );
            }
        }
        true
    }

    /// Resumes `id` until it suspends, terminates or fails.
    fn run_process(&mut self, id: ProcessId, event_id: EventId) {
        let span = logging::process_span(self.processes.name(id), id);
        let _enter = span.enter();

        let Some(mut body) = self.processes.take_body(id) else {
            let now = self.time();
            logging::diagnostics::stale_event(event_id, self.processes.name(id), "Detached");
            self.processes
                .mark_terminated(id, now, Some("process body was detached".to_string()));
            return;
        };

        loop {
            self.set_state(id, ProcessState::Running);
            let result = {
                let mut ctx = ProcessContext::new(self, id);
                body.resume(&mut ctx)
            };
            match result.and_then(|step| self.apply_step(id, step)) {
                Ok(Flow::Resume) => continue,
                Ok(Flow::Suspended) => {
                    self.processes.restore_body(id, body);
                    return;
                }
                Ok(Flow::Terminated) => return,
                Err(err) => {
                    self.fail_process(id, &err);
                    return;
                }
            }
        }
    }

    fn apply_step(&mut self, id: ProcessId, step: Step) -> Result<Flow, SimError> {
        let now = self.time();
        match step {
            Step::Hold(delay) => {
                self.events.schedule(id, delay)?;
                self.set_state(id, ProcessState::Scheduled);
                self.kernel_note(id, format!("holds for {delay}"));
                Ok(Flow::Suspended)
            }
            Step::Acquire { pool, units } => {
                let pool = self.pool_mut(pool)?;
                let outcome = pool.acquire(id, units, now)?;
                let name = pool.name().to_string();
                match outcome {
                    AcquireOutcome::Granted => {
                        self.kernel_note(id, format!("acquires {units} units of {name}"));
                        Ok(Flow::Resume)
                    }
                    AcquireOutcome::Queued { position } => {
                        self.set_state(id, ProcessState::Waiting);
                        self.kernel_note(
                            id,
                            format!("waits for {units} units of {name} at position {position}"),
                        );
                        Ok(Flow::Suspended)
                    }
                }
            }
            Step::Terminate => {
                self.terminate(id);
                Ok(Flow::Terminated)
            }
        }
    }

    /// Returns units to a pool on behalf of `process` and schedules every
    /// waiter the release satisfies at the current time, in queue order.
    pub(crate) fn release_units(
        &mut self,
        process: ProcessId,
        pool: PoolKey,
        units: u32,
    ) -> Result<(), SimError> {
        let now = self.time();
        let pool = self.pool_mut(pool)?;
        let grants = pool.release(process, units, now)?;
        let name = pool.name().to_string();
        self.kernel_note(process, format!("releases {units} units of {name}"));

        for grant in grants {
            self.events.schedule_now(grant.process);
            self.set_state(grant.process, ProcessState::Scheduled);
            self.kernel_note(
                grant.process,
                format!(
                    "acquires {} units of {name} after waiting {}",
                    grant.units, grant.waited
                ),
            );
        }
        Ok(())
    }

    fn fail_process(&mut self, id: ProcessId, err: &SimError) {
        let now = self.time();
        let message = err.to_string();
        let name = self.processes.name(id).to_string();
        logging::diagnostics::process_failed(&name, now, &message);
        self.trace.note(
            TraceLevel::Error,
            now,
            Some(id),
            &name,
            format!("terminated by error: {message}"),
        );
        self.warn_if_holding(id);
        self.processes.mark_terminated(id, now, Some(message));
    }

    fn terminate(&mut self, id: ProcessId) {
        let now = self.time();
        self.warn_if_holding(id);
        self.kernel_note(id, "terminates");
        logging::events::process_terminated(self.processes.name(id), now);
        self.processes.mark_terminated(id, now, None);
    }

    /// Units held at termination are not released on the process's behalf.
    fn warn_if_holding(&self, id: ProcessId) {
        for pool in &self.pools {
            let held = pool.held_by(id);
            if held > 0 {
                logging::diagnostics::terminated_holding_units(
                    self.processes.name(id),
                    pool.name(),
                    held,
                );
            }
        }
    }

    fn set_state(&mut self, id: ProcessId, state: ProcessState) {
        if let Some(old) = self.processes.state(id) {
            logging::events::process_state_changed(
                self.processes.name(id),
                &format!("{old:?}"),
                &format!("{state:?}"),
            );
        }
        self.processes.set_state(id, state);
    }

    /// Lifecycle note from the kernel, shown inside the debug window.
    fn kernel_note(&mut self, id: ProcessId, message: impl Into<String>) {
        let now = self.time();
        let name = self.processes.name(id);
        self.trace
            .note(TraceLevel::Debug, now, Some(id), name, message);
    }

    /// Runs the entire simulation.
    ///
    /// The stopping condition and other execution details depend on the executor used.
    /// See [`Execute`] and [`Executor`] for more details.
    #[instrument(skip(self, executor), fields(
        initial_time = %self.time()
    ))]
    pub fn execute<E: Execute>(&mut self, executor: E) {
        info!("Starting simulation execution");
        executor.execute(self);
        info!(
            final_time = %self.time(),
            events_processed = self.events_processed,
            "Simulation execution completed"
        );
    }

    /// Runs until the configured stop time, or until no events remain if
    /// there is none. Logs progress when the configuration asks for it.
    pub fn run(&mut self) {
        let span = logging::simulation_span(&self.config.name);
        let _enter = span.enter();

        let stop_time = self.stop_time;
        logging::events::simulation_started(&self.config.name, stop_time);
        let executor = match stop_time {
            Some(time) => Executor::timed(time),
            None => Executor::unbound(),
        };
        if self.config.progress_display {
            let reporter = ProgressReporter::new(stop_time);
            self.execute(executor.side_effect(move |sim| reporter.observe(sim)));
        } else {
            self.execute(executor);
        }
        if self.has_pending_events() {
            self.stopped_at = stop_time;
        }
        logging::events::simulation_stopped(&self.config.name, self.time(), self.events.len());
    }

    /// Snapshot of the run so far.
    ///
    /// After [`Simulation::run`] was cut off by the stop time, the report
    /// covers the run up to that stop time even though the clock is still
    /// at the last processed event.
    pub fn report(&self) -> SimulationReport {
        let now = self.stopped_at.map_or(self.time(), |stop| stop.max(self.time()));
        let mut processes = ProcessCounts::tally(self.processes.records());
        processes.terminated += self.processes.finished_dropped();
        SimulationReport {
            name: self.config.name.clone(),
            final_time: now,
            events_processed: self.events_processed,
            pending_events: self.events.len(),
            processes,
            failures: self
                .processes
                .records()
                .filter_map(ProcessFailure::from_record)
                .collect(),
            pools: self.pools.iter().map(|p| PoolReport::new(p, now)).collect(),
            streams: self
                .streams
                .summary()
                .into_iter()
                .map(|(name, samples)| StreamReport { name, samples })
                .collect(),
        }
    }

    /// Ends the run. Processes still scheduled or waiting are abandoned.
    pub fn finish(self) -> SimulationReport {
        let report = self.report();
        logging::events::simulation_completed(
            &report.name,
            report.final_time,
            report.events_processed,
        );
        report
    }
}
