//! End-of-run report
//!
//! Produced by [`crate::Simulation::finish`]. Everything in it is plain data
//! and serializes to JSON for the harbor binary and for comparing runs.

use serde::Serialize;

use crate::process::{ProcessId, ProcessRecord, ProcessState};
use crate::resource::ResourcePool;
use crate::stats::ResourceStats;
use crate::time::{SimDuration, SimTime};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub name: String,
    pub final_time: SimTime,
    pub events_processed: u64,
    /// Events still in the list when the run stopped.
    pub pending_events: usize,
    pub processes: ProcessCounts,
    pub failures: Vec<ProcessFailure>,
    pub pools: Vec<PoolReport>,
    pub streams: Vec<StreamReport>,
}

impl SimulationReport {
    pub fn pool(&self, name: &str) -> Option<&PoolReport> {
        self.pools.iter().find(|p| p.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Number of processes in each lifecycle state at the end of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessCounts {
    pub created: usize,
    pub scheduled: usize,
    pub waiting: usize,
    pub terminated: usize,
    pub failed: usize,
}

impl ProcessCounts {
    pub(crate) fn tally<'a>(records: impl Iterator<Item = &'a ProcessRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.state {
                ProcessState::Created => counts.created += 1,
                // Running cannot outlive a step; count it with the scheduled ones.
                ProcessState::Scheduled | ProcessState::Running => counts.scheduled += 1,
                ProcessState::Waiting => counts.waiting += 1,
                ProcessState::Terminated => counts.terminated += 1,
            }
            if record.failure.is_some() {
                counts.failed += 1;
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.created + self.scheduled + self.waiting + self.terminated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessFailure {
    pub process: ProcessId,
    pub name: String,
    pub time: SimTime,
    pub error: String,
}

impl ProcessFailure {
    pub(crate) fn from_record(record: &ProcessRecord) -> Option<Self> {
        let error = record.failure.clone()?;
        Some(Self {
            process: record.id,
            name: record.name.clone(),
            time: record.terminated_at.unwrap_or(record.created_at),
            error,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolReport {
    pub name: String,
    pub capacity: u32,
    pub available: u32,
    pub queue_len: usize,
    pub utilization: f64,
    pub mean_wait: SimDuration,
    pub stats: ResourceStats,
}

impl PoolReport {
    pub(crate) fn new(pool: &ResourcePool, now: SimTime) -> Self {
        let stats = pool.stats();
        Self {
            name: pool.name().to_string(),
            capacity: pool.capacity(),
            available: pool.available(),
            queue_len: pool.queue_len(),
            utilization: stats.utilization(pool.capacity(), now),
            mean_wait: stats.mean_wait(),
            stats: stats.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub name: String,
    pub samples: u64,
}
