//! Resource pool statistics
//!
//! Counters and time-weighted levels kept by every [`crate::ResourcePool`],
//! the same figures the pool report shows at the end of a run.

use crate::time::{SimDuration, SimTime};
use serde::Serialize;

/// Running statistics for one resource pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceStats {
    /// Requests satisfied, whether immediately or after waiting.
    pub grants: u64,
    /// Requests satisfied without entering the wait queue.
    pub immediate_grants: u64,
    /// Requests that had to wait.
    pub queued_requests: u64,
    pub releases: u64,
    pub units_granted: u64,
    pub total_wait: SimDuration,
    pub max_wait: SimDuration,
    pub max_queue_len: usize,
    pub min_available: u32,
    #[serde(skip)]
    in_use: u32,
    #[serde(skip)]
    busy_unit_nanos: f64,
    #[serde(skip)]
    last_change: SimTime,
    #[serde(skip)]
    started: SimTime,
}

impl ResourceStats {
    pub(crate) fn new(capacity: u32, now: SimTime) -> Self {
        Self {
            grants: 0,
            immediate_grants: 0,
            queued_requests: 0,
            releases: 0,
            units_granted: 0,
            total_wait: SimDuration::ZERO,
            max_wait: SimDuration::ZERO,
            max_queue_len: 0,
            min_available: capacity,
            in_use: 0,
            busy_unit_nanos: 0.0,
            last_change: now,
            started: now,
        }
    }

    /// Integrate the current occupancy up to `now`, then switch to `in_use`.
    pub(crate) fn level_changed(&mut self, now: SimTime, in_use: u32, available: u32) {
        let elapsed = now.span_since(self.last_change).as_nanos() as f64;
        self.busy_unit_nanos += self.in_use as f64 * elapsed;
        self.last_change = now;
        self.in_use = in_use;
        self.min_available = self.min_available.min(available);
    }

    pub(crate) fn record_grant(&mut self, units: u32, waited: SimDuration, immediate: bool) {
        self.grants += 1;
        self.units_granted += u64::from(units);
        if immediate {
            self.immediate_grants += 1;
        }
        self.total_wait = self.total_wait + waited;
        self.max_wait = self.max_wait.max(waited);
    }

    pub(crate) fn record_queued(&mut self, queue_len: usize) {
        self.queued_requests += 1;
        self.max_queue_len = self.max_queue_len.max(queue_len);
    }

    pub(crate) fn record_release(&mut self) {
        self.releases += 1;
    }

    /// Mean wait over all grants, immediate ones counting as zero.
    pub fn mean_wait(&self) -> SimDuration {
        if self.grants == 0 {
            return SimDuration::ZERO;
        }
        SimDuration::from_nanos(self.total_wait.as_nanos() / self.grants as i64)
    }

    /// Time-weighted fraction of capacity in use between pool creation and `now`.
    pub fn utilization(&self, capacity: u32, now: SimTime) -> f64 {
        let span = now.span_since(self.started).as_nanos() as f64;
        if span == 0.0 || capacity == 0 {
            return 0.0;
        }
        let pending = now.span_since(self.last_change).as_nanos() as f64;
        let busy = self.busy_unit_nanos + self.in_use as f64 * pending;
        busy / (capacity as f64 * span)
    }
}
