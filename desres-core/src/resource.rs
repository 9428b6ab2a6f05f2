//! Finite multi-unit resource pools with a strict FIFO wait queue
//!
//! A pool hands out indivisible units. A request that cannot be satisfied on
//! arrival joins the tail of the wait queue, and the queue is only ever served
//! from its head: when units come back, the head request is granted if it
//! fits, then the next one, and so on until the first head that does not fit.
//! Smaller requests further back never overtake an unsatisfied head, so a
//! large request cannot be starved by a stream of small ones, at the cost of
//! leaving units idle while it waits.
//!
//! New requests do not bypass a non-empty queue either, even when enough
//! units happen to be free for them.

use std::collections::{BTreeMap, VecDeque};

use metrics::{counter, gauge, histogram};
use tracing::{debug, trace};

use crate::error::ResourceError;
use crate::process::ProcessId;
use crate::stats::ResourceStats;
use crate::time::{SimDuration, SimTime};
use crate::types::PoolKey;

/// A pending demand for units, alive only while its process is waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub process: ProcessId,
    pub units: u32,
    pub enqueue_order: u64,
    pub enqueued_at: SimTime,
}

/// A request satisfied out of the wait queue by a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub process: ProcessId,
    pub units: u32,
    pub waited: SimDuration,
}

/// Result of [`ResourcePool::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Units were taken; the caller keeps running.
    Granted,
    /// The caller was appended to the wait queue at `position` (0 is the head).
    Queued { position: usize },
}

#[derive(Debug)]
pub struct ResourcePool {
    key: PoolKey,
    name: String,
    capacity: u32,
    available: u32,
    wait_queue: VecDeque<Request>,
    holdings: BTreeMap<ProcessId, u32>,
    next_order: u64,
    stats: ResourceStats,
}

impl ResourcePool {
    pub fn new(
        key: PoolKey,
        name: impl Into<String>,
        capacity: u32,
        now: SimTime,
    ) -> Result<Self, ResourceError> {
        let name = name.into();
        if capacity == 0 {
            return Err(ResourceError::InvalidCapacity { pool: name });
        }
        gauge!("resource_available", "pool" => name.clone()).set(f64::from(capacity));
        Ok(Self {
            key,
            name,
            capacity,
            available: capacity,
            wait_queue: VecDeque::new(),
            holdings: BTreeMap::new(),
            next_order: 0,
            stats: ResourceStats::new(capacity, now),
        })
    }

    /// Take `units` for `process`, or queue it behind the current waiters.
    ///
    /// Requests for zero units or for more than the capacity are rejected
    /// outright and leave the pool untouched: such a request could never be
    /// satisfied and would block the queue forever.
    pub fn acquire(
        &mut self,
        process: ProcessId,
        units: u32,
        now: SimTime,
    ) -> Result<AcquireOutcome, ResourceError> {
        if units == 0 || units > self.capacity {
            return Err(ResourceError::InvalidRequest {
                pool: self.name.clone(),
                units,
                capacity: self.capacity,
            });
        }

        if self.wait_queue.is_empty() && self.available >= units {
            self.take(process, units, SimDuration::ZERO, true, now);
            debug!(pool = %self.name, %process, units, available = self.available, "Units granted");
            return Ok(AcquireOutcome::Granted);
        }

        let position = self.wait_queue.len();
        self.wait_queue.push_back(Request {
            process,
            units,
            enqueue_order: self.next_order,
            enqueued_at: now,
        });
        self.next_order += 1;
        self.stats.record_queued(self.wait_queue.len());
        counter!("resource_requests_queued_total", "pool" => self.name.clone()).increment(1);
        debug!(
            pool = %self.name,
            %process,
            units,
            available = self.available,
            position,
            "Request queued"
        );
        Ok(AcquireOutcome::Queued { position })
    }

    /// Return `units` held by `process`, then serve the wait queue from its
    /// head. The returned grants are in queue order.
    ///
    /// A release of more units than `process` holds is rejected without
    /// touching the pool.
    pub fn release(
        &mut self,
        process: ProcessId,
        units: u32,
        now: SimTime,
    ) -> Result<Vec<Grant>, ResourceError> {
        let held = self.held_by(process);
        if units == 0 || units > held {
            return Err(ResourceError::Integrity {
                pool: self.name.clone(),
                process,
                units,
                held,
            });
        }

        if units == held {
            self.holdings.remove(&process);
        } else {
            self.holdings.insert(process, held - units);
        }
        self.available += units;
        self.stats.record_release();
        self.stats
            .level_changed(now, self.capacity - self.available, self.available);
        debug!(pool = %self.name, %process, units, available = self.available, "Units released");

        let grants = self.drain(now);
        gauge!("resource_available", "pool" => self.name.clone()).set(f64::from(self.available));
        Ok(grants)
    }

    fn drain(&mut self, now: SimTime) -> Vec<Grant> {
        let mut grants = Vec::new();
        while let Some(head) = self.wait_queue.front() {
            if head.units > self.available {
                trace!(
                    pool = %self.name,
                    head = %head.process,
                    units = head.units,
                    available = self.available,
                    "Head of queue still blocked"
                );
                break;
            }
            let Some(request) = self.wait_queue.pop_front() else {
                break;
            };
            let waited = now.span_since(request.enqueued_at);
            self.take(request.process, request.units, waited, false, now);
            grants.push(Grant {
                process: request.process,
                units: request.units,
                waited,
            });
        }
        grants
    }

    fn take(
        &mut self,
        process: ProcessId,
        units: u32,
        waited: SimDuration,
        immediate: bool,
        now: SimTime,
    ) {
        self.available -= units;
        *self.holdings.entry(process).or_insert(0) += units;
        self.stats.record_grant(units, waited, immediate);
        self.stats
            .level_changed(now, self.capacity - self.available, self.available);

        counter!("resource_grants_total", "pool" => self.name.clone()).increment(1);
        histogram!("resource_wait_seconds", "pool" => self.name.clone())
            .record(waited.as_secs_f64());
        gauge!("resource_available", "pool" => self.name.clone()).set(f64::from(self.available));
    }

    pub fn key(&self) -> PoolKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Waiting requests, head first.
    pub fn waiting(&self) -> impl Iterator<Item = &Request> {
        self.wait_queue.iter()
    }

    pub fn held_by(&self, process: ProcessId) -> u32 {
        self.holdings.get(&process).copied().unwrap_or(0)
    }

    pub fn holders(&self) -> impl Iterator<Item = (ProcessId, u32)> + '_ {
        self.holdings.iter().map(|(p, u)| (*p, *u))
    }

    pub fn total_held(&self) -> u64 {
        self.holdings.values().map(|u| u64::from(*u)).sum()
    }

    pub fn stats(&self) -> &ResourceStats {
        &self.stats
    }

    /// `0 <= available <= capacity`, held units account for the difference,
    /// and an idle head never fits into the available units.
    pub fn check_invariants(&self) -> bool {
        self.available <= self.capacity
            && u64::from(self.capacity - self.available) == self.total_held()
            && self
                .wait_queue
                .front()
                .map_or(true, |head| head.units > self.available)
    }
}
