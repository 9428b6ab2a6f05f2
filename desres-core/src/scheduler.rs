use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use tracing::trace;

use crate::error::EventError;
use crate::process::ProcessId;
use crate::time::{SimDuration, SimTime};
use crate::types::EventId;

/// Entry stored in the event list: the process to resume and the time when
/// it is supposed to be resumed.
///
/// Entries are ordered by `(time, id)`. Since ids are handed out in insertion
/// order, two resumptions scheduled for the same instant come out in the
/// order they were scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEntry {
    id: EventId,
    time: SimTime,
    process: ProcessId,
}

impl EventEntry {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn process(&self) -> ProcessId {
        self.process
    }
}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

type Clock = Rc<Cell<SimTime>>;

/// This struct exposes only immutable access to the simulation clock.
/// The clock itself is owned by the event list, while others can obtain
/// `ClockRef` to read the current simulation time.
///
/// # Example
///
/// ```
/// # use desres_core::EventList;
/// let events = EventList::default();
/// let clock_ref = events.clock();
/// assert_eq!(clock_ref.time(), events.time());
/// ```
#[derive(Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }
}

/// Time-ordered queue of pending process resumptions, plus the clock.
///
/// The clock only moves in [`EventList::pop_next`], and only forward:
/// scheduling before the current time is rejected, so every popped entry is
/// at or after the previous one.
pub struct EventList {
    next_event_id: u64,
    events: BinaryHeap<EventEntry>,
    clock: Clock,
}

impl Default for EventList {
    fn default() -> Self {
        Self {
            next_event_id: 0,
            events: BinaryHeap::default(),
            clock: Rc::new(Cell::new(SimTime::default())),
        }
    }
}

impl EventList {
    /// Schedules a resumption of `process` at `self.time() + delay`.
    pub fn schedule(
        &mut self,
        process: ProcessId,
        delay: SimDuration,
    ) -> Result<EventId, EventError> {
        let now = self.time();
        if delay.is_negative() {
            return Err(EventError::NegativeDelay { delay, now });
        }
        let time = now
            .checked_offset(delay)
            .ok_or(EventError::TimeOverflow { delay, now })?;

        self.next_event_id += 1;
        let id = EventId(self.next_event_id);
        self.events.push(EventEntry { id, time, process });
        trace!(event_id = %id, %process, time = %time, "Event scheduled");
        Ok(id)
    }

    /// Schedules a resumption of `process` at the current time, behind any
    /// entry already scheduled for this instant.
    pub fn schedule_now(&mut self, process: ProcessId) -> EventId {
        self.next_event_id += 1;
        let id = EventId(self.next_event_id);
        let time = self.time();
        self.events.push(EventEntry { id, time, process });
        trace!(event_id = %id, %process, time = %time, "Event scheduled");
        id
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Returns a reference to the next scheduled entry or `None` if none are left.
    pub fn peek(&self) -> Option<&EventEntry> {
        self.events.peek()
    }

    /// Removes and returns the entry with the smallest `(time, id)`, advancing
    /// the clock to its time. Returns `None` when the list is empty.
    pub fn pop_next(&mut self) -> Option<EventEntry> {
        self.events.pop().inspect(|event| {
            debug_assert!(event.time >= self.clock.get(), "clock moved backwards");
            self.clock.replace(event.time);
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pending entries in the order they will be popped.
    pub fn pending(&self) -> Vec<EventEntry> {
        let mut entries: Vec<EventEntry> = self.events.iter().copied().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }
}
