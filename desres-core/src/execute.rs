use std::cell::Cell;

use crate::logging;
use crate::{SimTime, Simulation};

/// A way of driving [`Simulation::step`] to some end.
pub trait Execute {
    fn execute(self, sim: &mut Simulation);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndCondition {
    Time(SimTime),
    NoEvents,
    Steps(usize),
}

/// Runs a simulation until the event list is empty, a stop time is passed or
/// a step budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    end_condition: EndCondition,
}

impl Executor {
    /// Run until no event is left.
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            end_condition: EndCondition::NoEvents,
        }
    }

    /// Process every event at or before `time`. Stops before popping the
    /// first later event, leaving it pending.
    #[must_use]
    pub fn timed(time: SimTime) -> Self {
        Self {
            end_condition: EndCondition::Time(time),
        }
    }

    /// At most `steps` events.
    #[must_use]
    pub fn steps(steps: usize) -> Self {
        Self {
            end_condition: EndCondition::Steps(steps),
        }
    }

    /// Step until `predicate` holds. It is checked before every pop.
    #[must_use]
    pub fn until<P>(predicate: P) -> StopWhen<P>
    where
        P: Fn(&Simulation) -> bool,
    {
        StopWhen { predicate }
    }

    /// Calls `func` after every processed event.
    #[must_use]
    pub fn side_effect<F>(self, func: F) -> ExecutorWithSideEffect<F>
    where
        F: Fn(&Simulation),
    {
        ExecutorWithSideEffect {
            end_condition: self.end_condition,
            side_effect: func,
        }
    }
}

impl Execute for Executor {
    fn execute(self, sim: &mut Simulation) {
        run_with(sim, self.end_condition, |_| {});
    }
}

pub struct ExecutorWithSideEffect<F>
where
    F: Fn(&Simulation),
{
    end_condition: EndCondition,
    side_effect: F,
}

impl<F> Execute for ExecutorWithSideEffect<F>
where
    F: Fn(&Simulation),
{
    fn execute(self, sim: &mut Simulation) {
        run_with(sim, self.end_condition, self.side_effect);
    }
}

/// Executor stopping on an arbitrary predicate, see [`Executor::until`].
pub struct StopWhen<P>
where
    P: Fn(&Simulation) -> bool,
{
    predicate: P,
}

impl<P> Execute for StopWhen<P>
where
    P: Fn(&Simulation) -> bool,
{
    fn execute(self, sim: &mut Simulation) {
        while !(self.predicate)(sim) && sim.step() {}
    }
}

fn run_with<F>(sim: &mut Simulation, end_condition: EndCondition, side_effect: F)
where
    F: Fn(&Simulation),
{
    let mut remaining = match end_condition {
        EndCondition::Steps(steps) => steps,
        _ => usize::MAX,
    };
    while remaining > 0 {
        if let EndCondition::Time(stop) = end_condition {
            // The next event decides; an empty list ends the run as well.
            if !sim.peek_next_event_time().is_some_and(|t| t <= stop) {
                break;
            }
        }
        if !sim.step() {
            break;
        }
        side_effect(sim);
        remaining -= 1;
    }
}

/// Logs progress towards the stop time in steps of ten percent.
///
/// Used as a side effect by [`Simulation::run`] when the experiment asks for
/// a progress display. Without a stop time there is nothing to measure
/// against and it stays silent.
pub struct ProgressReporter {
    stop_time: Option<SimTime>,
    last_decile: Cell<u64>,
}

impl ProgressReporter {
    pub fn new(stop_time: Option<SimTime>) -> Self {
        Self {
            stop_time,
            last_decile: Cell::new(0),
        }
    }

    /// Percentage of the stop time reached at `time`, capped at 100.
    pub fn percent(&self, time: SimTime) -> Option<u64> {
        let stop = self.stop_time?.as_nanos();
        if stop == 0 {
            return Some(100);
        }
        let percent = (u128::from(time.as_nanos()) * 100 / u128::from(stop)).min(100);
        Some(percent as u64)
    }

    pub fn observe(&self, sim: &Simulation) {
        let Some(percent) = self.percent(sim.time()) else {
            return;
        };
        let decile = percent / 10;
        if decile > self.last_decile.get() {
            self.last_decile.set(decile);
            logging::events::progress(&sim.config().name, sim.time(), decile * 10);
        }
    }
}
