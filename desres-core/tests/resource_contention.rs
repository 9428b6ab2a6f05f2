//! Processes competing for a finite pool through the scheduler.

mod common;

use common::{entries, new_log, Action, Script};
use desres_core::{Execute, Executor, ProcessState, SimDuration, Simulation};

use Action::*;

#[test]
fn three_ships_of_three_units() {
    let mut sim = Simulation::default();
    let log = new_log();
    let berths = sim.add_pool("berths", 8).unwrap();

    sim.spawn(
        Script::new("A", berths, vec![Acquire(3), Note("docked"), Hold(10), Release(3)], &log),
        SimDuration::ZERO,
    )
    .unwrap();
    sim.spawn(
        Script::new("B", berths, vec![Acquire(3), Note("docked"), Hold(20), Release(3)], &log),
        SimDuration::ZERO,
    )
    .unwrap();
    let c = sim
        .spawn(
            Script::new("C", berths, vec![Acquire(3), Note("docked"), Hold(5), Release(3)], &log),
            SimDuration::ZERO,
        )
        .unwrap();

    // A and B dock straight away, C has to wait.
    Executor::steps(3).execute(&mut sim);
    let pool = sim.pool(berths).unwrap();
    assert_eq!(pool.available(), 2);
    assert_eq!(pool.queue_len(), 1);
    assert_eq!(sim.process_state(c), Some(ProcessState::Waiting));

    // A leaves at t=10 and its release hands the three units to C.
    assert!(sim.step());
    let pool = sim.pool(berths).unwrap();
    assert_eq!(pool.available(), 2);
    assert_eq!(pool.queue_len(), 0);
    assert_eq!(pool.held_by(c), 3);
    assert_eq!(sim.process_state(c), Some(ProcessState::Scheduled));

    sim.execute(Executor::unbound());
    assert_eq!(
        entries(&log),
        vec!["A@0 docked", "B@0 docked", "C@10 docked"]
    );
    let pool = sim.pool(berths).unwrap();
    assert_eq!(pool.available(), 8);
    assert!(pool.check_invariants());
    assert_eq!(pool.stats().max_wait, SimDuration::from_secs(10));
}

#[test]
fn head_of_line_blocks_later_requests() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 8).unwrap();

    sim.spawn(
        Script::new("holder", pool, vec![Acquire(8), Hold(10), Release(4), Hold(10), Release(4)], &log),
        SimDuration::ZERO,
    )
    .unwrap();
    for (label, units) in [("three", 3), ("one", 1), ("five", 5)] {
        sim.spawn(
            Script::new(label, pool, vec![Acquire(units), Note("granted"), Hold(100), Release(units)], &log),
            SimDuration::from_secs(1),
        )
        .unwrap();
    }

    // The first release makes 4 available: 3 then 1 are served, 5 stays blocked.
    Executor::timed(desres_core::SimTime::from_secs(10)).execute(&mut sim);
    let berths = sim.pool(pool).unwrap();
    assert_eq!(berths.available(), 0);
    assert_eq!(berths.waiting().map(|r| r.units).collect::<Vec<_>>(), vec![5]);

    // The second release makes 4 available again, still not enough for 5.
    Executor::timed(desres_core::SimTime::from_secs(20)).execute(&mut sim);
    let berths = sim.pool(pool).unwrap();
    assert_eq!(berths.available(), 4);
    assert_eq!(berths.queue_len(), 1);

    sim.execute(Executor::unbound());
    assert_eq!(
        entries(&log),
        vec!["three@10 granted", "one@10 granted", "five@110 granted"]
    );
    assert_eq!(sim.pool(pool).unwrap().available(), 8);
}

#[test]
fn new_arrivals_do_not_overtake_waiters() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 4).unwrap();

    sim.spawn(
        Script::new("holder", pool, vec![Acquire(3), Hold(10), Release(3)], &log),
        SimDuration::ZERO,
    )
    .unwrap();
    sim.spawn(
        Script::new("big", pool, vec![Acquire(2), Note("granted"), Release(2)], &log),
        SimDuration::from_secs(1),
    )
    .unwrap();
    // One unit is free when this arrives, but `big` is already waiting.
    sim.spawn(
        Script::new("small", pool, vec![Acquire(1), Note("granted"), Release(1)], &log),
        SimDuration::from_secs(2),
    )
    .unwrap();

    sim.execute(Executor::unbound());
    assert_eq!(entries(&log), vec!["big@10 granted", "small@10 granted"]);
    let stats = sim.pool(pool).unwrap().stats();
    assert_eq!(stats.immediate_grants, 1);
    assert_eq!(stats.queued_requests, 2);
}

#[test]
fn capacity_invariant_holds_at_every_step() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 5).unwrap();

    for i in 0..40_i64 {
        let units = (i % 3 + 1) as u32;
        sim.spawn(
            Script::new("ship", pool, vec![Acquire(units), Hold(i % 7 + 1), Release(units)], &log),
            SimDuration::from_secs(i / 4),
        )
        .unwrap();
    }

    while sim.step() {
        let berths = sim.pool(pool).unwrap();
        assert!(berths.check_invariants(), "invariant broken at {}", sim.time());
        assert_eq!(
            u64::from(berths.capacity() - berths.available()),
            berths.total_held()
        );
    }

    let report = sim.finish();
    let berths = report.pool("berths").unwrap();
    assert_eq!(berths.available, 5);
    assert_eq!(berths.stats.grants, 40);
    assert_eq!(report.processes.terminated, 40);
    assert!(report.failures.is_empty());
}
