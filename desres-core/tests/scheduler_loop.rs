//! Scheduler loop: activation, same-time ordering, fault isolation and the
//! model trace.

mod common;

use common::{entries, new_log, Action, Script};
use desres_core::{
    MemorySink, ProcessState, SimDuration, SimError, SimTime, Simulation, SimulationConfig,
    TraceLevel,
};

use Action::*;

#[test]
fn unactivated_process_never_runs() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 1).unwrap();

    let idle = sim.create(Script::new("idle", pool, vec![Note("ran")], &log));
    sim.spawn(Script::new("busy", pool, vec![Hold(5), Note("ran")], &log), SimDuration::ZERO)
        .unwrap();
    sim.run();

    assert_eq!(entries(&log), vec!["busy@5 ran"]);
    assert_eq!(sim.process_state(idle), Some(ProcessState::Created));
    let report = sim.finish();
    assert_eq!(report.processes.created, 1);
    assert_eq!(report.processes.terminated, 1);
}

#[test]
fn same_time_resumptions_follow_scheduling_order() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 1).unwrap();

    let labels: Vec<String> = (0..50).map(|i| format!("p{i}")).collect();
    for label in &labels {
        sim.spawn(Script::new(label, pool, vec![Note("ran")], &log), SimDuration::from_secs(3))
            .unwrap();
    }
    sim.run();

    let expected: Vec<String> = labels.iter().map(|l| format!("{l}@3 ran")).collect();
    assert_eq!(entries(&log), expected);
}

#[test]
fn immediate_grant_continues_in_the_same_cycle() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 2).unwrap();

    sim.spawn(
        Script::new("quick", pool, vec![Acquire(2), Note("docked"), Release(2), Note("left")], &log),
        SimDuration::ZERO,
    )
    .unwrap();

    assert!(sim.step());
    assert!(!sim.has_pending_events());
    assert_eq!(sim.events_processed(), 1);
    assert_eq!(entries(&log), vec!["quick@0 docked", "quick@0 left"]);
}

#[test]
fn process_errors_only_terminate_the_offender() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 2).unwrap();

    let greedy = sim
        .spawn(Script::new("greedy", pool, vec![Acquire(3)], &log), SimDuration::ZERO)
        .unwrap();
    let thief = sim
        .spawn(Script::new("thief", pool, vec![Release(1)], &log), SimDuration::ZERO)
        .unwrap();
    let rewinder = sim
        .spawn(Script::new("rewinder", pool, vec![Hold(-1)], &log), SimDuration::ZERO)
        .unwrap();
    let broken = sim
        .spawn(Script::new("broken", pool, vec![Fail("cargo on fire")], &log), SimDuration::ZERO)
        .unwrap();
    sim.spawn(
        Script::new(
            "survivor",
            pool,
            vec![Hold(1), Acquire(2), Note("docked"), Release(2)],
            &log,
        ),
        SimDuration::ZERO,
    )
    .unwrap();

    sim.run();

    assert_eq!(entries(&log), vec!["survivor@1 docked"]);
    for id in [greedy, thief, rewinder, broken] {
        assert_eq!(sim.process_state(id), Some(ProcessState::Terminated));
        assert!(sim.process_record(id).unwrap().failure.is_some());
    }
    assert_eq!(sim.pool(pool).unwrap().available(), 2);

    let report = sim.finish();
    assert_eq!(report.processes.terminated, 5);
    assert_eq!(report.processes.failed, 4);
    let error_of = |name: &str| {
        report
            .failures
            .iter()
            .find(|f| f.name.starts_with(name))
            .map(|f| f.error.clone())
            .unwrap()
    };
    assert!(error_of("greedy").contains("invalid request of 3 units"));
    assert!(error_of("thief").contains("holds 0"));
    assert!(error_of("rewinder").contains("negative delay"));
    assert!(error_of("broken").contains("cargo on fire"));
}

#[test]
fn units_stay_allocated_when_holder_terminates() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 3).unwrap();

    let leaker = sim
        .spawn(Script::new("leaker", pool, vec![Acquire(2)], &log), SimDuration::ZERO)
        .unwrap();
    let waiter = sim
        .spawn(Script::new("waiter", pool, vec![Acquire(2), Note("docked")], &log), SimDuration::ZERO)
        .unwrap();
    sim.run();

    let berths = sim.pool(pool).unwrap();
    assert_eq!(berths.held_by(leaker), 2);
    assert_eq!(berths.available(), 1);
    assert_eq!(sim.process_state(leaker), Some(ProcessState::Terminated));
    assert_eq!(sim.process_state(waiter), Some(ProcessState::Waiting));
    assert!(entries(&log).is_empty());
    assert_eq!(sim.finish().processes.waiting, 1);
}

#[test]
fn trace_notes_respect_windows() {
    let config = SimulationConfig {
        trace_window: Some((0.0, 100.0)),
        debug_window: Some((0.0, 50.0)),
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    let sink = MemorySink::new();
    sim.set_trace_sink(Box::new(sink.clone()));
    let log = new_log();
    let pool = sim.add_pool("berths", 1).unwrap();

    sim.spawn(
        Script::new(
            "ship",
            pool,
            vec![
                Hold(10),
                Note("early"),
                Hold(50),
                Note("middle"),
                Hold(60),
                Note("late"),
                Hold(80),
                Fail("sunk"),
            ],
            &log,
        ),
        SimDuration::ZERO,
    )
    .unwrap();
    sim.run();

    let notes = sink.notes();
    let trace: Vec<_> = notes
        .iter()
        .filter(|n| n.level == TraceLevel::Trace)
        .map(|n| (n.time, n.message.as_str()))
        .collect();
    assert_eq!(
        trace,
        vec![(SimTime::from_secs(10), "early"), (SimTime::from_secs(60), "middle")]
    );

    let debug: Vec<_> = notes.iter().filter(|n| n.level == TraceLevel::Debug).collect();
    assert!(!debug.is_empty());
    assert!(debug.iter().all(|n| n.time < SimTime::from_secs(50)));
    assert!(debug.iter().all(|n| n.process_name == "ship#1"));

    let errors: Vec<_> = notes.iter().filter(|n| n.level == TraceLevel::Error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].time, SimTime::from_secs(200));
    assert!(errors[0].message.contains("sunk"));
}

#[test]
fn run_stops_at_configured_time() {
    let config = SimulationConfig {
        stop_time: Some(30.0),
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    let log = new_log();
    let pool = sim.add_pool("berths", 1).unwrap();

    let id = sim
        .spawn(
            Script::new("slow", pool, vec![Hold(20), Note("first"), Hold(20), Note("second")], &log),
            SimDuration::ZERO,
        )
        .unwrap();
    sim.run();

    assert_eq!(entries(&log), vec!["slow@20 first"]);
    assert_eq!(sim.time(), SimTime::from_secs(20));
    assert_eq!(sim.peek_next_event_time(), Some(SimTime::from_secs(40)));
    assert_eq!(sim.process_state(id), Some(ProcessState::Scheduled));

    let report = sim.finish();
    assert_eq!(report.pending_events, 1);
    assert_eq!(report.processes.scheduled, 1);
    // The report covers the run up to the stop time.
    assert_eq!(report.final_time, SimTime::from_secs(30));
    assert_eq!(report.pools[0].utilization, 0.0);
}

#[test]
fn invalid_stop_time_is_rejected_before_running() {
    let config = SimulationConfig {
        stop_time: Some(-5.0),
        ..SimulationConfig::default()
    };
    assert!(matches!(Simulation::new(config), Err(SimError::Configuration(_))));
}

#[test]
fn waiting_process_cannot_be_detached() {
    let mut sim = Simulation::default();
    let log = new_log();
    let pool = sim.add_pool("berths", 2).unwrap();

    sim.spawn(
        Script::new("holder", pool, vec![Acquire(2), Hold(10), Release(2)], &log),
        SimDuration::ZERO,
    )
    .unwrap();
    let waiter = sim
        .spawn(
            Script::new("waiter", pool, vec![Acquire(2), Note("docked"), Release(2)], &log),
            SimDuration::ZERO,
        )
        .unwrap();
    sim.step();
    sim.step();
    assert_eq!(sim.process_state(waiter), Some(ProcessState::Waiting));

    assert!(sim.take_process::<Script>(waiter).is_none());
    sim.run();

    assert_eq!(entries(&log), vec!["waiter@10 docked"]);
    let berths = sim.pool(pool).unwrap();
    assert_eq!(berths.available(), 2);
    assert_eq!(berths.held_by(waiter), 0);
    assert!(sim.process_record(waiter).unwrap().failure.is_none());
}
