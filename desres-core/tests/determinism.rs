//! Determinism guardrail tests
//!
//! Identical configurations must produce identical runs, down to the order of
//! same-time resumptions and every value drawn from a random stream.

use desres_core::{
    MemorySink, PoolKey, Process, ProcessContext, RandomStream, SimDuration, SimError,
    Simulation, SimulationConfig, Step, StreamKey,
};

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Arrived(u32),
    Docked(u32),
    Done(u32),
}

/// Repeatedly grabs a random number of units for a random time.
struct Worker {
    pool: PoolKey,
    stream: StreamKey,
    rounds: u32,
    phase: Phase,
}

impl Process for Worker {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
        loop {
            match self.phase {
                Phase::Idle => {
                    if self.rounds == 0 {
                        return Ok(Step::Terminate);
                    }
                    self.rounds -= 1;
                    let stream = ctx.stream(self.stream)?;
                    let units = stream.sample_uniform_int(1, 3)? as u32;
                    let pause = stream.sample_exponential(0.5)?;
                    ctx.trace_note(format!("wants {units} after {pause:.6}"));
                    self.phase = Phase::Arrived(units);
                    return Ok(Step::Hold(SimDuration::from_secs_f64(pause)));
                }
                Phase::Arrived(units) => {
                    self.phase = Phase::Docked(units);
                    return Ok(Step::Acquire {
                        pool: self.pool,
                        units,
                    });
                }
                Phase::Docked(units) => {
                    let busy = ctx.stream(self.stream)?.sample_normal(4.0, 2.0, true)?;
                    ctx.trace_note(format!("working {busy:.6}"));
                    self.phase = Phase::Done(units);
                    return Ok(Step::Hold(SimDuration::from_secs_f64(busy)));
                }
                Phase::Done(units) => {
                    ctx.release(self.pool, units)?;
                    ctx.trace_note(format!("released {units}"));
                    self.phase = Phase::Idle;
                }
            }
        }
    }
}

fn run_workers(seed: u64, extra_stream: bool) -> Vec<String> {
    let config = SimulationConfig {
        seed,
        trace_window: Some((0.0, 1e6)),
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    let sink = MemorySink::new();
    sim.set_trace_sink(Box::new(sink.clone()));

    let pool = sim.add_pool("berths", 4).unwrap();
    if extra_stream {
        sim.add_stream("unused");
    }
    for i in 0..5 {
        let stream = sim.add_stream(&format!("worker-{i}"));
        sim.spawn(
            Worker {
                pool,
                stream,
                rounds: 20,
                phase: Phase::Idle,
            },
            SimDuration::ZERO,
        )
        .unwrap();
    }
    sim.run();

    let report = sim.finish();
    assert!(report.failures.is_empty());
    assert_eq!(report.processes.terminated, 5);
    sink.notes()
        .iter()
        .map(|n| format!("{} {} {}", n.time, n.process_name, n.message))
        .collect()
}

#[test]
fn same_seed_reproduces_the_run() {
    let baseline = run_workers(42, false);
    // 5 workers, 20 rounds, 3 notes per round.
    assert_eq!(baseline.len(), 300);

    for _ in 0..10 {
        assert_eq!(baseline, run_workers(42, false));
    }
}

#[test]
fn different_seed_changes_the_run() {
    assert_ne!(run_workers(42, false), run_workers(43, false));
}

#[test]
fn adding_a_stream_does_not_perturb_the_others() {
    assert_eq!(run_workers(7, false), run_workers(7, true));
}
