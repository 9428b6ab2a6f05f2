//! Demonstration of logging and the model trace in desres-core
//!
//! Trucks queue for two cranes. Kernel diagnostics go through `tracing`;
//! the model trace is forwarded to `tracing` as well (target `desres::trace`)
//! because no other sink is installed.
//!
//! ```bash
//! cargo run --example logging_demo
//! RUST_LOG=debug cargo run --example logging_demo
//! RUST_LOG=desres_core::resource=trace cargo run --example logging_demo
//! ```

use desres_core::{
    init_simulation_logging_with_level, PoolKey, Process, ProcessContext, RandomStream,
    SimDuration, SimError, Simulation, SimulationConfig, Step, StreamKey, TimeUnit,
};
use tracing::info;

enum TruckPhase {
    Arriving,
    UnderCrane,
    Unloaded,
}

struct Truck {
    cranes: PoolKey,
    unload: StreamKey,
    phase: TruckPhase,
}

impl Process for Truck {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
        match self.phase {
            TruckPhase::Arriving => {
                ctx.trace_note("arrives at the gate");
                self.phase = TruckPhase::UnderCrane;
                Ok(Step::Acquire {
                    pool: self.cranes,
                    units: 1,
                })
            }
            TruckPhase::UnderCrane => {
                let minutes = ctx.stream(self.unload)?.sample_normal(4.0, 1.5, true)?;
                ctx.trace_note(format!("is unloaded for {minutes:.2} min"));
                self.phase = TruckPhase::Unloaded;
                Ok(Step::Hold(SimDuration::from_mins_f64(minutes)))
            }
            TruckPhase::Unloaded => {
                ctx.release(self.cranes, 1)?;
                ctx.trace_note("leaves the yard");
                Ok(Step::Terminate)
            }
        }
    }
}

/// Sends a truck every few minutes.
struct Gate {
    cranes: PoolKey,
    arrivals: StreamKey,
    unload: StreamKey,
    remaining: u32,
}

impl Process for Gate {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
        if self.remaining == 0 {
            return Ok(Step::Terminate);
        }
        self.remaining -= 1;
        ctx.spawn(
            Truck {
                cranes: self.cranes,
                unload: self.unload,
                phase: TruckPhase::Arriving,
            },
            SimDuration::ZERO,
        )?;
        let minutes = ctx.stream(self.arrivals)?.sample_exponential(1.0 / 2.5)?;
        Ok(Step::Hold(SimDuration::from_mins_f64(minutes)))
    }
}

fn main() -> Result<(), SimError> {
    init_simulation_logging_with_level("info");

    let config = SimulationConfig {
        name: "CraneYard".to_string(),
        seed: 7,
        time_unit: TimeUnit::Minutes,
        stop_time: Some(120.0),
        trace_window: Some((0.0, 30.0)),
        debug_window: Some((0.0, 10.0)),
        progress_display: true,
        keep_finished_records: true,
    };

    let mut sim = Simulation::new(config)?;
    let cranes = sim.add_pool("cranes", 2)?;
    let arrivals = sim.add_stream("arrivals");
    let unload = sim.add_stream("unload");
    sim.spawn(
        Gate {
            cranes,
            arrivals,
            unload,
            remaining: 40,
        },
        SimDuration::ZERO,
    )?;

    sim.run();
    let report = sim.finish();

    if let Some(cranes) = report.pool("cranes") {
        info!(
            utilization = cranes.utilization,
            mean_wait = %cranes.mean_wait,
            max_queue = cranes.stats.max_queue_len,
            "Crane statistics"
        );
    }
    info!(
        trucks_done = report.processes.terminated,
        still_waiting = report.processes.waiting,
        "Demo finished"
    );
    Ok(())
}
