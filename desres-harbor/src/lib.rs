//! Container terminal model
//!
//! Ships arrive at a quay with a fixed number of berths. Each ship needs one
//! to three berths depending on its size; if they are free it docks and is
//! unloaded, otherwise it waits in line until earlier ships leave. Unloading
//! takes a normally distributed time per berth, multiplied by the size.
//!
//! All times are in the experiment's reference unit, minutes by default.

use std::path::Path;

use desres_core::{
    PoolKey, Process, ProcessContext, ProcessId, RandomStream, SimDuration, SimError,
    Simulation, SimulationConfig, SimulationReport, Step, StreamKey, TimeUnit,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const BERTHS_POOL: &str = "Berths";
pub const SIZE_STREAM: &str = "Ship size";
pub const ARRIVAL_STREAM: &str = "Ship arrival";
pub const SERVICE_STREAM: &str = "Service time";

/// Model parameters plus the experiment around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarborConfig {
    pub berths: u32,
    /// Mean time between two ship arrivals.
    pub arrival_mean: f64,
    pub min_ship_size: u32,
    pub max_ship_size: u32,
    /// Unloading time per berth.
    pub service_mean: f64,
    pub service_stdev: f64,
    pub experiment: SimulationConfig,
}

impl Default for HarborConfig {
    fn default() -> Self {
        Self {
            berths: 8,
            arrival_mean: 3.0,
            min_ship_size: 1,
            max_ship_size: 3,
            service_mean: 1.0,
            service_stdev: 6.0,
            experiment: SimulationConfig {
                name: "ResExample".to_string(),
                seed: 1,
                time_unit: TimeUnit::Minutes,
                stop_time: Some(1500.0),
                trace_window: Some((0.0, 100.0)),
                debug_window: Some((0.0, 50.0)),
                progress_display: true,
                // Every ship leaves a record; fine for the reference run.
                keep_finished_records: true,
            },
        }
    }
}

impl HarborConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let config: HarborConfig = serde_json::from_str(json)
            .map_err(|e| SimError::Configuration(format!("invalid harbor config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SimError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.berths == 0 {
            return Err(invalid("the quay needs at least one berth".to_string()));
        }
        if !(self.arrival_mean.is_finite() && self.arrival_mean > 0.0) {
            return Err(invalid(format!(
                "arrival_mean must be positive, got {}",
                self.arrival_mean
            )));
        }
        if self.min_ship_size == 0
            || self.min_ship_size > self.max_ship_size
            || self.max_ship_size > self.berths
        {
            return Err(invalid(format!(
                "ship sizes {}..={} do not fit {} berths",
                self.min_ship_size, self.max_ship_size, self.berths
            )));
        }
        if !(self.service_mean.is_finite()
            && self.service_stdev.is_finite()
            && self.service_stdev >= 0.0)
        {
            return Err(invalid(format!(
                "service time normal({}, {}) is not valid",
                self.service_mean, self.service_stdev
            )));
        }
        self.experiment.validate()
    }
}

fn invalid(what: String) -> SimError {
    SimError::Configuration(what)
}

/// What every ship and the generator need to know about the harbour.
#[derive(Debug, Clone, Copy)]
struct Quay {
    berths: PoolKey,
    size: StreamKey,
    arrival: StreamKey,
    service: StreamKey,
    arrival_rate: f64,
    min_size: u32,
    max_size: u32,
    service_mean: f64,
    service_stdev: f64,
    unit: TimeUnit,
}

impl Quay {
    fn span(&self, value: f64) -> SimDuration {
        SimDuration::from_units(value, self.unit)
    }

    fn next_arrival(&self, stream: &mut dyn RandomStream) -> Result<SimDuration, SimError> {
        Ok(self.span(stream.sample_exponential(self.arrival_rate)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShipPhase {
    Arriving,
    Docked,
    Unloaded,
}

/// A container ship: docks, is unloaded, leaves.
pub struct Ship {
    quay: Quay,
    size: u32,
    phase: ShipPhase,
}

impl Ship {
    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Process for Ship {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
        match self.phase {
            ShipPhase::Arriving => {
                self.phase = ShipPhase::Docked;
                Ok(Step::Acquire {
                    pool: self.quay.berths,
                    units: self.size,
                })
            }
            ShipPhase::Docked => {
                ctx.trace_note("is docked and gets loaded");
                let per_berth = ctx.stream(self.quay.service)?.sample_normal(
                    self.quay.service_mean,
                    self.quay.service_stdev,
                    true,
                )?;
                self.phase = ShipPhase::Unloaded;
                Ok(Step::Hold(self.quay.span(per_berth * f64::from(self.size))))
            }
            ShipPhase::Unloaded => {
                ctx.release(self.quay.berths, self.size)?;
                ctx.trace_note("departs for the Baltic Sea");
                Ok(Step::Terminate)
            }
        }
    }
}

/// Sends ships to the harbour for as long as the simulation runs.
pub struct ShipGenerator {
    quay: Quay,
    ships_generated: u64,
}

impl ShipGenerator {
    pub fn ships_generated(&self) -> u64 {
        self.ships_generated
    }
}

impl Process for ShipGenerator {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
        let quay = self.quay;
        let size = ctx
            .stream(quay.size)?
            .sample_uniform_int(i64::from(quay.min_size), i64::from(quay.max_size))?;
        let size = u32::try_from(size)
            .map_err(|_| SimError::Internal(format!("ship size {size} out of range")))?;

        let ship = ctx.spawn(
            Ship {
                quay,
                size,
                phase: ShipPhase::Arriving,
            },
            SimDuration::ZERO,
        )?;
        self.ships_generated += 1;
        debug!(%ship, size, "Ship arrives");

        Ok(Step::Hold(quay.next_arrival(ctx.stream(quay.arrival)?)?))
    }
}

/// Handles to the parts of the model registered with a simulation.
#[derive(Debug, Clone, Copy)]
pub struct Harbor {
    pub berths: PoolKey,
    pub generator: ProcessId,
}

impl Harbor {
    /// Registers the berths, the random streams and the ship generator. The
    /// generator's first resumption is one inter-arrival time from now.
    pub fn build(sim: &mut Simulation, config: &HarborConfig) -> Result<Self, SimError> {
        config.validate()?;

        let berths = sim.add_pool(BERTHS_POOL, config.berths)?;
        let quay = Quay {
            berths,
            size: sim.add_stream(SIZE_STREAM),
            arrival: sim.add_stream(ARRIVAL_STREAM),
            service: sim.add_stream(SERVICE_STREAM),
            arrival_rate: 1.0 / config.arrival_mean,
            min_size: config.min_ship_size,
            max_size: config.max_ship_size,
            service_mean: config.service_mean,
            service_stdev: config.service_stdev,
            unit: config.experiment.time_unit,
        };

        let generator = sim.create(ShipGenerator {
            quay,
            ships_generated: 0,
        });
        let first = quay.next_arrival(sim.stream(quay.arrival)?)?;
        sim.activate(generator, first)?;

        info!(
            berths = config.berths,
            arrival_mean = config.arrival_mean,
            "Harbor model built"
        );
        Ok(Self { berths, generator })
    }

    /// Ships sent so far, read from the generator.
    pub fn ships_generated(&self, sim: &mut Simulation) -> u64 {
        sim.process_mut::<ShipGenerator>(self.generator)
            .map_or(0, |g| g.ships_generated())
    }
}

/// init → run → finish with the given configuration.
pub fn run_harbor(config: &HarborConfig) -> Result<SimulationReport, SimError> {
    let mut sim = Simulation::new(config.experiment.clone())?;
    Harbor::build(&mut sim, config)?;
    sim.run();
    Ok(sim.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_experiment() {
        let config = HarborConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.berths, 8);
        assert_eq!(
            config.experiment.stop_time().unwrap(),
            Some(desres_core::SimTime::from_secs(1500 * 60))
        );
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let cases = [
            HarborConfig {
                berths: 0,
                ..HarborConfig::default()
            },
            HarborConfig {
                max_ship_size: 9,
                ..HarborConfig::default()
            },
            HarborConfig {
                min_ship_size: 0,
                ..HarborConfig::default()
            },
            HarborConfig {
                arrival_mean: 0.0,
                ..HarborConfig::default()
            },
            HarborConfig {
                service_stdev: -1.0,
                ..HarborConfig::default()
            },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(SimError::Configuration(_))));
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HarborConfig::from_json_str(
            r#"{ "berths": 4, "experiment": { "seed": 99, "time_unit": "minutes", "stop_time": 200.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.berths, 4);
        assert_eq!(config.max_ship_size, 3);
        assert_eq!(config.experiment.seed, 99);
        // A nested experiment object replaces the default one as a whole.
        assert_eq!(config.experiment.trace_window, None);
    }
}
