//! Experiment configuration
//!
//! Times are written in the experiment's reference [`TimeUnit`] so that a
//! model working in minutes can say `"stop_time": 1500.0` rather than a
//! nanosecond count.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::time::{SimTime, TimeUnit};
use crate::trace::TimeWindow;

/// Configuration read once when a [`crate::Simulation`] is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub name: String,
    /// Master seed; every random stream derives its own seed from it.
    pub seed: u64,
    pub time_unit: TimeUnit,
    /// Stop once the next event would be after this time. `None` runs until
    /// no events remain.
    pub stop_time: Option<f64>,
    pub trace_window: Option<(f64, f64)>,
    pub debug_window: Option<(f64, f64)>,
    pub progress_display: bool,
    /// Keep the record of every process that terminated normally. Long runs
    /// that create many short-lived processes can turn this off; they are
    /// then only counted in the report.
    pub keep_finished_records: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: "simulation".to_string(),
            seed: 1,
            time_unit: TimeUnit::Seconds,
            stop_time: None,
            trace_window: None,
            debug_window: None,
            progress_display: false,
            keep_finished_records: true,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let config: SimulationConfig = serde_json::from_str(json)
            .map_err(|e| SimError::Configuration(format!("invalid experiment config: {e}")))?;
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
        self.stop_time()?;
        for window in [self.trace_window()?, self.debug_window()?].into_iter().flatten() {
            if window.start > window.end {
                return Err(SimError::Configuration(
                    "a trace window starts after it ends".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The stop time as an instant; `Ok(None)` when the run is unbounded.
    pub fn stop_time(&self) -> Result<Option<SimTime>, SimError> {
        self.stop_time
            .map(|t| self.instant("stop_time", t))
            .transpose()
    }

    pub fn trace_window(&self) -> Result<Option<TimeWindow>, SimError> {
        self.window("trace_window", self.trace_window)
    }

    pub fn debug_window(&self) -> Result<Option<TimeWindow>, SimError> {
        self.window("debug_window", self.debug_window)
    }

    fn window(
        &self,
        label: &str,
        window: Option<(f64, f64)>,
    ) -> Result<Option<TimeWindow>, SimError> {
        let Some((start, end)) = window else {
            return Ok(None);
        };
        Ok(Some(TimeWindow::new(
            self.instant(label, start)?,
            self.instant(label, end)?,
        )))
    }

    fn instant(&self, label: &str, value: f64) -> Result<SimTime, SimError> {
        SimTime::try_from_units(value, self.time_unit).ok_or_else(|| {
            SimError::Configuration(format!(
                "{label} must be a finite, non-negative time, got {value}"
            ))
        })
    }
}
