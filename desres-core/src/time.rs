//! Simulation time
//!
//! [`SimTime`] is an instant on the simulation clock and can never be
//! negative. [`SimDuration`] is a signed span, so that a negative delay coming
//! out of a model computation (an unclamped normal sample, say) can be
//! represented and rejected when it is scheduled instead of wrapping.
//!
//! Both count nanoseconds. Models think in a reference [`TimeUnit`] and
//! convert at the edges with `from_units`/`as_units`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Instant on the simulation clock, in nanoseconds since the start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    pub const MAX: SimTime = SimTime(u64::MAX);

    pub const fn zero() -> Self {
        SimTime(0)
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis.saturating_mul(1_000_000))
    }

    pub const fn from_secs(secs: u64) -> Self {
        SimTime(secs.saturating_mul(1_000_000_000))
    }

    /// Instant `value` units after the start.
    ///
    /// `None` for negative, non-finite or overflowing values.
    pub fn try_from_units(value: f64, unit: TimeUnit) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let nanos = (value * unit.nanos_per_unit()).round();
        (nanos <= u64::MAX as f64).then(|| SimTime(nanos as u64))
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.as_units(TimeUnit::Seconds)
    }

    pub fn as_units(&self, unit: TimeUnit) -> f64 {
        self.0 as f64 / unit.nanos_per_unit()
    }

    /// Signed span from `earlier` to `self`.
    pub fn span_since(&self, earlier: SimTime) -> SimDuration {
        let diff = i128::from(self.0) - i128::from(earlier.0);
        SimDuration(diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }

    /// `self + span`, or `None` when the span is negative or the result
    /// does not fit.
    pub fn checked_offset(&self, span: SimDuration) -> Option<SimTime> {
        let span = u64::try_from(span.0).ok()?;
        self.0.checked_add(span).map(SimTime)
    }
}

impl Sub for SimTime {
    type Output = SimDuration;

    fn sub(self, rhs: SimTime) -> SimDuration {
        self.span_since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (scale, suffix) = match self.0 {
            n if n >= 1_000_000_000 => (1e9, "s"),
            n if n >= 1_000_000 => (1e6, "ms"),
            n if n >= 1_000 => (1e3, "µs"),
            _ => return write!(f, "{}ns", self.0),
        };
        write!(f, "{:.3}{suffix}", self.0 as f64 / scale)
    }
}

/// Signed span of simulation time in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimDuration(i64);

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        SimDuration(nanos)
    }

    pub const fn from_millis(millis: i64) -> Self {
        SimDuration(millis.saturating_mul(1_000_000))
    }

    pub const fn from_secs(secs: i64) -> Self {
        SimDuration(secs.saturating_mul(1_000_000_000))
    }

    pub const fn from_mins(mins: i64) -> Self {
        SimDuration(mins.saturating_mul(60_000_000_000))
    }

    /// Non-finite input saturates and NaN maps to zero, as `f64 as i64` does.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_units(secs, TimeUnit::Seconds)
    }

    pub fn from_mins_f64(mins: f64) -> Self {
        Self::from_units(mins, TimeUnit::Minutes)
    }

    pub fn from_units(value: f64, unit: TimeUnit) -> Self {
        SimDuration((value * unit.nanos_per_unit()).round() as i64)
    }

    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.as_units(TimeUnit::Seconds)
    }

    pub fn as_units(&self, unit: TimeUnit) -> f64 {
        self.0 as f64 / unit.nanos_per_unit()
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for SimDuration {
    type Output = SimDuration;

    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0.saturating_add(rhs.0))
    }
}

impl Sub for SimDuration {
    type Output = SimDuration;

    fn sub(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for SimDuration {
    type Output = SimDuration;

    fn neg(self) -> SimDuration {
        SimDuration(self.0.saturating_neg())
    }
}

impl Mul<f64> for SimDuration {
    type Output = SimDuration;

    fn mul(self, rhs: f64) -> SimDuration {
        SimDuration((self.0 as f64 * rhs).round() as i64)
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            f.write_str("-")?;
        }
        SimTime(self.0.unsigned_abs()).fmt(f)
    }
}

/// Reference unit in which a model expresses its times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub fn nanos_per_unit(&self) -> f64 {
        match self {
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1e3,
            TimeUnit::Milliseconds => 1e6,
            TimeUnit::Seconds => 1e9,
            TimeUnit::Minutes => 60e9,
            TimeUnit::Hours => 3600e9,
        }
    }
}
