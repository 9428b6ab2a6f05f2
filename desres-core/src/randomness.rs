//! Randomness facade for deterministic simulation.
//!
//! Processes draw their stochastic inputs (inter-arrival times, sizes, service
//! durations) from named [`RandomStream`]s owned by the simulation. Every
//! stream gets its own seed, derived from the master seed and the stream name,
//! so adding a stream never perturbs the values drawn from the others and a
//! fixed master seed reproduces a run exactly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal, Uniform};

use crate::error::SimError;
use crate::types::StreamKey;

/// Redraws allowed for a non-negative normal sample before clamping to zero.
const MAX_NON_NEGATIVE_ATTEMPTS: usize = 1_000;

/// Sampling interface consumed by processes.
pub trait RandomStream {
    /// Uniform integer in `[min, max]`.
    fn sample_uniform_int(&mut self, min: i64, max: i64) -> Result<i64, SimError>;

    /// Exponential sample with the given `rate` (mean `1 / rate`).
    fn sample_exponential(&mut self, rate: f64) -> Result<f64, SimError>;

    /// Normal sample. With `non_negative`, negative draws are discarded.
    fn sample_normal(&mut self, mean: f64, stdev: f64, non_negative: bool)
        -> Result<f64, SimError>;

    /// Number of values produced so far.
    fn samples(&self) -> u64;
}

/// Const-friendly 64-bit FNV-1a hash.
pub const fn fnv1a64(s: &str) -> u64 {
    let bytes = s.as_bytes();
    let mut hash: u64 = 0xcbf29ce484222325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x100000001b3);
        i += 1;
    }
    hash
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for the stream called `name` under `master_seed`.
pub fn derive_seed(master_seed: u64, name: &str) -> u64 {
    splitmix64(master_seed ^ fnv1a64(name))
}

/// [`RandomStream`] backed by a seeded ChaCha generator.
#[derive(Debug, Clone)]
pub struct SeededStream {
    name: String,
    seed: u64,
    rng: ChaCha8Rng,
    samples: u64,
}

impl SeededStream {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            samples: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rewind to the first value.
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.samples = 0;
    }

    fn invalid(&self, what: String) -> SimError {
        SimError::Configuration(format!("stream {}: {what}", self.name))
    }
}

impl RandomStream for SeededStream {
    fn sample_uniform_int(&mut self, min: i64, max: i64) -> Result<i64, SimError> {
        if min > max {
            return Err(self.invalid(format!("uniform bounds {min} > {max}")));
        }
        self.samples += 1;
        Ok(self.rng.sample(Uniform::new_inclusive(min, max)))
    }

    fn sample_exponential(&mut self, rate: f64) -> Result<f64, SimError> {
        let exp = Exp::new(rate)
            .ok()
            .filter(|_| rate > 0.0 && rate.is_finite())
            .ok_or_else(|| self.invalid(format!("exponential rate {rate} must be positive")))?;
        self.samples += 1;
        Ok(exp.sample(&mut self.rng))
    }

    fn sample_normal(
        &mut self,
        mean: f64,
        stdev: f64,
        non_negative: bool,
    ) -> Result<f64, SimError> {
        let normal = Normal::new(mean, stdev)
            .ok()
            .filter(|_| mean.is_finite() && stdev.is_finite())
            .ok_or_else(|| self.invalid(format!("normal({mean}, {stdev}) is not valid")))?;
        self.samples += 1;
        if !non_negative {
            return Ok(normal.sample(&mut self.rng));
        }
        for _ in 0..MAX_NON_NEGATIVE_ATTEMPTS {
            let value = normal.sample(&mut self.rng);
            if value >= 0.0 {
                return Ok(value);
            }
        }
        Ok(0.0)
    }

    fn samples(&self) -> u64 {
        self.samples
    }
}

/// Streams registered with a simulation, addressed by [`StreamKey`].
pub(crate) struct StreamRegistry {
    master_seed: u64,
    streams: Vec<(String, Box<dyn RandomStream>)>,
}

impl StreamRegistry {
    pub(crate) fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            streams: Vec::new(),
        }
    }

    pub(crate) fn add_seeded(&mut self, name: &str) -> StreamKey {
        let seed = derive_seed(self.master_seed, name);
        self.add(name, Box::new(SeededStream::new(name, seed)))
    }

    pub(crate) fn add(&mut self, name: &str, stream: Box<dyn RandomStream>) -> StreamKey {
        self.streams.push((name.to_string(), stream));
        StreamKey(self.streams.len() - 1)
    }

    pub(crate) fn get_mut(&mut self, key: StreamKey) -> Result<&mut dyn RandomStream, SimError> {
        match self.streams.get_mut(key.0) {
            Some((_, stream)) => Ok(stream.as_mut()),
            None => Err(SimError::UnknownStream(key.to_string())),
        }
    }

    pub(crate) fn summary(&self) -> Vec<(String, u64)> {
        self.streams
            .iter()
            .map(|(name, stream)| (name.clone(), stream.samples()))
            .collect()
    }
}
