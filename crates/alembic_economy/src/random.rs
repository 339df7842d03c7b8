//! # Random Sources
//!
//! **Randomness is injected, never ambient.**
//!
//! The resolver draws every uniform value it needs from a [`RandomSource`]
//! handed to it by the caller. Games use [`SeededRandom`] (`ChaCha8`, seeded
//! and resumable from a save file); tests use [`ScriptedRandom`] to pin exact
//! outcomes.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A capability producing uniform values in `[0, 1)`.
pub trait RandomSource {
    /// Next uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

/// Deterministic `ChaCha8` generator.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
    seed: u64,
    draws: u64,
}

impl SeededRandom {
    /// Creates a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            draws: 0,
        }
    }

    /// Seed this generator started from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Values drawn so far.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Position to persist.
    #[must_use]
    pub const fn to_state(&self) -> RandomState {
        RandomState {
            seed: self.seed,
            draws: self.draws,
        }
    }

    /// Resumes a generator exactly where it was saved.
    #[must_use]
    pub fn from_state(state: RandomState) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(state.seed);
        // each draw consumes one u64, i.e. two 32-bit words of the stream
        rng.set_word_pos(u128::from(state.draws) * 2);
        Self {
            rng,
            seed: state.seed,
            draws: state.draws,
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.draws += 1;
        self.rng.gen::<f64>()
    }
}

/// Persisted position of a [`SeededRandom`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomState {
    /// Starting seed.
    #[serde(with = "seed_text")]
    pub seed: u64,
    /// Values drawn since seeding.
    pub draws: u64,
}

// TOML integers are signed, seeds use the whole u64 range.
mod seed_text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(seed: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(seed)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(D::Error::custom)
    }
}

/// Replays a fixed sequence of values, cycling when exhausted.
///
/// An empty script always yields `0.0`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
}

impl ScriptedRandom {
    /// Creates a script; values are clamped into `[0, 1)`.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut script = Self::default();
        script.extend(values);
        script
    }

    /// Appends values to the end of the script.
    pub fn extend(&mut self, values: impl IntoIterator<Item = f64>) {
        self.values.extend(
            values
                .into_iter()
                .map(|v| if v.is_finite() { v.clamp(0.0, 1.0 - f64::EPSILON) } else { 0.0 }),
        );
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        match self.values.pop_front() {
            Some(value) => {
                self.values.push_back(value);
                value
            }
            None => 0.0,
        }
    }
}
