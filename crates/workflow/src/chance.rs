//! Injected randomness for the payment outcome.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Pseudo-random source; seeded for reproducible runs.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Seeds from `seed`, or from OS entropy when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0.0..1.0)
    }
}

/// Replays a fixed script of draws, repeating the last one once exhausted.
pub struct ScriptedRandom {
    draws: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: Mutex::new(draws.into_iter().collect()),
            last: Mutex::new(0.0),
        }
    }

    /// Always draws `value`.
    pub fn always(value: f64) -> Self {
        Self::new([value])
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&self) -> f64 {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = self
            .draws
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            *last = next;
        }
        *last
    }
}
