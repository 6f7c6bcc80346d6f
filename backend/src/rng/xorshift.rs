//! xorshift64* random number generator
//!
//! Fast, deterministic PRNG. xorshift64* passes TestU01's BigCrush and keeps
//! a single 64-bit word of state, so the whole generator can be logged or
//! copied into a run summary.
//!
//! # Determinism
//!
//! Same seed → same sequence. The orchestrator relies on this to reproduce
//! the per-turn command application order across runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use normsim_core::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.next();
/// let index = rng.range(0, 10); // [0, 10)
/// assert!((0..10).contains(&index));
/// # let _ = value;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    pub fn new(seed: u64) -> Self {
        // xorshift must never hold a zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Create an RNG seeded from the operating system's entropy source.
    ///
    /// Used when no seed is configured; runs seeded this way are not
    /// reproducible.
    pub fn from_entropy() -> Self {
        let (high, low) = Uuid::new_v4().as_u64_pair();
        Self::new(high ^ low.rotate_left(32))
    }

    /// Build from an optional seed, falling back to entropy.
    pub fn from_seed_or_entropy(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(seed),
            None => Self::from_entropy(),
        }
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random value in range [min, max)
    ///
    /// # Panics
    /// Panics if min >= max
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let value = self.next();
        let range_size = (max - min) as u64;
        min + (value % range_size) as i64
    }

    /// Pick a uniformly distributed index in `[0, len)`.
    ///
    /// # Panics
    /// Panics if `len == 0`
    pub fn index(&mut self, len: usize) -> usize {
        self.range(0, len as i64) as usize
    }

    /// Get current RNG state
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Generate random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Fisher–Yates shuffle of `items` in place.
    ///
    /// Consumes exactly `items.len() - 1` draws for slices longer than one
    /// element and none otherwise.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }
}
