//! Weighted discrete sampling
//!
//! Draws entries from a distribution defined by relative weights. Weights
//! need not sum to one; an entry with weight 0 is never drawn.

use crate::rng::RngManager;

#[derive(Debug, Clone)]
pub struct WeightedSampler<T> {
    entries: Vec<(T, f64)>,
    total_weight: f64,
}

impl<T: Clone> WeightedSampler<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            total_weight: 0.0,
        }
    }

    /// Add an entry; non-positive or non-finite weights are ignored
    pub fn add_entry(&mut self, item: T, weight: f64) {
        if weight.is_finite() && weight > 0.0 {
            self.total_weight += weight;
            self.entries.push((item, weight));
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw one entry; `None` if nothing has positive weight
    pub fn sample(&self, rng: &mut RngManager) -> Option<T> {
        let (last, _) = self.entries.last()?;

        let mut target = rng.next_f64() * self.total_weight;
        for (item, weight) in &self.entries {
            target -= weight;
            if target < 0.0 {
                return Some(item.clone());
            }
        }

        // Rounding can leave a sliver of weight past the last entry
        Some(last.clone())
    }
}

impl<T: Clone> Default for WeightedSampler<T> {
    fn default() -> Self {
        Self::new()
    }
}
