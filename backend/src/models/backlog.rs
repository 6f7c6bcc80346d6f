//! Emission backlog
//!
//! Bounded FIFO history of one scalar observation per agent with an O(1)
//! rolling average. Adaptive speed/acceleration control compares this
//! average against the population-wide average.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent observations
///
/// # Example
/// ```
/// use normsim_core::EmissionBacklog;
///
/// let mut backlog = EmissionBacklog::new(2);
/// backlog.push(1.0);
/// backlog.push(2.0);
/// backlog.push(4.0); // evicts 1.0
/// assert_eq!(backlog.average(), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionBacklog {
    values: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl EmissionBacklog {
    /// # Panics
    /// Panics if `capacity == 0`
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "backlog capacity must be positive");
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
            sum: 0.0,
        }
    }

    /// Append a value, evicting the oldest one when over capacity
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.capacity {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= evicted;
            }
        }
    }

    /// Arithmetic mean of the current contents, 0 when empty
    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contents, oldest first
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

/// Nudge `current` toward the population by a proportional step.
///
/// Above the population average the value goes down by `ratio`, otherwise
/// it goes up by `ratio`; the result never drops below `floor`.
pub fn adjust_toward_population(
    current: f64,
    own_average: f64,
    population_average: f64,
    ratio: f64,
    floor: f64,
) -> f64 {
    let direction = if own_average > population_average {
        -1.0
    } else {
        1.0
    };
    let adjusted = current + direction * current * ratio;
    adjusted.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_average_is_zero() {
        let backlog = EmissionBacklog::new(10);
        assert_eq!(backlog.average(), 0.0);
        assert!(backlog.is_empty());
    }

    #[test]
    fn test_capacity_ten_keeps_last_ten() {
        let mut backlog = EmissionBacklog::new(10);
        for i in 1..=15 {
            backlog.push(i as f64);
        }

        assert_eq!(backlog.len(), 10);
        assert_eq!(
            backlog.values().collect::<Vec<_>>(),
            (6..=15).map(|i| i as f64).collect::<Vec<_>>()
        );
        // mean of 6..=15
        assert!((backlog.average() - 10.5).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "backlog capacity must be positive")]
    fn test_zero_capacity_panics() {
        EmissionBacklog::new(0);
    }

    #[test]
    fn test_adjust_down_when_above_population() {
        let adjusted = adjust_toward_population(20.0, 150.0, 100.0, 0.1, 0.1);
        assert!((adjusted - 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_adjust_up_when_below_or_equal() {
        let below = adjust_toward_population(20.0, 50.0, 100.0, 0.1, 0.1);
        let equal = adjust_toward_population(20.0, 100.0, 100.0, 0.1, 0.1);
        assert!((below - 22.0).abs() < 1e-12);
        assert!((equal - 22.0).abs() < 1e-12);
    }

    #[test]
    fn test_adjust_clamped_to_floor() {
        let adjusted = adjust_toward_population(0.05, 200.0, 100.0, 0.1, 0.1);
        assert_eq!(adjusted, 0.1);
    }
}
