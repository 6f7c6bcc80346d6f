//! Simulation time
//!
//! The simulation runs in discrete turns. Two counters are kept apart:
//! the number of turns this process has run (checked against the turn
//! budget) and the environment's own clock, which is the authoritative tick.
//! After every advance the environment's reported time replaces the local
//! view; it must never go backwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("environment time went backwards: previous tick {previous}, reported {reported}")]
pub struct TimeRegression {
    pub previous: u64,
    pub reported: u64,
}

/// Turn counter reconciled against the environment's clock
///
/// # Example
/// ```
/// use normsim_core::TickClock;
///
/// let mut clock = TickClock::new(0);
/// clock.record_advance(1000).unwrap(); // environment reports milliseconds
/// assert_eq!(clock.current_tick(), 1000);
/// assert_eq!(clock.turns_run(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickClock {
    /// Authoritative tick, as last reported by the environment
    current_tick: u64,
    /// Turns completed by this orchestrator
    turns_run: u64,
}

impl TickClock {
    /// Start the clock at the environment's initial time
    pub fn new(initial_tick: u64) -> Self {
        Self {
            current_tick: initial_tick,
            turns_run: 0,
        }
    }

    /// Record a completed turn and the environment's reported time.
    ///
    /// The reported value is stored as-is when it does not regress; the turn
    /// counter always advances by exactly one.
    pub fn record_advance(&mut self, reported: u64) -> Result<(), TimeRegression> {
        if reported < self.current_tick {
            return Err(TimeRegression {
                previous: self.current_tick,
                reported,
            });
        }
        self.current_tick = reported;
        self.turns_run += 1;
        Ok(())
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn turns_run(&self) -> u64 {
        self.turns_run
    }

    /// True once `turns_run` reaches the budget; `None` never exhausts
    pub fn budget_exhausted(&self, max_turns: Option<u64>) -> bool {
        matches!(max_turns, Some(max) if self.turns_run >= max)
    }
}
