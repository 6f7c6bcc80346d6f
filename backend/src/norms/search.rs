//! Budgeted target search
//!
//! Greedy monotonic search for the most extreme value an agent can afford:
//! start at a safe extreme, step toward the preferred direction in fixed
//! increments, and stop at the last candidate whose predicted sanction stays
//! below the budget without crossing the hard limit.
//!
//! The search is not globally optimal; it assumes the sanction is monotonic
//! in the direction of travel, which holds for both norm families.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on candidates evaluated by one search
pub const MAX_SEARCH_STEPS: f64 = 1_000_000.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("search bounds must be finite (start {start}, limit {limit})")]
    NonFinite { start: f64, limit: f64 },

    #[error("search step must be finite and positive, got {0}")]
    InvalidStep(f64),

    #[error("search limit {limit} is on the wrong side of start {start}")]
    LimitBehindStart { start: f64, limit: f64 },

    #[error("search from {start} to {limit} in steps of {step} exceeds the step cap")]
    TooManySteps { start: f64, limit: f64, step: f64 },
}

/// Direction of travel from the safe start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchDirection {
    /// Maximize toward a ceiling (speed-type searches)
    Ascending,
    /// Minimize toward a floor (gap-type searches)
    Descending,
}

/// Bounds of one budgeted search
///
/// # Example
/// ```
/// use normsim_core::norms::TargetSearch;
///
/// // Anything above 10 costs more than the budget allows
/// let search = TargetSearch::ascending(0.0, 1.0, 100.0);
/// let target = search.run(5.0, |v| if v > 10.0 { 50.0 } else { 0.0 }).unwrap();
/// assert_eq!(target, 10.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSearch {
    pub start: f64,
    pub step: f64,
    pub limit: f64,
    pub direction: SearchDirection,
}

impl TargetSearch {
    pub fn ascending(start: f64, step: f64, ceiling: f64) -> Self {
        Self {
            start,
            step,
            limit: ceiling,
            direction: SearchDirection::Ascending,
        }
    }

    pub fn descending(start: f64, step: f64, floor: f64) -> Self {
        Self {
            start,
            step,
            limit: floor,
            direction: SearchDirection::Descending,
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.start.is_finite() || !self.limit.is_finite() {
            return Err(SearchError::NonFinite {
                start: self.start,
                limit: self.limit,
            });
        }

        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(SearchError::InvalidStep(self.step));
        }

        if self.crosses_limit(self.start) {
            return Err(SearchError::LimitBehindStart {
                start: self.start,
                limit: self.limit,
            });
        }

        if (self.limit - self.start).abs() / self.step > MAX_SEARCH_STEPS {
            return Err(SearchError::TooManySteps {
                start: self.start,
                limit: self.limit,
                step: self.step,
            });
        }

        Ok(())
    }

    /// Run the search against `budget`.
    ///
    /// A candidate is affordable while `sanction_at(candidate) < budget`, so a
    /// zero budget keeps the start value. When the next grid point would
    /// cross the limit, the limit itself is tried last.
    pub fn run<F>(&self, budget: f64, sanction_at: F) -> Result<f64, SearchError>
    where
        F: Fn(f64) -> f64,
    {
        self.validate()?;

        let mut current = self.start;
        let mut steps_taken: u64 = 0;

        loop {
            let grid_point = self.grid_point(steps_taken + 1);
            let candidate = if self.crosses_limit(grid_point) {
                self.limit
            } else {
                grid_point
            };

            if candidate == current {
                break;
            }

            // NaN sanctions compare false and stop the search
            if !(sanction_at(candidate) < budget) {
                break;
            }

            current = candidate;
            if current == self.limit {
                break;
            }
            steps_taken += 1;
        }

        Ok(current)
    }

    /// `start ± k·step`, computed directly so rounding does not accumulate
    fn grid_point(&self, k: u64) -> f64 {
        let offset = k as f64 * self.step;
        match self.direction {
            SearchDirection::Ascending => self.start + offset,
            SearchDirection::Descending => self.start - offset,
        }
    }

    fn crosses_limit(&self, value: f64) -> bool {
        match self.direction {
            SearchDirection::Ascending => value > self.limit,
            SearchDirection::Descending => value < self.limit,
        }
    }
}
