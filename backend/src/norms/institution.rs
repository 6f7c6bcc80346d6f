//! Norm & sanction engine
//!
//! Two norm families share one shape: an environment baseline is turned into
//! an enforced norm value by a configured factor, and any violation of that
//! value is priced by the selected sanction strategy.
//!
//! - **Speed**: baseline is the lane's speed ceiling; compliant while
//!   `observed <= enforced`.
//! - **Minimum gap**: baseline is `((speed_kmh) / 10)^2`, derived from the
//!   vehicle's current speed; compliant while `observed >= enforced`.
//!
//! Everything here is pure so it can be evaluated repeatedly inside a search
//! loop.

use crate::core::config::{CategoryBudgets, NormConfig, SanctionConfig};
use serde::{Deserialize, Serialize};

/// Environment speeds are reported in m/s
pub const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormFamily {
    Speed,
    MinGap,
}

impl NormFamily {
    pub fn is_compliant(self, observed: f64, enforced: f64) -> bool {
        match self {
            NormFamily::Speed => observed <= enforced,
            NormFamily::MinGap => observed >= enforced,
        }
    }

    /// Magnitude of the violation, 0 when compliant
    pub fn excess(self, observed: f64, enforced: f64) -> f64 {
        if self.is_compliant(observed, enforced) {
            return 0.0;
        }
        match self {
            NormFamily::Speed => observed - enforced,
            NormFamily::MinGap => enforced - observed,
        }
    }
}

/// Apply an enforcement factor to a baseline.
///
/// A factor `<= 0` means "no adjustment".
///
/// ```
/// use normsim_core::norms::enforced_norm;
///
/// assert_eq!(enforced_norm(60.0, 2.0), 30.0);
/// assert_eq!(enforced_norm(60.0, 0.0), 60.0);
/// assert_eq!(enforced_norm(60.0, -1.0), 60.0);
/// ```
pub fn enforced_norm(baseline: f64, enforcement_factor: f64) -> f64 {
    if enforcement_factor > 0.0 {
        baseline / enforcement_factor
    } else {
        baseline
    }
}

/// Speed-dependent minimum gap baseline: `((speed in km/h) / 10)^2`
pub fn min_gap_baseline(speed_mps: f64) -> f64 {
    ((speed_mps * MPS_TO_KMH) / 10.0).powi(2)
}

/// Sanction strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sanction {
    /// `base ^ (excess / scale)`: cheap for small violations, prohibitive for large ones
    Continuous { base: f64, scale: f64 },
    /// All-or-nothing: one constant for any violation
    Fixed { penalty: f64 },
}

impl Sanction {
    /// Resolve the configured strategy. A fixed penalty left unset sits just
    /// below the highest category budget, so only that category can afford
    /// to violate.
    pub fn from_config(config: &SanctionConfig, budgets: &CategoryBudgets) -> Self {
        match config {
            SanctionConfig::Continuous { base, scale } => Sanction::Continuous {
                base: *base,
                scale: *scale,
            },
            SanctionConfig::Fixed { penalty } => Sanction::Fixed {
                penalty: penalty.unwrap_or_else(|| (budgets.highest() - 1.0).max(0.0)),
            },
        }
    }

    /// Penalty for `observed` against `enforced` under `family`
    pub fn evaluate(&self, family: NormFamily, observed: f64, enforced: f64) -> f64 {
        if family.is_compliant(observed, enforced) {
            return 0.0;
        }
        match *self {
            Sanction::Continuous { base, scale } => {
                base.powf(family.excess(observed, enforced) / scale)
            }
            Sanction::Fixed { penalty } => penalty,
        }
    }
}

/// The enforcing institution: factors plus the sanction strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Institution {
    speed_limit_factor: f64,
    gap_factor: f64,
    sanction: Sanction,
}

impl Institution {
    pub fn new(norms: &NormConfig, budgets: &CategoryBudgets) -> Self {
        Self {
            speed_limit_factor: norms.speed_limit_factor,
            gap_factor: norms.gap_factor,
            sanction: Sanction::from_config(&norms.sanction, budgets),
        }
    }

    pub fn sanction(&self) -> Sanction {
        self.sanction
    }

    /// Enforced speed for a lane
    pub fn speed_norm(&self, lane_ceiling: f64) -> f64 {
        enforced_norm(lane_ceiling, self.speed_limit_factor)
    }

    /// Enforced minimum gap at the given speed
    pub fn gap_norm(&self, current_speed: f64) -> f64 {
        enforced_norm(min_gap_baseline(current_speed), self.gap_factor)
    }

    pub fn speed_sanction(&self, speed: f64, lane_ceiling: f64) -> f64 {
        self.sanction
            .evaluate(NormFamily::Speed, speed, self.speed_norm(lane_ceiling))
    }

    pub fn gap_sanction(&self, gap: f64, current_speed: f64) -> f64 {
        self.sanction
            .evaluate(NormFamily::MinGap, gap, self.gap_norm(current_speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuous() -> Institution {
        Institution::new(&NormConfig::default(), &CategoryBudgets::default())
    }

    #[test]
    fn test_speed_norm_uses_factor() {
        let institution = continuous();
        assert_eq!(institution.speed_norm(60.0), 30.0);
    }

    #[test]
    fn test_gap_norm_unadjusted_by_default() {
        let institution = continuous();
        // 10 m/s = 36 km/h -> (3.6)^2
        assert!((institution.gap_norm(10.0) - 12.96).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_penalty_defaults_below_top_budget() {
        let budgets = CategoryBudgets::default();
        let sanction = Sanction::from_config(&SanctionConfig::Fixed { penalty: None }, &budgets);
        assert_eq!(sanction, Sanction::Fixed { penalty: 499.0 });
    }

    #[test]
    fn test_gap_sanction_zero_when_wide_enough() {
        let institution = continuous();
        assert_eq!(institution.gap_sanction(20.0, 10.0), 0.0);
        assert!(institution.gap_sanction(5.0, 10.0) > 0.0);
    }

    #[test]
    fn test_excess_direction() {
        assert_eq!(NormFamily::Speed.excess(35.0, 30.0), 5.0);
        assert_eq!(NormFamily::MinGap.excess(8.0, 10.0), 2.0);
        assert_eq!(NormFamily::MinGap.excess(12.0, 10.0), 0.0);
    }
}
