//! Simulation configuration
//!
//! One immutable [`SimulationConfig`] is built at startup (from JSON and/or
//! CLI flags), validated once, and then passed by reference to every
//! component that needs it. Every field has a default so partial JSON files
//! are accepted.

use crate::models::category::EconomicCategory;
use crate::norms::TargetSearch;
use crate::policy::DecisionKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Events retained by the orchestrator's log unless configured otherwise
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 100_000;

/// Tolerance used when checking that category weights hit their expected total
const WEIGHT_TOTAL_TOLERANCE: f64 = 1e-9;

/// Configuration errors, raised before the run starts
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("category weights must sum to {expected}, got {total}")]
    WeightTotal { total: f64, expected: f64 },

    #[error("weight for category {category} must be finite and non-negative, got {weight}")]
    InvalidWeight {
        category: EconomicCategory,
        weight: f64,
    },

    #[error("budget for category {category} must be finite and non-negative, got {budget}")]
    InvalidBudget {
        category: EconomicCategory,
        budget: f64,
    },

    #[error("invalid search bounds: {0}")]
    SearchBounds(String),

    #[error("invalid sanction parameters: {0}")]
    Sanction(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of car agents created at population initialization
    pub num_agents: usize,

    /// Turn budget (None = run until the environment ends or a stop is requested)
    pub max_turns: Option<u64>,

    /// Seed for the orchestrator's command ordering (None = entropy)
    pub system_seed: Option<u64>,

    /// Seed for agent-side randomness: category sampling, routes, lanes (None = entropy)
    pub agent_seed: Option<u64>,

    pub categories: CategoryConfig,

    pub norms: NormConfig,

    pub search: SearchConfig,

    pub emission: EmissionConfig,

    /// Goals every agent adopts when it enters the world
    pub standing_goals: Vec<DecisionKind>,

    pub routing: RoutingConfig,

    /// Most recent events kept in the event log (None = unbounded, 0 = off)
    pub event_log_capacity: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_agents: 10,
            max_turns: None,
            system_seed: None,
            agent_seed: None,
            categories: CategoryConfig::default(),
            norms: NormConfig::default(),
            search: SearchConfig::default(),
            emission: EmissionConfig::default(),
            standing_goals: vec![DecisionKind::MaxSpeed, DecisionKind::MinGap],
            routing: RoutingConfig::default(),
            event_log_capacity: Some(DEFAULT_EVENT_LOG_CAPACITY),
        }
    }
}

/// Economic category distribution and budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Relative weights (percentages) of each category in the population
    pub weights: CategoryWeights,

    /// Budget bound to each category
    pub budgets: CategoryBudgets,

    /// Total the weights must add up to
    pub expected_total: f64,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            budgets: CategoryBudgets::default(),
            expected_total: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub rich: f64,
    pub medium: f64,
    pub poor: f64,
}

impl CategoryWeights {
    pub fn get(&self, category: EconomicCategory) -> f64 {
        match category {
            EconomicCategory::Rich => self.rich,
            EconomicCategory::Medium => self.medium,
            EconomicCategory::Poor => self.poor,
        }
    }

    pub fn total(&self) -> f64 {
        self.rich + self.medium + self.poor
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            rich: 20.0,
            medium: 30.0,
            poor: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryBudgets {
    pub rich: f64,
    pub medium: f64,
    pub poor: f64,
}

impl CategoryBudgets {
    pub fn get(&self, category: EconomicCategory) -> f64 {
        match category {
            EconomicCategory::Rich => self.rich,
            EconomicCategory::Medium => self.medium,
            EconomicCategory::Poor => self.poor,
        }
    }

    /// Largest budget of any category
    pub fn highest(&self) -> f64 {
        self.rich.max(self.medium).max(self.poor)
    }
}

impl Default for CategoryBudgets {
    fn default() -> Self {
        Self {
            rich: 500.0,
            medium: 150.0,
            poor: 10.0,
        }
    }
}

/// Norm enforcement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormConfig {
    /// Divides the lane speed ceiling into the enforced speed norm (<= 0: no adjustment)
    pub speed_limit_factor: f64,

    /// Divides the speed-derived gap baseline into the enforced gap norm (<= 0: no adjustment)
    pub gap_factor: f64,

    pub sanction: SanctionConfig,

    /// Charge each in-world agent the sanction for its observed speed every turn
    pub charge_sanctions: bool,
}

impl Default for NormConfig {
    fn default() -> Self {
        Self {
            speed_limit_factor: 2.0,
            gap_factor: 0.0,
            sanction: SanctionConfig::default(),
            charge_sanctions: false,
        }
    }
}

/// Sanction strategy selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SanctionConfig {
    /// `base ^ (excess / scale)` for any violation
    Continuous {
        #[serde(default = "default_sanction_base")]
        base: f64,
        #[serde(default = "default_sanction_scale")]
        scale: f64,
    },

    /// One constant penalty for any violation (None = highest budget - 1)
    Fixed {
        #[serde(default)]
        penalty: Option<f64>,
    },
}

fn default_sanction_base() -> f64 {
    2.0
}

fn default_sanction_scale() -> f64 {
    2.0
}

impl Default for SanctionConfig {
    fn default() -> Self {
        SanctionConfig::Continuous {
            base: default_sanction_base(),
            scale: default_sanction_scale(),
        }
    }
}

/// Bounds for the budgeted target searches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Lowest legal speed, where the max-speed search starts (m/s)
    pub speed_start: f64,
    pub speed_step: f64,
    /// Physical ceiling of the vehicle (m/s)
    pub car_max_speed: f64,
    /// Deliberately large gap the min-gap search starts from (m)
    pub gap_start: f64,
    pub gap_step: f64,
    /// Physical floor for the gap (m)
    pub min_gap: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            speed_start: 0.1,
            speed_step: 0.1,
            car_max_speed: 50.0,
            gap_start: 200.0,
            gap_step: 0.1,
            min_gap: 2.5,
        }
    }
}

/// Emission backlog and adaptive control parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionConfig {
    pub backlog_capacity: usize,
    /// Proportional step applied each turn (0.1 = 10%)
    pub adjust_ratio: f64,
    /// Smallest value the adjusted target may take
    pub floor: f64,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: 10,
            adjust_ratio: 0.1,
            floor: 0.1,
        }
    }
}

/// Route planning and world entry parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Vehicle class passed to route finding and used as vehicle type
    pub vehicle_class: String,
    /// Random edge pairs tried per turn before giving up on a route
    pub max_route_attempts: usize,
    /// Turns to wait for a requested entry before planning a new one
    pub entry_retry_turns: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            vehicle_class: "car".to_string(),
            max_route_attempts: 20,
            entry_retry_turns: 10,
        }
    }
}

impl SimulationConfig {
    /// Validate configuration; any error here rejects the run before it starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_agents == 0 {
            return Err(ConfigError::Invalid("num_agents must be > 0".to_string()));
        }

        if self.max_turns == Some(0) {
            return Err(ConfigError::Invalid("max_turns must be > 0 when set".to_string()));
        }

        self.categories.validate()?;
        self.validate_norms()?;
        self.search.validate()?;
        self.emission.validate()?;

        if self.routing.max_route_attempts == 0 {
            return Err(ConfigError::Invalid(
                "routing.max_route_attempts must be > 0".to_string(),
            ));
        }

        if self.routing.vehicle_class.is_empty() {
            return Err(ConfigError::Invalid(
                "routing.vehicle_class must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_norms(&self) -> Result<(), ConfigError> {
        if !self.norms.speed_limit_factor.is_finite() || !self.norms.gap_factor.is_finite() {
            return Err(ConfigError::Invalid(
                "enforcement factors must be finite".to_string(),
            ));
        }

        match &self.norms.sanction {
            SanctionConfig::Continuous { base, scale } => {
                if !base.is_finite() || *base <= 1.0 {
                    return Err(ConfigError::Sanction(format!(
                        "continuous base must be > 1, got {}",
                        base
                    )));
                }
                if !scale.is_finite() || *scale <= 0.0 {
                    return Err(ConfigError::Sanction(format!(
                        "continuous scale must be > 0, got {}",
                        scale
                    )));
                }
            }
            SanctionConfig::Fixed { penalty: Some(p) } => {
                if !p.is_finite() || *p < 0.0 {
                    return Err(ConfigError::Sanction(format!(
                        "fixed penalty must be finite and non-negative, got {}",
                        p
                    )));
                }
            }
            SanctionConfig::Fixed { penalty: None } => {}
        }

        Ok(())
    }
}

impl CategoryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for category in EconomicCategory::ALL {
            let weight = self.weights.get(category);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight { category, weight });
            }

            let budget = self.budgets.get(category);
            if !budget.is_finite() || budget < 0.0 {
                return Err(ConfigError::InvalidBudget { category, budget });
            }
        }

        let total = self.weights.total();
        if (total - self.expected_total).abs() > WEIGHT_TOTAL_TOLERANCE {
            return Err(ConfigError::WeightTotal {
                total,
                expected: self.expected_total,
            });
        }

        Ok(())
    }
}

impl SearchConfig {
    /// Ascending max-speed search from `speed_start` up to `car_max_speed`
    pub fn speed_search(&self) -> TargetSearch {
        TargetSearch::ascending(self.speed_start, self.speed_step, self.car_max_speed)
    }

    /// Descending min-gap search from `gap_start` down to `min_gap`
    pub fn gap_search(&self) -> TargetSearch {
        TargetSearch::descending(self.gap_start, self.gap_step, self.min_gap)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("speed_start", self.speed_start),
            ("speed_step", self.speed_step),
            ("car_max_speed", self.car_max_speed),
            ("gap_start", self.gap_start),
            ("gap_step", self.gap_step),
            ("min_gap", self.min_gap),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(ConfigError::SearchBounds(format!("{} must be finite", name)));
            }
        }

        if self.speed_step <= 0.0 || self.gap_step <= 0.0 {
            return Err(ConfigError::SearchBounds("steps must be > 0".to_string()));
        }

        if self.speed_start <= 0.0 || self.speed_start > self.car_max_speed {
            return Err(ConfigError::SearchBounds(format!(
                "speed_start must be in (0, car_max_speed], got {} with ceiling {}",
                self.speed_start, self.car_max_speed
            )));
        }

        if self.min_gap < 0.0 || self.gap_start < self.min_gap {
            return Err(ConfigError::SearchBounds(format!(
                "gap_start must be >= min_gap >= 0, got {} and {}",
                self.gap_start, self.min_gap
            )));
        }

        // Anything the searches themselves would refuse on every turn
        self.speed_search()
            .validate()
            .map_err(|err| ConfigError::SearchBounds(format!("speed search: {}", err)))?;
        self.gap_search()
            .validate()
            .map_err(|err| ConfigError::SearchBounds(format!("gap search: {}", err)))?;

        Ok(())
    }
}

impl EmissionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog_capacity == 0 {
            return Err(ConfigError::Invalid(
                "emission.backlog_capacity must be > 0".to_string(),
            ));
        }

        if !(self.adjust_ratio > 0.0 && self.adjust_ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "emission.adjust_ratio must be in (0, 1), got {}",
                self.adjust_ratio
            )));
        }

        if !self.floor.is_finite() || self.floor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "emission.floor must be > 0, got {}",
                self.floor
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SimulationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_weights_must_sum_to_expected_total() {
        let mut config = SimulationConfig::default();
        config.categories.weights = CategoryWeights {
            rich: 20.0,
            medium: 30.0,
            poor: 40.0,
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::WeightTotal {
                total: 90.0,
                expected: 100.0
            })
        );
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = SimulationConfig::default();
        config.categories.weights = CategoryWeights {
            rich: -10.0,
            medium: 60.0,
            poor: 50.0,
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWeight {
                category: EconomicCategory::Rich,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut config = SimulationConfig::default();
        config.search.speed_step = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::SearchBounds(_))));
    }

    #[test]
    fn test_step_too_fine_for_search_rejected() {
        let mut config = SimulationConfig::default();
        config.search.speed_step = 1e-5;
        config.search.gap_step = 1e-5;
        assert!(config.search.speed_search().validate().is_err());
        assert!(matches!(config.validate(), Err(ConfigError::SearchBounds(msg)) if msg.starts_with("speed search")));

        config.search.speed_step = 0.1;
        assert!(matches!(config.validate(), Err(ConfigError::SearchBounds(msg)) if msg.starts_with("gap search")));
    }

    #[test]
    fn test_gap_start_below_floor_rejected() {
        let mut config = SimulationConfig::default();
        config.search.gap_start = 1.0;
        config.search.min_gap = 2.5;
        assert!(matches!(config.validate(), Err(ConfigError::SearchBounds(_))));
    }

    #[test]
    fn test_sanction_base_must_exceed_one() {
        let mut config = SimulationConfig::default();
        config.norms.sanction = SanctionConfig::Continuous {
            base: 1.0,
            scale: 2.0,
        };
        assert!(matches!(config.validate(), Err(ConfigError::Sanction(_))));
    }

    #[test]
    fn test_zero_max_turns_rejected() {
        let config = SimulationConfig {
            max_turns: Some(0),
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "num_agents": 3,
            "norms": { "sanction": { "mode": "fixed" } }
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.num_agents, 3);
        assert_eq!(config.norms.speed_limit_factor, 2.0);
        assert_eq!(config.norms.sanction, SanctionConfig::Fixed { penalty: None });
        assert_eq!(config.search, SearchConfig::default());
    }
}
