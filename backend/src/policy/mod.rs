//! Per-behavior decision logic
//!
//! Each standing goal an agent holds is one [`DecisionKind`]. Every turn the
//! agent's deliberation gathers an [`Observation`] from the environment and
//! asks the [`DecisionPolicy`] for the command that goal wants issued.
//!
//! # Decision kinds
//!
//! 1. **MaxSpeed**: ascending budgeted search over max speed, priced against
//!    the lane speed norm
//! 2. **MinGap**: descending budgeted search over the minimum gap, priced
//!    against the speed-dependent gap norm, never below `min_gap`
//! 3. **EmissionSpeed**: nudge max speed down when the agent emits more than
//!    the population average and up otherwise, capped by what the budget
//!    allows under the speed norm
//! 4. **EmissionAcceleration**: same nudge applied to acceleration
//!
//! # Example
//!
//! ```rust
//! use normsim_core::policy::{DecisionKind, DecisionPolicy, Observation};
//! use normsim_core::{Command, SimulationConfig};
//!
//! let policy = DecisionPolicy::from_config(&SimulationConfig::default());
//! let observation = Observation {
//!     lane_ceiling: Some(60.0),
//!     ..Observation::default()
//! };
//!
//! // Budget 10 on a 60 m/s lane: a little over the enforced 30 m/s is affordable
//! let command = policy
//!     .decide(DecisionKind::MaxSpeed, "car-0", 10.0, None, &observation)
//!     .unwrap();
//! match command {
//!     Some(Command::SetMaxSpeed { value, .. }) => assert!(value > 30.0 && value < 37.0),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use crate::core::config::{EmissionConfig, SearchConfig, SimulationConfig};
use crate::models::backlog::{adjust_toward_population, EmissionBacklog};
use crate::models::command::Command;
use crate::norms::{Institution, SearchError};
use serde::{Deserialize, Serialize};

/// Standing goal an agent can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    MaxSpeed,
    MinGap,
    EmissionSpeed,
    EmissionAcceleration,
}

impl DecisionKind {
    pub const ALL: [DecisionKind; 4] = [
        DecisionKind::MaxSpeed,
        DecisionKind::MinGap,
        DecisionKind::EmissionSpeed,
        DecisionKind::EmissionAcceleration,
    ];

    /// True if this goal feeds on the emission backlog
    pub fn uses_emissions(self) -> bool {
        matches!(
            self,
            DecisionKind::EmissionSpeed | DecisionKind::EmissionAcceleration
        )
    }
}

/// What the environment told us about one agent this turn.
///
/// Every field is optional: a soft query failure leaves it empty and the
/// goals that need it skip the turn.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    /// Speed ceiling of the agent's current lane (m/s)
    pub lane_ceiling: Option<f64>,
    /// Current speed (m/s)
    pub speed: Option<f64>,
    /// Currently configured max speed (m/s)
    pub max_speed: Option<f64>,
    /// Currently configured acceleration (m/s²)
    pub acceleration: Option<f64>,
    /// Population average CO2 emission
    pub population_co2: Option<f64>,
}

/// Turns goals plus observations into commands
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    institution: Institution,
    search: SearchConfig,
    emission: EmissionConfig,
}

impl DecisionPolicy {
    pub fn new(institution: Institution, search: SearchConfig, emission: EmissionConfig) -> Self {
        Self {
            institution,
            search,
            emission,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            Institution::new(&config.norms, &config.categories.budgets),
            config.search.clone(),
            config.emission.clone(),
        )
    }

    pub fn institution(&self) -> &Institution {
        &self.institution
    }

    /// Command for one goal, `None` when an input it needs is missing.
    ///
    /// `backlog` is only read by the emission goals.
    pub fn decide(
        &self,
        kind: DecisionKind,
        entity: &str,
        budget: f64,
        backlog: Option<&EmissionBacklog>,
        observation: &Observation,
    ) -> Result<Option<Command>, SearchError> {
        let entity = entity.to_string();

        let command = match kind {
            DecisionKind::MaxSpeed => {
                let Some(ceiling) = observation.lane_ceiling else {
                    return Ok(None);
                };
                Command::SetMaxSpeed {
                    entity,
                    value: self.max_affordable_speed(budget, ceiling)?,
                }
            }

            DecisionKind::MinGap => {
                let Some(speed) = observation.speed else {
                    return Ok(None);
                };
                Command::SetMinGap {
                    entity,
                    value: self.min_affordable_gap(budget, speed)?,
                }
            }

            DecisionKind::EmissionSpeed => {
                let (Some(ceiling), Some(current), Some(population), Some(backlog)) = (
                    observation.lane_ceiling,
                    observation.max_speed,
                    observation.population_co2,
                    backlog,
                ) else {
                    return Ok(None);
                };
                let nudged = self.nudge(current, backlog.average(), population);
                let cap = self.max_affordable_speed(budget, ceiling)?;
                Command::SetMaxSpeed {
                    entity,
                    value: nudged.min(cap),
                }
            }

            DecisionKind::EmissionAcceleration => {
                let (Some(current), Some(population), Some(backlog)) =
                    (observation.acceleration, observation.population_co2, backlog)
                else {
                    return Ok(None);
                };
                Command::SetAcceleration {
                    entity,
                    value: self.nudge(current, backlog.average(), population),
                }
            }
        };

        Ok(Some(command))
    }

    /// Highest max speed whose sanction on this lane stays under `budget`
    pub fn max_affordable_speed(&self, budget: f64, lane_ceiling: f64) -> Result<f64, SearchError> {
        self.search
            .speed_search()
            .run(budget, |speed| self.institution.speed_sanction(speed, lane_ceiling))
    }

    /// Lowest gap whose sanction at `current_speed` stays under `budget`
    pub fn min_affordable_gap(&self, budget: f64, current_speed: f64) -> Result<f64, SearchError> {
        self.search
            .gap_search()
            .run(budget, |gap| self.institution.gap_sanction(gap, current_speed))
    }

    fn nudge(&self, current: f64, own_average: f64, population_average: f64) -> f64 {
        adjust_toward_population(
            current,
            own_average,
            population_average,
            self.emission.adjust_ratio,
            self.emission.floor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::from_config(&SimulationConfig::default())
    }

    fn value(command: Option<Command>) -> f64 {
        match command {
            Some(Command::SetMaxSpeed { value, .. })
            | Some(Command::SetMinGap { value, .. })
            | Some(Command::SetAcceleration { value, .. }) => value,
            other => panic!("expected a setter, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_inputs_skip() {
        let policy = policy();
        let empty = Observation::default();
        for kind in DecisionKind::ALL {
            assert_eq!(policy.decide(kind, "car-0", 100.0, None, &empty).unwrap(), None);
        }
    }

    #[test]
    fn test_rich_agent_drives_faster_than_poor() {
        let policy = policy();
        let rich = policy.max_affordable_speed(500.0, 60.0).unwrap();
        let poor = policy.max_affordable_speed(10.0, 60.0).unwrap();
        assert!(rich > poor);
        assert!(poor > 30.0);
    }

    #[test]
    fn test_min_gap_decision_respects_floor() {
        let policy = policy();
        let observation = Observation {
            speed: Some(0.0),
            ..Observation::default()
        };
        let gap = value(
            policy
                .decide(DecisionKind::MinGap, "car-0", 10.0, None, &observation)
                .unwrap(),
        );
        // At standstill the gap norm is 0, so the floor is reachable
        assert_eq!(gap, SearchConfig::default().min_gap);
    }

    #[test]
    fn test_emission_speed_goes_down_when_above_population() {
        let policy = policy();
        let mut backlog = EmissionBacklog::new(10);
        backlog.push(5000.0);
        let observation = Observation {
            lane_ceiling: Some(60.0),
            max_speed: Some(20.0),
            population_co2: Some(3000.0),
            ..Observation::default()
        };

        let speed = value(
            policy
                .decide(DecisionKind::EmissionSpeed, "car-0", 10.0, Some(&backlog), &observation)
                .unwrap(),
        );
        assert!((speed - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_emission_speed_capped_by_budget() {
        let policy = policy();
        let backlog = EmissionBacklog::new(10);
        let observation = Observation {
            lane_ceiling: Some(20.0),
            max_speed: Some(45.0),
            population_co2: Some(3000.0),
            ..Observation::default()
        };

        let speed = value(
            policy
                .decide(DecisionKind::EmissionSpeed, "car-0", 0.0, Some(&backlog), &observation)
                .unwrap(),
        );
        assert!(speed <= 10.0 + 1e-9);
    }

    #[test]
    fn test_emission_acceleration_goes_up_when_equal() {
        let policy = policy();
        let mut backlog = EmissionBacklog::new(10);
        backlog.push(3000.0);
        let observation = Observation {
            acceleration: Some(2.0),
            population_co2: Some(3000.0),
            ..Observation::default()
        };

        let acceleration = value(
            policy
                .decide(
                    DecisionKind::EmissionAcceleration,
                    "car-0",
                    0.0,
                    Some(&backlog),
                    &observation,
                )
                .unwrap(),
        );
        assert!((acceleration - 2.2).abs() < 1e-9);
    }
}
