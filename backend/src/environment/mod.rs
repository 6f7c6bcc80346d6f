//! External environment boundary
//!
//! The environment is the turn-based traffic simulator the agents live in.
//! Requests are synchronous request/response, one in flight at a time. Every
//! failure carries a classification:
//!
//! - **soft**: this one request could not be served (bad argument, entity no
//!   longer present, malformed but recoverable reply); the caller logs and
//!   moves on
//! - **fatal**: the connection itself is unusable; the run must stop
//!
//! Nothing here retries. A broken connection is assumed unrecoverable within
//! a run.

pub mod memory;

pub use memory::{InMemoryEnvironment, NetworkEdge};

use crate::models::command::Command;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Environment request errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvError {
    /// Request understood but refused (bad argument, invalid state)
    #[error("environment rejected request: {0}")]
    Rejected(String),

    /// Entity is not (or no longer) present
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Reply could not be interpreted
    #[error("malformed environment response: {0}")]
    Malformed(String),

    /// Connection unusable
    #[error("environment connection lost: {0}")]
    ConnectionLost(String),
}

impl EnvError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, EnvError::ConnectionLost(_))
    }
}

pub type EnvResult<T> = Result<T, EnvError>;

/// Scalar vehicle attributes the environment can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Current speed (m/s)
    Speed,
    /// Configured maximum speed (m/s)
    MaxSpeed,
    /// Configured maximum acceleration (m/s²)
    Acceleration,
    /// Configured minimum gap (m)
    MinGap,
    /// CO2 emission in the last step (mg/s)
    Co2Emission,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Attribute::Speed => "speed",
            Attribute::MaxSpeed => "max_speed",
            Attribute::Acceleration => "acceleration",
            Attribute::MinGap => "min_gap",
            Attribute::Co2Emission => "co2_emission",
        };
        f.write_str(name)
    }
}

/// Query and command surface of the simulated world
pub trait Environment {
    /// Ids of all entities currently present
    fn present_entities(&mut self) -> EnvResult<Vec<String>>;

    /// Ids of entities that left during the last step
    fn departed_entities(&mut self) -> EnvResult<Vec<String>>;

    /// Ids of all edges in the road network
    fn network_edges(&mut self) -> EnvResult<Vec<String>>;

    /// Ordered edge list from `from` to `to`, `None` if no route exists
    fn find_route(
        &mut self,
        from: &str,
        to: &str,
        vehicle_class: &str,
    ) -> EnvResult<Option<Vec<String>>>;

    /// Number of lanes on an edge
    fn lane_count(&mut self, edge: &str) -> EnvResult<u8>;

    /// Lane the entity is on, `None` when it is between lanes
    fn lane_of(&mut self, entity: &str) -> EnvResult<Option<String>>;

    /// Speed ceiling of a lane (m/s)
    fn lane_ceiling(&mut self, lane: &str) -> EnvResult<f64>;

    /// Attribute of an entity, `None` when unavailable
    fn scalar_attribute(&mut self, entity: &str, attribute: Attribute) -> EnvResult<Option<f64>>;

    /// Mean of an attribute over all present entities, `None` when nobody is present
    fn population_average(&mut self, attribute: Attribute) -> EnvResult<Option<f64>>;

    /// Apply one mutation
    fn apply_command(&mut self, command: &Command) -> EnvResult<()>;

    /// Advance simulated time by one step
    fn advance_time(&mut self) -> EnvResult<()>;

    /// Authoritative current time
    fn current_time(&mut self) -> EnvResult<u64>;

    /// True once the environment has nothing left to simulate
    fn is_finished(&mut self) -> EnvResult<bool>;

    /// Close the connection. Must be safe to call more than once.
    fn close(&mut self);
}

/// Turn a soft failure into `None` (logged), propagate fatal ones.
pub fn soften<T>(result: EnvResult<T>, context: &str) -> EnvResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            tracing::warn!(context, error = %err, "environment request failed, skipping");
            Ok(None)
        }
    }
}
