//! Commands agents ask the orchestrator to apply to the environment
//!
//! Each command targets one entity and describes one mutation. Commands are
//! serialized as internally tagged JSON (`{"kind": "set_max_speed", ...}`)
//! when they cross a process boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single environment mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Register a route with the environment
    AddRoute { route_id: String, edges: Vec<String> },

    /// Insert the agent's vehicle on a registered route
    AddVehicle {
        entity: String,
        type_id: String,
        route_id: String,
        depart_tick: u64,
        lane_index: u8,
    },

    SetMaxSpeed { entity: String, value: f64 },

    SetMinGap { entity: String, value: f64 },

    SetAcceleration { entity: String, value: f64 },
}

impl Command {
    /// Entity the command mutates (the route id for `AddRoute`)
    pub fn target(&self) -> &str {
        match self {
            Command::AddRoute { route_id, .. } => route_id,
            Command::AddVehicle { entity, .. }
            | Command::SetMaxSpeed { entity, .. }
            | Command::SetMinGap { entity, .. }
            | Command::SetAcceleration { entity, .. } => entity,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Command::AddRoute { .. } => "add_route",
            Command::AddVehicle { .. } => "add_vehicle",
            Command::SetMaxSpeed { .. } => "set_max_speed",
            Command::SetMinGap { .. } => "set_min_gap",
            Command::SetAcceleration { .. } => "set_acceleration",
        }
    }
}

/// Commands produced in one turn, keyed by agent id, in per-agent order.
///
/// Iteration order of this map carries no meaning; the orchestrator imposes
/// its own order before applying anything.
pub type PendingCommands = HashMap<String, Vec<Command>>;
