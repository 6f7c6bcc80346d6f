//! Deliberation boundary
//!
//! Deliberation is whatever decides what agents want to do. The orchestrator
//! only needs two things from it:
//!
//! - lifecycle notifications, delivered synchronously in reconciliation order
//!   before commands are collected
//! - one completed map of pending commands per turn (the turn barrier)
//!
//! [`NormAwareDeliberation`] is the car behavior shipped with the crate.

pub mod car;

pub use car::NormAwareDeliberation;

use crate::environment::{EnvResult, Environment};
use crate::lifecycle::LifecycleNotification;
use crate::models::command::PendingCommands;

pub trait Deliberation {
    /// Called once per lifecycle occurrence, before `collect_commands`
    fn notify(&mut self, notification: &LifecycleNotification);

    /// Called exactly once per turn. Only fatal environment errors may be
    /// returned; soft failures are handled (and logged) inside.
    fn collect_commands(&mut self, tick: u64, env: &mut dyn Environment) -> EnvResult<PendingCommands>;
}
