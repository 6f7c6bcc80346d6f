//! Orchestrator - per-turn synchronization with the environment
//!
//! See `engine.rs` for the turn loop.

pub mod engine;
pub mod fingerprint;
pub mod ordering;

pub use engine::{FinishReason, Orchestrator, RunSummary, SimulationError, StopHandle, TickResult};
pub use fingerprint::config_fingerprint;
pub use ordering::CommandOrdering;
