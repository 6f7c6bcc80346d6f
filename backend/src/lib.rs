//! Norm Simulation Core - Rust Engine
//!
//! Budget-constrained car agents driving in an external, turn-based traffic
//! environment under economically modeled norms.
//!
//! # Architecture
//!
//! - **core**: Configuration and the turn clock
//! - **models**: Domain types (Agent, Route, Command, Event)
//! - **population**: Agent creation and category sampling
//! - **norms**: Norm & sanction engine, budgeted target search
//! - **policy**: Per-goal decision logic
//! - **lifecycle**: Active-Set reconciliation
//! - **environment**: Environment boundary plus an in-memory implementation
//! - **deliberation**: Deliberation boundary plus the car behavior
//! - **orchestrator**: Main turn loop
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Every source of randomness is a seeded RNG
//! 2. After reconciliation the Active-Set equals the environment's present set
//! 3. Sanctions are zero exactly when behavior is compliant
//! 4. Fatal errors always close the environment

// Module declarations
pub mod core;
pub mod deliberation;
pub mod environment;
pub mod lifecycle;
pub mod models;
pub mod norms;
pub mod orchestrator;
pub mod policy;
pub mod population;
pub mod rng;

// Re-exports for convenience
pub use crate::core::config::{ConfigError, SanctionConfig, SimulationConfig};
pub use crate::core::time::{TickClock, TimeRegression};
pub use deliberation::{Deliberation, NormAwareDeliberation};
pub use environment::{Attribute, EnvError, Environment, InMemoryEnvironment, NetworkEdge};
pub use lifecycle::{ActiveSetTracker, LifecycleNotification, Reconciliation};
pub use models::{
    agent::{Agent, Presence},
    backlog::EmissionBacklog,
    category::EconomicCategory,
    command::{Command, PendingCommands},
    event::{Event, EventLog},
    route::Route,
};
pub use norms::{Institution, Sanction, TargetSearch};
pub use orchestrator::{FinishReason, Orchestrator, RunSummary, SimulationError, StopHandle, TickResult};
pub use policy::{DecisionKind, DecisionPolicy};
pub use population::Population;
pub use rng::RngManager;
