//! Domain models for the norm simulation

pub mod agent;
pub mod backlog;
pub mod category;
pub mod command;
pub mod event;
pub mod route;

// Re-exports
pub use agent::{Agent, Presence};
pub use backlog::{adjust_toward_population, EmissionBacklog};
pub use category::EconomicCategory;
pub use command::{Command, PendingCommands};
pub use event::{Event, EventLog};
pub use route::{Route, RouteIdGenerator};
