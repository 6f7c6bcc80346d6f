//! Configuration and time management

pub mod config;
pub mod time;
