//! Deterministic random number generation
//!
//! Uses xorshift64* for fast, deterministic random number generation.
//! All randomness in the core (command ordering, category sampling, route
//! and lane choice) goes through this module.

mod xorshift;

pub use xorshift::RngManager;
