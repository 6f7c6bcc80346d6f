//! Event logging for replay and inspection.
//!
//! Every lifecycle change, command outcome and tick advance the orchestrator
//! observes is recorded here, in the order it happened. Two runs with the
//! same seeds against the same environment produce identical logs.
//!
//! # Example
//!
//! ```rust
//! use normsim_core::models::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::EnteredWorld { tick: 0, agent_id: "car-1".to_string() });
//! log.log(Event::TickAdvanced { turn: 1, tick: 1 });
//!
//! assert_eq!(log.events_for_agent("car-1").len(), 1);
//! assert_eq!(log.events_at_tick(1).len(), 1);
//! ```

use crate::models::command::Command;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Simulation event capturing a state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Agent's vehicle appeared in the environment
    EnteredWorld { tick: u64, agent_id: String },

    /// Agent's vehicle is no longer in the environment
    LeftWorld { tick: u64, agent_id: String },

    /// Command accepted by the environment
    CommandApplied {
        tick: u64,
        agent_id: String,
        command: Command,
    },

    /// Command rejected with a soft failure and skipped
    CommandSkipped {
        tick: u64,
        agent_id: String,
        command: Command,
        reason: String,
    },

    /// Environment advanced; `tick` is its reported time afterwards
    TickAdvanced { turn: u64, tick: u64 },
}

impl Event {
    pub fn tick(&self) -> u64 {
        match self {
            Event::EnteredWorld { tick, .. }
            | Event::LeftWorld { tick, .. }
            | Event::CommandApplied { tick, .. }
            | Event::CommandSkipped { tick, .. }
            | Event::TickAdvanced { tick, .. } => *tick,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Event::EnteredWorld { .. } => "entered_world",
            Event::LeftWorld { .. } => "left_world",
            Event::CommandApplied { .. } => "command_applied",
            Event::CommandSkipped { .. } => "command_skipped",
            Event::TickAdvanced { .. } => "tick_advanced",
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Event::EnteredWorld { agent_id, .. }
            | Event::LeftWorld { agent_id, .. }
            | Event::CommandApplied { agent_id, .. }
            | Event::CommandSkipped { agent_id, .. } => Some(agent_id),
            Event::TickAdvanced { .. } => None,
        }
    }
}

/// Log of simulation events, optionally bounded.
///
/// With a capacity the log keeps only the most recent events and counts the
/// ones it evicted; a capacity of 0 records nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<Event>,
    capacity: Option<usize>,
    evicted: u64,
}

impl EventLog {
    /// Unbounded log
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that retains at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity: Some(capacity),
            evicted: 0,
        }
    }

    pub fn log(&mut self, event: Event) {
        match self.capacity {
            Some(0) => {
                self.evicted += 1;
                return;
            }
            Some(capacity) if self.events.len() >= capacity => {
                self.events.pop_front();
                self.evicted += 1;
            }
            _ => {}
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Events dropped to stay within capacity
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Retained events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    pub fn events_at_tick(&self, tick: u64) -> Vec<&Event> {
        self.events.iter().filter(|e| e.tick() == tick).collect()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn events_for_agent(&self, agent_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.agent_id() == Some(agent_id))
            .collect()
    }

    /// Agent ids of applied commands, in application order
    pub fn application_order(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::CommandApplied { agent_id, .. } => Some(agent_id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
