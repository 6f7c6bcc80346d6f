//! Agent lifecycle tracking
//!
//! Keeps the Active-Set (ids the environment reported as present at the last
//! reconciliation) and turns environment reports into arrival and departure
//! deltas once per turn.
//!
//! Reconciliation order matters: departures are removed first, then arrivals
//! are detected against what is left. An id that departed and re-entered
//! within the same turn therefore shows up in both deltas.

use crate::environment::{EnvResult, Environment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle change delivered to deliberation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "agent_id", rename_all = "snake_case")]
pub enum LifecycleNotification {
    EnteredWorld(String),
    LeftWorld(String),
}

impl LifecycleNotification {
    pub fn agent_id(&self) -> &str {
        match self {
            LifecycleNotification::EnteredWorld(id) | LifecycleNotification::LeftWorld(id) => id,
        }
    }
}

/// Result of one reconciliation, both sides sorted by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub departed: Vec<String>,
    pub arrived: Vec<String>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.departed.is_empty() && self.arrived.is_empty()
    }

    /// Notifications in delivery order: all departures, then all arrivals
    pub fn notifications(&self) -> Vec<LifecycleNotification> {
        self.departed
            .iter()
            .cloned()
            .map(LifecycleNotification::LeftWorld)
            .chain(self.arrived.iter().cloned().map(LifecycleNotification::EnteredWorld))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActiveSetTracker {
    active: BTreeSet<String>,
}

impl ActiveSetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    pub fn active(&self) -> &BTreeSet<String> {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Bring the Active-Set in line with the environment.
    ///
    /// Any environment error is returned as-is and leaves the Active-Set
    /// untouched; the caller treats it as fatal.
    pub fn reconcile<E: Environment + ?Sized>(&mut self, env: &mut E) -> EnvResult<Reconciliation> {
        let reported_departures = env.departed_entities()?;
        let present: BTreeSet<String> = env.present_entities()?.into_iter().collect();
        Ok(self.apply(&reported_departures, &present))
    }

    /// Pure core of [`reconcile`](Self::reconcile)
    pub fn apply(&mut self, reported_departures: &[String], present: &BTreeSet<String>) -> Reconciliation {
        let mut departed = BTreeSet::new();

        for id in reported_departures {
            if self.active.remove(id) {
                departed.insert(id.clone());
            }
        }

        // Implicit departures: active last turn, gone now, never reported
        let vanished: Vec<String> = self
            .active
            .iter()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();
        for id in vanished {
            self.active.remove(&id);
            departed.insert(id);
        }

        let mut arrived = Vec::new();
        for id in present {
            if self.active.insert(id.clone()) {
                arrived.push(id.clone());
            }
        }

        Reconciliation {
            departed: departed.into_iter().collect(),
            arrived,
        }
    }
}
