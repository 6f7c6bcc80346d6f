//! Command application order
//!
//! Agent ids are sorted lexicographically and then shuffled once with the
//! system RNG. Sorting first removes any dependence on map iteration order,
//! so the same seed and the same pending ids always give the same order. The
//! RNG is advanced across turns and never reseeded.

use crate::models::command::PendingCommands;
use crate::rng::RngManager;

#[derive(Debug, Clone)]
pub struct CommandOrdering {
    rng: RngManager,
}

impl CommandOrdering {
    pub fn new(rng: RngManager) -> Self {
        Self { rng }
    }

    /// Seeded ordering; `None` draws a seed from entropy
    pub fn from_seed(seed: Option<u64>) -> Self {
        Self::new(RngManager::from_seed_or_entropy(seed))
    }

    /// Ids of `pending` in application order
    pub fn order(&mut self, pending: &PendingCommands) -> Vec<String> {
        let mut ids: Vec<String> = pending.keys().cloned().collect();
        ids.sort();
        self.rng.shuffle(&mut ids);
        ids
    }

    pub fn rng_state(&self) -> u64 {
        self.rng.get_state()
    }
}
