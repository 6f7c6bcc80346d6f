//! Population initialization
//!
//! Agents are created once, before the first turn. Each draws its economic
//! category from the configured weights and starts with that category's
//! budget. Ids are `car-<index>`.

pub mod sampler;

pub use sampler::WeightedSampler;

use crate::core::config::SimulationConfig;
use crate::models::agent::Agent;
use crate::models::category::EconomicCategory;
use crate::rng::RngManager;
use std::collections::BTreeMap;

/// Vehicle type of every agent
pub const CAR_TYPE_ID: &str = "car";

/// Category sampler built from configured weights
pub fn category_sampler(config: &SimulationConfig) -> WeightedSampler<EconomicCategory> {
    let mut sampler = WeightedSampler::new();
    for category in EconomicCategory::ALL {
        sampler.add_entry(category, config.categories.weights.get(category));
    }
    sampler
}

/// All agents of the run, keyed (and iterated) by id
#[derive(Debug, Clone, Default)]
pub struct Population {
    agents: BTreeMap<String, Agent>,
}

impl Population {
    /// Create `config.num_agents` agents, sampling categories with `rng`.
    ///
    /// Config must already be validated; a distribution with no positive
    /// weight falls back to the lowest category.
    pub fn generate(config: &SimulationConfig, rng: &mut RngManager) -> Self {
        let sampler = category_sampler(config);
        let agents = (0..config.num_agents)
            .map(|index| {
                let category = sampler.sample(rng).unwrap_or(EconomicCategory::Poor);
                let id = format!("{}-{}", CAR_TYPE_ID, index);
                let budget = category.budget(&config.categories.budgets);
                let agent = Agent::new(id.clone(), category, budget, config.emission.backlog_capacity);
                (id, agent)
            })
            .collect();

        Self { agents }
    }

    pub fn from_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        Self {
            agents: agents
                .into_iter()
                .map(|agent| (agent.id().to_string(), agent))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Agent count per category
    pub fn category_counts(&self) -> BTreeMap<EconomicCategory, usize> {
        let mut counts = BTreeMap::new();
        for agent in self.agents.values() {
            *counts.entry(agent.category()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_assigns_ids_and_budgets() {
        let config = SimulationConfig {
            num_agents: 5,
            ..SimulationConfig::default()
        };
        let mut rng = RngManager::new(11);
        let population = Population::generate(&config, &mut rng);

        assert_eq!(population.len(), 5);
        for index in 0..5 {
            let agent = population.get(&format!("car-{}", index)).unwrap();
            assert_eq!(
                agent.budget(),
                agent.category().budget(&config.categories.budgets)
            );
            assert_eq!(agent.backlog().capacity(), config.emission.backlog_capacity);
        }
    }

    #[test]
    fn test_generate_deterministic_for_seed() {
        let config = SimulationConfig {
            num_agents: 50,
            ..SimulationConfig::default()
        };
        let a = Population::generate(&config, &mut RngManager::new(5));
        let b = Population::generate(&config, &mut RngManager::new(5));

        let categories_a: Vec<_> = a.agents().map(|agent| agent.category()).collect();
        let categories_b: Vec<_> = b.agents().map(|agent| agent.category()).collect();
        assert_eq!(categories_a, categories_b);
    }
}
