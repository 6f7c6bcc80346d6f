//! Norm-aware car deliberation
//!
//! Every agent cycles through the same plan:
//!
//! 1. **Out of the world**: plan a route (the reverse of the previous one if
//!    the network has it, otherwise random origin/destination pairs), then
//!    request entry with `add_route` followed by `add_vehicle` on a random
//!    lane of the first edge.
//! 2. **Entered**: adopt the configured standing goals.
//! 3. **In the world**: every turn, observe the environment and issue one
//!    command per standing goal.
//! 4. **Left**: goals are dropped and the cycle starts again.
//!
//! An entry request that has not produced a vehicle after
//! `routing.entry_retry_turns` turns is planned again from scratch.

use super::Deliberation;
use crate::core::config::{RoutingConfig, SimulationConfig};
use crate::environment::{soften, Attribute, EnvResult, Environment};
use crate::lifecycle::LifecycleNotification;
use crate::models::command::{Command, PendingCommands};
use crate::models::route::{Route, RouteIdGenerator};
use crate::policy::{DecisionKind, DecisionPolicy, Observation};
use crate::population::{Population, CAR_TYPE_ID};
use crate::rng::RngManager;
use tracing::{debug, info, warn};

pub struct NormAwareDeliberation {
    population: Population,
    policy: DecisionPolicy,
    standing_goals: Vec<DecisionKind>,
    routing: RoutingConfig,
    charge_sanctions: bool,
    /// Agent-side randomness: categories, random edges, lanes
    rng: RngManager,
    route_ids: RouteIdGenerator,
    /// Network edges, fetched on first use
    edges: Option<Vec<String>>,
    /// Number of `collect_commands` calls so far; entry retries count these
    turns: u64,
}

impl NormAwareDeliberation {
    /// Build the population from `config` using the agent seed
    pub fn new(config: &SimulationConfig) -> Self {
        let mut rng = RngManager::from_seed_or_entropy(config.agent_seed);
        let population = Population::generate(config, &mut rng);
        Self::with_population(config, population, rng)
    }

    pub fn with_population(config: &SimulationConfig, population: Population, rng: RngManager) -> Self {
        Self {
            population,
            policy: DecisionPolicy::from_config(config),
            standing_goals: config.standing_goals.clone(),
            routing: config.routing.clone(),
            charge_sanctions: config.norms.charge_sanctions,
            rng,
            route_ids: RouteIdGenerator::new(),
            edges: None,
            turns: 0,
        }
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    // ========================================================================
    // Entry
    // ========================================================================

    fn network_edges(&mut self, env: &mut dyn Environment) -> EnvResult<Vec<String>> {
        if let Some(edges) = &self.edges {
            return Ok(edges.clone());
        }
        match soften(env.network_edges(), "network_edges")? {
            Some(edges) if !edges.is_empty() => {
                self.edges = Some(edges.clone());
                Ok(edges)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn find_route(&self, env: &mut dyn Environment, from: &str, to: &str) -> EnvResult<Option<Vec<String>>> {
        let found = soften(env.find_route(from, to, &self.routing.vehicle_class), "find_route")?;
        Ok(found.flatten().filter(|edges| !edges.is_empty()))
    }

    /// Reverse of the previous route first, then random pairs
    fn plan_route(&mut self, id: &str, env: &mut dyn Environment) -> EnvResult<Option<Vec<String>>> {
        let previous = self.population.get(id).and_then(|agent| agent.route().cloned());
        if let Some(previous) = previous {
            if let Some(edges) = self.find_route(env, previous.destination(), previous.origin())? {
                return Ok(Some(edges));
            }
        }

        let edges = self.network_edges(env)?;
        if edges.is_empty() {
            return Ok(None);
        }

        for _ in 0..self.routing.max_route_attempts {
            let from = &edges[self.rng.index(edges.len())];
            let to = &edges[self.rng.index(edges.len())];
            if from == to && edges.len() > 1 {
                continue;
            }
            if let Some(route) = self.find_route(env, from, to)? {
                return Ok(Some(route));
            }
        }

        Ok(None)
    }

    fn request_entry(
        &mut self,
        id: &str,
        tick: u64,
        turn: u64,
        env: &mut dyn Environment,
    ) -> EnvResult<Vec<Command>> {
        let Some(edges) = self.plan_route(id, env)? else {
            warn!(agent = id, "no route found, entry postponed");
            return Ok(Vec::new());
        };

        let route = Route::new(self.route_ids.next_id(), edges);
        let lanes = soften(env.lane_count(route.origin()), "lane_count")?.unwrap_or(1);
        let lane_index = if lanes > 1 {
            self.rng.index(lanes as usize) as u8
        } else {
            0
        };

        debug!(
            agent = id,
            route = route.id(),
            edges = route.edges().len(),
            lane_index,
            "requesting entry"
        );

        let commands = vec![
            Command::AddRoute {
                route_id: route.id().to_string(),
                edges: route.edges().to_vec(),
            },
            Command::AddVehicle {
                entity: id.to_string(),
                type_id: CAR_TYPE_ID.to_string(),
                route_id: route.id().to_string(),
                depart_tick: tick,
                lane_index,
            },
        ];

        if let Some(agent) = self.population.get_mut(id) {
            agent.set_route(route);
            agent.mark_entry_requested(turn);
        }

        Ok(commands)
    }

    // ========================================================================
    // Standing goals
    // ========================================================================

    /// Query only what this agent's goals (and charging) need
    fn observe(
        &self,
        id: &str,
        goals: &[DecisionKind],
        population_co2: &mut Option<Option<f64>>,
        env: &mut dyn Environment,
    ) -> EnvResult<(Observation, Option<f64>)> {
        let wants = |kind: DecisionKind| goals.contains(&kind);
        let needs_ceiling =
            self.charge_sanctions || wants(DecisionKind::MaxSpeed) || wants(DecisionKind::EmissionSpeed);
        let needs_speed = self.charge_sanctions || wants(DecisionKind::MinGap);
        let needs_emissions = goals.iter().any(|kind| kind.uses_emissions());

        let mut observation = Observation::default();

        if needs_ceiling {
            if let Some(lane) = soften(env.lane_of(id), "lane_of")?.flatten() {
                observation.lane_ceiling = soften(env.lane_ceiling(&lane), "lane_ceiling")?;
            }
        }
        if needs_speed {
            observation.speed = self.attribute(env, id, Attribute::Speed)?;
        }
        if wants(DecisionKind::EmissionSpeed) {
            observation.max_speed = self.attribute(env, id, Attribute::MaxSpeed)?;
        }
        if wants(DecisionKind::EmissionAcceleration) {
            observation.acceleration = self.attribute(env, id, Attribute::Acceleration)?;
        }

        let mut own_co2 = None;
        if needs_emissions {
            own_co2 = self.attribute(env, id, Attribute::Co2Emission)?;
            if population_co2.is_none() {
                let average = soften(
                    env.population_average(Attribute::Co2Emission),
                    "population_average",
                )?;
                *population_co2 = Some(average.flatten());
            }
            observation.population_co2 = population_co2.flatten();
        }

        Ok((observation, own_co2))
    }

    fn attribute(&self, env: &mut dyn Environment, id: &str, attribute: Attribute) -> EnvResult<Option<f64>> {
        let context = format!("scalar_attribute({})", attribute);
        Ok(soften(env.scalar_attribute(id, attribute), &context)?.flatten())
    }

    fn pursue_goals(
        &mut self,
        id: &str,
        population_co2: &mut Option<Option<f64>>,
        env: &mut dyn Environment,
    ) -> EnvResult<Vec<Command>> {
        let goals = match self.population.get(id) {
            Some(agent) => agent.goals().to_vec(),
            None => return Ok(Vec::new()),
        };
        if goals.is_empty() && !self.charge_sanctions {
            return Ok(Vec::new());
        }

        let (observation, own_co2) = self.observe(id, &goals, population_co2, env)?;
        let Some(agent) = self.population.get_mut(id) else {
            return Ok(Vec::new());
        };

        if let Some(co2) = own_co2 {
            agent.backlog_mut().push(co2);
        }

        if self.charge_sanctions {
            if let (Some(speed), Some(ceiling)) = (observation.speed, observation.lane_ceiling) {
                let sanction = self.policy.institution().speed_sanction(speed, ceiling);
                if sanction > 0.0 {
                    agent.charge(sanction);
                    debug!(agent = id, sanction, budget = agent.budget(), "sanction charged");
                }
            }
        }

        let mut commands = Vec::with_capacity(goals.len());
        for kind in goals {
            match self
                .policy
                .decide(kind, id, agent.budget(), Some(agent.backlog()), &observation)
            {
                Ok(Some(command)) => commands.push(command),
                Ok(None) => debug!(agent = id, goal = ?kind, "inputs unavailable, goal skipped"),
                Err(err) => warn!(agent = id, goal = ?kind, error = %err, "target search failed"),
            }
        }

        Ok(commands)
    }
}

impl Deliberation for NormAwareDeliberation {
    fn notify(&mut self, notification: &LifecycleNotification) {
        let Some(agent) = self.population.get_mut(notification.agent_id()) else {
            warn!(
                entity = notification.agent_id(),
                "lifecycle notification for unknown agent ignored"
            );
            return;
        };

        match notification {
            LifecycleNotification::EnteredWorld(id) => {
                agent.enter_world();
                for goal in &self.standing_goals {
                    agent.adopt_goal(*goal);
                }
                info!(agent = %id, category = %agent.category(), "entered world");
            }
            LifecycleNotification::LeftWorld(id) => {
                agent.leave_world();
                info!(agent = %id, "left world");
            }
        }
    }

    fn collect_commands(&mut self, tick: u64, env: &mut dyn Environment) -> EnvResult<PendingCommands> {
        let mut pending = PendingCommands::new();
        let mut population_co2 = None;
        let retry_after = self.routing.entry_retry_turns;
        let turn = self.turns;
        self.turns += 1;

        for id in self.population.ids() {
            let (needs_entry, in_world) = match self.population.get(&id) {
                Some(agent) => (agent.needs_entry(turn, retry_after), agent.is_in_world()),
                None => continue,
            };

            let commands = if needs_entry {
                self.request_entry(&id, tick, turn, env)?
            } else if in_world {
                self.pursue_goals(&id, &mut population_co2, env)?
            } else {
                Vec::new()
            };

            if !commands.is_empty() {
                pending.insert(id, commands);
            }
        }

        Ok(pending)
    }
}
