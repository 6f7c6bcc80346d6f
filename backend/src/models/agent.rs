//! Agent (car) model
//!
//! An agent record is created once at population initialization and lives
//! for the whole run; only its world presence toggles. Each agent owns:
//! - an economic category and the remaining budget derived from it
//! - an emission backlog (bounded history, capacity fixed at construction)
//! - the current route and standing goals
//!
//! Budget and backlog are written only by the agent's own decision logic.

use crate::models::backlog::EmissionBacklog;
use crate::models::category::EconomicCategory;
use crate::models::route::Route;
use crate::policy::DecisionKind;
use serde::{Deserialize, Serialize};

/// Whether the agent's vehicle is currently present in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    NotInWorld,
    InWorld,
}

/// A car agent
///
/// # Example
/// ```
/// use normsim_core::{Agent, EconomicCategory};
///
/// let mut agent = Agent::new("car-0".to_string(), EconomicCategory::Poor, 10.0, 10);
/// assert!(!agent.is_in_world());
///
/// agent.charge(4.0);
/// assert_eq!(agent.budget(), 6.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    id: String,
    category: EconomicCategory,
    presence: Presence,
    /// Remaining sanction tolerance
    budget: f64,
    backlog: EmissionBacklog,
    route: Option<Route>,
    goals: Vec<DecisionKind>,
    /// Turn at which entry was last requested, while waiting to appear
    entry_requested_at: Option<u64>,
}

impl Agent {
    pub fn new(
        id: String,
        category: EconomicCategory,
        budget: f64,
        backlog_capacity: usize,
    ) -> Self {
        Self {
            id,
            category,
            presence: Presence::NotInWorld,
            budget,
            backlog: EmissionBacklog::new(backlog_capacity),
            route: None,
            goals: Vec::new(),
            entry_requested_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> EconomicCategory {
        self.category
    }

    pub fn presence(&self) -> Presence {
        self.presence
    }

    pub fn is_in_world(&self) -> bool {
        self.presence == Presence::InWorld
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Deduct a sanction from the budget; the budget never goes below zero
    pub fn charge(&mut self, sanction: f64) {
        if sanction > 0.0 {
            self.budget = (self.budget - sanction).max(0.0);
        }
    }

    pub fn backlog(&self) -> &EmissionBacklog {
        &self.backlog
    }

    pub fn backlog_mut(&mut self) -> &mut EmissionBacklog {
        &mut self.backlog
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Replace the current route
    pub fn set_route(&mut self, route: Route) {
        self.route = Some(route);
    }

    pub fn goals(&self) -> &[DecisionKind] {
        &self.goals
    }

    /// Adopt a standing goal (no duplicates)
    pub fn adopt_goal(&mut self, goal: DecisionKind) {
        if !self.goals.contains(&goal) {
            self.goals.push(goal);
        }
    }

    pub fn entry_requested_at(&self) -> Option<u64> {
        self.entry_requested_at
    }

    /// Record an entry request made on deliberation turn `turn`
    pub fn mark_entry_requested(&mut self, turn: u64) {
        self.entry_requested_at = Some(turn);
    }

    /// True if the agent is out of the world and has no live entry request.
    ///
    /// Both arguments count deliberation turns, never environment ticks. A
    /// request older than `retry_after` turns is considered lost.
    pub fn needs_entry(&self, turn: u64, retry_after: u64) -> bool {
        if self.is_in_world() {
            return false;
        }
        match self.entry_requested_at {
            None => true,
            Some(requested) => turn.saturating_sub(requested) >= retry_after,
        }
    }

    /// Vehicle appeared in the environment
    pub fn enter_world(&mut self) {
        self.presence = Presence::InWorld;
        self.entry_requested_at = None;
    }

    /// Vehicle left the environment; standing goals are dropped with it
    pub fn leave_world(&mut self) {
        self.presence = Presence::NotInWorld;
        self.entry_requested_at = None;
        self.goals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new("car-0".to_string(), EconomicCategory::Medium, 150.0, 10)
    }

    #[test]
    fn test_new_agent_out_of_world() {
        let agent = agent();
        assert_eq!(agent.presence(), Presence::NotInWorld);
        assert_eq!(agent.budget(), 150.0);
        assert!(agent.route().is_none());
        assert!(agent.goals().is_empty());
    }

    #[test]
    fn test_charge_saturates_at_zero() {
        let mut agent = agent();
        agent.charge(100.0);
        agent.charge(100.0);
        assert_eq!(agent.budget(), 0.0);
    }

    #[test]
    fn test_negative_charge_ignored() {
        let mut agent = agent();
        agent.charge(-5.0);
        assert_eq!(agent.budget(), 150.0);
    }

    #[test]
    fn test_lifecycle_is_reenterable() {
        let mut agent = agent();
        agent.enter_world();
        agent.adopt_goal(DecisionKind::MaxSpeed);
        assert!(agent.is_in_world());

        agent.leave_world();
        assert!(!agent.is_in_world());
        assert!(agent.goals().is_empty());

        agent.enter_world();
        assert!(agent.is_in_world());
    }

    #[test]
    fn test_adopt_goal_deduplicates() {
        let mut agent = agent();
        agent.adopt_goal(DecisionKind::MinGap);
        agent.adopt_goal(DecisionKind::MinGap);
        assert_eq!(agent.goals(), &[DecisionKind::MinGap]);
    }

    #[test]
    fn test_needs_entry_until_retry_window() {
        let mut agent = agent();
        assert!(agent.needs_entry(0, 10));

        agent.mark_entry_requested(3);
        assert!(!agent.needs_entry(5, 10));
        assert!(agent.needs_entry(13, 10));

        agent.enter_world();
        assert!(!agent.needs_entry(100, 10));
    }
}
