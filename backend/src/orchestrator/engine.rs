//! Orchestrator engine
//!
//! Drives the turn loop against one environment and one deliberation.
//!
//! # Turn
//!
//! Each step is a precondition for the next:
//!
//! 1. **Reconcile**: refresh the Active-Set from the environment; every
//!    departure and arrival is delivered to deliberation as a notification.
//! 2. **Collect**: one call into deliberation for the turn's pending commands.
//! 3. **Order**: sort agent ids, shuffle with the system RNG.
//! 4. **Apply**: per agent in that order, commands in list order. A lost
//!    connection aborts the run; any other failure skips that command.
//! 5. **Advance**: step the environment and read its authoritative time.
//! 6. **Terminate?**: turn budget exhausted or environment finished.
//!
//! Any fatal error closes the environment before it is returned. So does
//! finishing normally, and so does a stop request.
//!
//! # Determinism
//!
//! The only randomness here is the system RNG used for ordering. Same seed,
//! same environment behavior, same deliberation output: same application
//! order, turn after turn.

use crate::core::config::{ConfigError, SimulationConfig};
use crate::core::time::{TickClock, TimeRegression};
use crate::deliberation::Deliberation;
use crate::environment::{EnvError, Environment};
use crate::lifecycle::{ActiveSetTracker, LifecycleNotification};
use crate::models::event::{Event, EventLog};
use crate::orchestrator::fingerprint::config_fingerprint;
use crate::orchestrator::ordering::CommandOrdering;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

// ============================================================================
// Errors
// ============================================================================

/// Fatal orchestrator errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("configuration could not be serialized: {0}")]
    Serialization(String),

    #[error("environment unavailable at startup: {0}")]
    Startup(#[source] EnvError),

    #[error("lifecycle reconciliation failed: {0}")]
    Reconciliation(#[source] EnvError),

    #[error("environment query failed: {0}")]
    QueryFailed(#[source] EnvError),

    #[error("connection lost while applying commands for {agent}: {source}")]
    ConnectionLost {
        agent: String,
        #[source]
        source: EnvError,
    },

    #[error("time step failed: {0}")]
    TimeStep(#[source] EnvError),

    #[error(transparent)]
    TimeRegression(#[from] TimeRegression),

    #[error("simulation already finished ({0:?})")]
    AlreadyFinished(FinishReason),
}

impl SimulationError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SimulationError::InvalidConfig(_) => 2,
            SimulationError::Serialization(_)
            | SimulationError::Startup(_)
            | SimulationError::AlreadyFinished(_) => 1,
            SimulationError::TimeStep(_) | SimulationError::TimeRegression(_) => 4,
            SimulationError::ConnectionLost { .. } => 10,
            SimulationError::Reconciliation(_) | SimulationError::QueryFailed(_) => 15,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Why a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    TurnBudgetExhausted,
    EnvironmentEnded,
    Interrupted,
}

/// Outcome of one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    /// Turn number (1-based) of the turn just run
    pub turn: u64,

    /// Environment time after the advance
    pub tick: u64,

    pub arrived: usize,
    pub departed: usize,

    pub commands_applied: usize,
    pub commands_skipped: usize,

    /// Set when this turn ended the run
    pub finish: Option<FinishReason>,
}

/// Totals for a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub turns_run: u64,
    pub final_tick: u64,
    pub commands_applied: u64,
    pub commands_skipped: u64,
    pub agents_in_world: usize,
    /// Events dropped from the bounded event log
    pub events_evicted: u64,
    pub finish_reason: FinishReason,
    pub config_hash: String,
}

/// Shared flag to request a stop from outside the turn loop
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Turn loop over an environment and a deliberation
///
/// # Example
///
/// ```rust
/// use normsim_core::{InMemoryEnvironment, NormAwareDeliberation, Orchestrator, SimulationConfig};
///
/// let config = SimulationConfig {
///     num_agents: 3,
///     max_turns: Some(5),
///     system_seed: Some(1),
///     agent_seed: Some(2),
///     ..SimulationConfig::default()
/// };
/// let deliberation = NormAwareDeliberation::new(&config);
/// let env = InMemoryEnvironment::ring(6);
///
/// let mut orchestrator = Orchestrator::new(config, env, deliberation).unwrap();
/// let summary = orchestrator.run().unwrap();
/// assert_eq!(summary.turns_run, 5);
/// ```
pub struct Orchestrator<E: Environment, D: Deliberation> {
    config: SimulationConfig,
    config_hash: String,

    env: E,
    deliberation: D,

    tracker: ActiveSetTracker,
    ordering: CommandOrdering,
    clock: TickClock,

    event_log: EventLog,
    stop: StopHandle,

    commands_applied: u64,
    commands_skipped: u64,

    finish_reason: Option<FinishReason>,
    closed: bool,
}

impl<E: Environment, D: Deliberation> Orchestrator<E, D> {
    /// Validate `config`, fingerprint it and read the environment's initial time.
    ///
    /// On failure the environment is closed before the error is returned.
    pub fn new(config: SimulationConfig, mut env: E, deliberation: D) -> Result<Self, SimulationError> {
        let prepared = config
            .validate()
            .map_err(SimulationError::from)
            .and_then(|_| {
                config_fingerprint(&config).map_err(|e| SimulationError::Serialization(e.to_string()))
            })
            .and_then(|hash| {
                let initial = env.current_time().map_err(SimulationError::Startup)?;
                Ok((hash, initial))
            });

        let (config_hash, initial_tick) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(error = %err, "orchestrator startup failed");
                env.close();
                return Err(err);
            }
        };

        info!(
            config_hash = %config_hash,
            agents = config.num_agents,
            max_turns = ?config.max_turns,
            initial_tick,
            "orchestrator ready"
        );

        Ok(Self {
            ordering: CommandOrdering::from_seed(config.system_seed),
            config_hash,
            env,
            deliberation,
            tracker: ActiveSetTracker::new(),
            clock: TickClock::new(initial_tick),
            event_log: match config.event_log_capacity {
                Some(capacity) => EventLog::with_capacity(capacity),
                None => EventLog::new(),
            },
            config,
            stop: StopHandle::new(),
            commands_applied: 0,
            commands_skipped: 0,
            finish_reason: None,
            closed: false,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.current_tick()
    }

    pub fn turns_run(&self) -> u64 {
        self.clock.turns_run()
    }

    pub fn tracker(&self) -> &ActiveSetTracker {
        &self.tracker
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn deliberation(&self) -> &D {
        &self.deliberation
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn is_finished(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Handle that stops the run at the next step boundary
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    // ========================================================================
    // Turn loop
    // ========================================================================

    /// Run turns until the budget is exhausted, the environment ends or a
    /// stop is requested.
    pub fn run(&mut self) -> Result<RunSummary, SimulationError> {
        while !self.is_finished() {
            self.run_turn()?;
        }
        Ok(self.summary())
    }

    /// Run exactly one turn.
    ///
    /// A stop request seen at a step boundary ends the run with
    /// [`FinishReason::Interrupted`] and a partial result.
    pub fn run_turn(&mut self) -> Result<TickResult, SimulationError> {
        if let Some(reason) = self.finish_reason {
            return Err(SimulationError::AlreadyFinished(reason));
        }

        let tick = self.clock.current_tick();
        let turn = self.clock.turns_run() + 1;
        let mut result = TickResult {
            turn,
            tick,
            arrived: 0,
            departed: 0,
            commands_applied: 0,
            commands_skipped: 0,
            finish: None,
        };

        if self.interrupted(&mut result) {
            return Ok(result);
        }

        // STEP 1: RECONCILE
        let reconciliation = match self.tracker.reconcile(&mut self.env) {
            Ok(reconciliation) => reconciliation,
            Err(err) => return Err(self.abort(SimulationError::Reconciliation(err))),
        };
        result.departed = reconciliation.departed.len();
        result.arrived = reconciliation.arrived.len();

        for notification in reconciliation.notifications() {
            let event = match &notification {
                LifecycleNotification::EnteredWorld(id) => Event::EnteredWorld {
                    tick,
                    agent_id: id.clone(),
                },
                LifecycleNotification::LeftWorld(id) => Event::LeftWorld {
                    tick,
                    agent_id: id.clone(),
                },
            };
            self.event_log.log(event);
            self.deliberation.notify(&notification);
        }

        // STEP 2: COLLECT
        let mut pending = match self.deliberation.collect_commands(tick, &mut self.env) {
            Ok(pending) => pending,
            Err(err) => return Err(self.abort(SimulationError::QueryFailed(err))),
        };

        // STEP 3: ORDER
        let order = self.ordering.order(&pending);

        if self.interrupted(&mut result) {
            return Ok(result);
        }

        // STEP 4: APPLY
        for agent_id in order {
            let Some(commands) = pending.remove(&agent_id) else {
                continue;
            };

            for command in commands {
                match self.env.apply_command(&command) {
                    Ok(()) => {
                        debug!(agent = %agent_id, kind = command.kind(), target = command.target(), "command applied");
                        result.commands_applied += 1;
                        self.event_log.log(Event::CommandApplied {
                            tick,
                            agent_id: agent_id.clone(),
                            command,
                        });
                    }
                    Err(err) if err.is_fatal() => {
                        return Err(self.abort(SimulationError::ConnectionLost {
                            agent: agent_id,
                            source: err,
                        }));
                    }
                    Err(err) => {
                        warn!(agent = %agent_id, kind = command.kind(), error = %err, "command skipped");
                        result.commands_skipped += 1;
                        self.event_log.log(Event::CommandSkipped {
                            tick,
                            agent_id: agent_id.clone(),
                            command,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
        self.commands_applied += result.commands_applied as u64;
        self.commands_skipped += result.commands_skipped as u64;

        if self.interrupted(&mut result) {
            return Ok(result);
        }

        // STEP 5: ADVANCE
        let reported = match self.env.advance_time().and_then(|_| self.env.current_time()) {
            Ok(reported) => reported,
            Err(err) => return Err(self.abort(SimulationError::TimeStep(err))),
        };
        if let Err(regression) = self.clock.record_advance(reported) {
            return Err(self.abort(regression.into()));
        }
        result.tick = reported;
        self.event_log.log(Event::TickAdvanced {
            turn,
            tick: reported,
        });

        info!(
            turn,
            tick = reported,
            arrived = result.arrived,
            departed = result.departed,
            applied = result.commands_applied,
            skipped = result.commands_skipped,
            "turn complete"
        );

        // STEP 6: TERMINATION
        if self.clock.budget_exhausted(self.config.max_turns) {
            self.finish(FinishReason::TurnBudgetExhausted);
        } else {
            match self.env.is_finished() {
                Ok(true) => self.finish(FinishReason::EnvironmentEnded),
                Ok(false) => {}
                Err(err) if err.is_fatal() => {
                    return Err(self.abort(SimulationError::QueryFailed(err)));
                }
                Err(err) => warn!(error = %err, "end-of-simulation check failed, continuing"),
            }
        }
        result.finish = self.finish_reason;

        Ok(result)
    }

    /// Summary of the run so far
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            turns_run: self.clock.turns_run(),
            final_tick: self.clock.current_tick(),
            commands_applied: self.commands_applied,
            commands_skipped: self.commands_skipped,
            agents_in_world: self.tracker.len(),
            events_evicted: self.event_log.evicted(),
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Interrupted),
            config_hash: self.config_hash.clone(),
        }
    }

    /// Close the environment. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.env.close();
            debug!("environment closed");
        }
    }

    fn interrupted(&mut self, result: &mut TickResult) -> bool {
        if self.stop.is_stop_requested() {
            info!(turn = result.turn, "stop requested");
            self.finish(FinishReason::Interrupted);
            result.finish = self.finish_reason;
            true
        } else {
            false
        }
    }

    fn finish(&mut self, reason: FinishReason) {
        info!(
            reason = ?reason,
            turns = self.clock.turns_run(),
            tick = self.clock.current_tick(),
            "simulation finished"
        );
        self.finish_reason = Some(reason);
        self.shutdown();
    }

    fn abort(&mut self, err: SimulationError) -> SimulationError {
        error!(error = %err, exit_code = err.exit_code(), "fatal error, shutting down");
        self.shutdown();
        err
    }
}

impl<E: Environment, D: Deliberation> Drop for Orchestrator<E, D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::InMemoryEnvironment;
    use crate::models::command::PendingCommands;

    /// Deliberation that never asks for anything
    struct Idle;

    impl Deliberation for Idle {
        fn notify(&mut self, _notification: &LifecycleNotification) {}

        fn collect_commands(
            &mut self,
            _tick: u64,
            _env: &mut dyn Environment,
        ) -> Result<PendingCommands, EnvError> {
            Ok(PendingCommands::new())
        }
    }

    fn config(max_turns: Option<u64>) -> SimulationConfig {
        SimulationConfig {
            num_agents: 1,
            max_turns,
            system_seed: Some(1),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_exit_codes() {
        let env_err = EnvError::ConnectionLost("x".into());
        assert_eq!(
            SimulationError::InvalidConfig(ConfigError::Invalid("x".into())).exit_code(),
            2
        );
        assert_eq!(SimulationError::Startup(env_err.clone()).exit_code(), 1);
        assert_eq!(SimulationError::TimeStep(env_err.clone()).exit_code(), 4);
        assert_eq!(
            SimulationError::TimeRegression(TimeRegression {
                previous: 2,
                reported: 1
            })
            .exit_code(),
            4
        );
        assert_eq!(
            SimulationError::ConnectionLost {
                agent: "car-0".into(),
                source: env_err.clone()
            }
            .exit_code(),
            10
        );
        assert_eq!(SimulationError::Reconciliation(env_err.clone()).exit_code(), 15);
        assert_eq!(SimulationError::QueryFailed(env_err).exit_code(), 15);
    }

    #[test]
    fn test_invalid_config_closes_env() {
        let mut bad = config(None);
        bad.categories.weights.rich = 90.0;
        let err = Orchestrator::new(bad, InMemoryEnvironment::ring(4), Idle)
            .err()
            .unwrap();
        assert!(matches!(err, SimulationError::InvalidConfig(ConfigError::WeightTotal { .. })));
    }

    #[test]
    fn test_startup_failure() {
        let mut env = InMemoryEnvironment::ring(4);
        env.disconnect();
        let err = Orchestrator::new(config(None), env, Idle).err().unwrap();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_turn_budget() {
        let mut orchestrator =
            Orchestrator::new(config(Some(3)), InMemoryEnvironment::ring(4), Idle).unwrap();
        let summary = orchestrator.run().unwrap();

        assert_eq!(summary.turns_run, 3);
        assert_eq!(summary.final_tick, 3);
        assert_eq!(summary.finish_reason, FinishReason::TurnBudgetExhausted);
        assert!(orchestrator.environment().is_closed());
        assert!(matches!(
            orchestrator.run_turn(),
            Err(SimulationError::AlreadyFinished(FinishReason::TurnBudgetExhausted))
        ));
    }

    #[test]
    fn test_authoritative_time_adopted() {
        let env = InMemoryEnvironment::ring(4).with_time_step(1000);
        let mut orchestrator = Orchestrator::new(config(Some(2)), env, Idle).unwrap();

        let first = orchestrator.run_turn().unwrap();
        assert_eq!(first.tick, 1000);
        assert_eq!(orchestrator.current_tick(), 1000);
        assert_eq!(orchestrator.turns_run(), 1);
    }

    #[test]
    fn test_stop_handle() {
        let mut orchestrator =
            Orchestrator::new(config(None), InMemoryEnvironment::ring(4), Idle).unwrap();
        orchestrator.run_turn().unwrap();

        orchestrator.stop_handle().request_stop();
        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.finish_reason, FinishReason::Interrupted);
        assert_eq!(summary.turns_run, 1);
        assert!(orchestrator.environment().is_closed());
    }

    #[test]
    fn test_shutdown_idempotent() {
        let mut orchestrator =
            Orchestrator::new(config(None), InMemoryEnvironment::ring(4), Idle).unwrap();
        orchestrator.shutdown();
        orchestrator.shutdown();
        assert!(orchestrator.environment().is_closed());
    }
}
