//! Active-Set reconciliation against scripted and in-memory environments

use normsim_core::environment::EnvResult;
use normsim_core::{
    ActiveSetTracker, Attribute, Command, EnvError, Environment, InMemoryEnvironment,
    LifecycleNotification,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Environment that reports whatever the test scripts for the current turn
#[derive(Default)]
struct ScriptedEnv {
    present: Vec<String>,
    departed: Vec<String>,
    fail_with: Option<EnvError>,
}

impl ScriptedEnv {
    fn script(&mut self, present: &[&str], departed: &[&str]) {
        self.present = present.iter().map(|s| s.to_string()).collect();
        self.departed = departed.iter().map(|s| s.to_string()).collect();
    }

    fn check(&mut self) -> EnvResult<()> {
        match self.fail_with.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Environment for ScriptedEnv {
    fn present_entities(&mut self) -> EnvResult<Vec<String>> {
        self.check()?;
        Ok(self.present.clone())
    }

    fn departed_entities(&mut self) -> EnvResult<Vec<String>> {
        self.check()?;
        Ok(self.departed.clone())
    }

    fn network_edges(&mut self) -> EnvResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn find_route(&mut self, _from: &str, _to: &str, _class: &str) -> EnvResult<Option<Vec<String>>> {
        Ok(None)
    }

    fn lane_count(&mut self, _edge: &str) -> EnvResult<u8> {
        Ok(1)
    }

    fn lane_of(&mut self, _entity: &str) -> EnvResult<Option<String>> {
        Ok(None)
    }

    fn lane_ceiling(&mut self, _lane: &str) -> EnvResult<f64> {
        Ok(13.89)
    }

    fn scalar_attribute(&mut self, _entity: &str, _attribute: Attribute) -> EnvResult<Option<f64>> {
        Ok(None)
    }

    fn population_average(&mut self, _attribute: Attribute) -> EnvResult<Option<f64>> {
        Ok(None)
    }

    fn apply_command(&mut self, _command: &Command) -> EnvResult<()> {
        Ok(())
    }

    fn advance_time(&mut self) -> EnvResult<()> {
        Ok(())
    }

    fn current_time(&mut self) -> EnvResult<u64> {
        Ok(0)
    }

    fn is_finished(&mut self) -> EnvResult<bool> {
        Ok(false)
    }

    fn close(&mut self) {}
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_reconcile_against_environment() {
    let mut env = ScriptedEnv::default();
    let mut tracker = ActiveSetTracker::new();

    env.script(&["car-0", "car-1"], &[]);
    let first = tracker.reconcile(&mut env).unwrap();
    assert_eq!(first.arrived, ids(&["car-0", "car-1"]));

    env.script(&["car-1", "car-2"], &["car-0"]);
    let second = tracker.reconcile(&mut env).unwrap();
    assert_eq!(second.departed, ids(&["car-0"]));
    assert_eq!(second.arrived, ids(&["car-2"]));
    assert_eq!(tracker.active().len(), 2);
}

#[test]
fn test_reentry_in_same_turn_notifies_both() {
    let mut env = ScriptedEnv::default();
    let mut tracker = ActiveSetTracker::new();

    env.script(&["car-0"], &[]);
    tracker.reconcile(&mut env).unwrap();

    env.script(&["car-0"], &["car-0"]);
    let result = tracker.reconcile(&mut env).unwrap();
    assert_eq!(
        result.notifications(),
        vec![
            LifecycleNotification::LeftWorld("car-0".to_string()),
            LifecycleNotification::EnteredWorld("car-0".to_string()),
        ]
    );
    assert!(tracker.is_active("car-0"));
}

#[test]
fn test_error_leaves_active_set_untouched() {
    let mut env = ScriptedEnv::default();
    let mut tracker = ActiveSetTracker::new();

    env.script(&["car-0"], &[]);
    tracker.reconcile(&mut env).unwrap();

    env.script(&[], &["car-0"]);
    env.fail_with = Some(EnvError::ConnectionLost("reset".to_string()));
    assert!(tracker.reconcile(&mut env).is_err());
    assert!(tracker.is_active("car-0"));
}

#[test]
fn test_in_memory_departure_detected() {
    let mut env = InMemoryEnvironment::ring(4);
    env.apply_command(&Command::AddRoute {
        route_id: "route-0".to_string(),
        edges: ids(&["e0", "e1"]),
    })
    .unwrap();
    env.apply_command(&Command::AddVehicle {
        entity: "car-0".to_string(),
        type_id: "car".to_string(),
        route_id: "route-0".to_string(),
        depart_tick: 0,
        lane_index: 0,
    })
    .unwrap();
    env.advance_time().unwrap();

    let mut tracker = ActiveSetTracker::new();
    assert_eq!(tracker.reconcile(&mut env).unwrap().arrived, ids(&["car-0"]));

    assert!(env.remove_vehicle("car-0"));
    let result = tracker.reconcile(&mut env).unwrap();
    assert_eq!(result.departed, ids(&["car-0"]));
    assert!(result.arrived.is_empty());
    assert!(tracker.is_empty());
}

fn id_set() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set((0u8..12).prop_map(|i| format!("car-{}", i)), 0..12)
}

proptest! {
    /// After every reconcile the Active-Set equals the present set, and the
    /// deltas are exactly the set differences
    #[test]
    fn prop_active_set_tracks_present(
        turns in proptest::collection::vec((id_set(), id_set()), 1..20)
    ) {
        let mut tracker = ActiveSetTracker::new();

        for (present, reported) in turns {
            let before = tracker.active().clone();
            // Reported departures never overlap the present set here: no re-entry
            let reported: Vec<String> = reported.difference(&present).cloned().collect();

            let result = tracker.apply(&reported, &present);

            prop_assert_eq!(tracker.active(), &present);

            let expected_departed: Vec<String> = before.difference(&present).cloned().collect();
            let expected_arrived: Vec<String> = present.difference(&before).cloned().collect();
            prop_assert_eq!(&result.departed, &expected_departed);
            prop_assert_eq!(&result.arrived, &expected_arrived);

            let departed: BTreeSet<&String> = result.departed.iter().collect();
            prop_assert!(result.arrived.iter().all(|id| !departed.contains(id)));
        }
    }
}
