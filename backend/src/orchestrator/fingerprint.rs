//! Configuration fingerprint
//!
//! SHA-256 over a canonical JSON rendering of the configuration (object keys
//! sorted at every level). Two runs with the same fingerprint and the same
//! seeds are replays of each other; the fingerprint is logged at startup and
//! included in the run summary.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}

/// Hex-encoded SHA-256 of the canonical JSON form of `config`
pub fn config_fingerprint<T: Serialize>(config: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(&canonical(serde_json::to_value(config)?))?;
    Ok(format!("{:x}", Sha256::digest(json.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use std::collections::HashMap;

    #[test]
    fn test_fingerprint_stable_and_hex() {
        let config = SimulationConfig::default();
        let a = config_fingerprint(&config).unwrap();
        let b = config_fingerprint(&config.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_changes_with_config() {
        let base = SimulationConfig::default();
        let changed = SimulationConfig {
            num_agents: base.num_agents + 1,
            ..base.clone()
        };
        assert_ne!(
            config_fingerprint(&base).unwrap(),
            config_fingerprint(&changed).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_ignores_map_insertion_order() {
        let mut first = HashMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        let mut second = HashMap::new();
        second.insert("a", 1);
        second.insert("b", 2);
        assert_eq!(
            config_fingerprint(&first).unwrap(),
            config_fingerprint(&second).unwrap()
        );
    }
}
