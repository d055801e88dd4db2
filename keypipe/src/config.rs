//! Pipeline configuration.

use crate::bridge::codec::Framing;
use crate::bridge::protocol::MESSAGE_SIZE;
use crate::translator::MIN_CAPACITY;

pub const FRAMING_ENV: &str = "KEYPIPE_FRAMING";
pub const CAPACITY_ENV: &str = "KEYPIPE_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Wire framing for all three channels.
    pub framing: Framing,
    /// Edit buffer capacity, commit sentinel included.
    pub capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            capacity: MESSAGE_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `KEYPIPE_FRAMING` and `KEYPIPE_CAPACITY`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(FRAMING_ENV) {
            match raw.parse() {
                Ok(framing) => config.framing = framing,
                Err(e) => tracing::warn!(env = FRAMING_ENV, error = %e, "Ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(CAPACITY_ENV) {
            match raw.parse::<usize>() {
                Ok(capacity) => config = config.with_capacity(capacity),
                Err(e) => {
                    tracing::warn!(
                        env = CAPACITY_ENV,
                        error = %e,
                        value = %raw,
                        "Ignoring invalid value"
                    )
                }
            }
        }

        config
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Clamped to `MIN_CAPACITY..=MESSAGE_SIZE` so a commit always fits one record.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        let clamped = capacity.clamp(MIN_CAPACITY, MESSAGE_SIZE);
        if clamped != capacity {
            tracing::warn!(
                requested = capacity,
                using = clamped,
                "Edit buffer capacity out of range"
            );
        }
        self.capacity = clamped;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.framing, Framing::LengthDelimited);
        assert_eq!(config.capacity, MESSAGE_SIZE);
    }

    #[test]
    fn reads_env_values() {
        let vars = [(FRAMING_ENV, "fixed"), (CAPACITY_ENV, "16")];
        let config = PipelineConfig::from_lookup(lookup(&vars));
        assert_eq!(config.framing, Framing::FixedRecord);
        assert_eq!(config.capacity, 16);
    }

    #[test]
    fn bad_env_values_fall_back() {
        let vars = [(FRAMING_ENV, "carrier-pigeon"), (CAPACITY_ENV, "lots")];
        let config = PipelineConfig::from_lookup(lookup(&vars));
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(
            PipelineConfig::new().with_capacity(1).capacity,
            MIN_CAPACITY
        );
        assert_eq!(
            PipelineConfig::new().with_capacity(4096).capacity,
            MESSAGE_SIZE
        );
    }
}
