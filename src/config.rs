use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Immutable per-stage configuration: an option map handed to the stage
/// factory at construction time. Every key a stage requires must be present
/// and well-typed then, or construction fails with [`ConfigError`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StageConfig {
    options: IndexMap<String, Value>,
}

impl StageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and embedders.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// The worker-pool size for the hosting runner. Required for every stage.
    pub fn max_workers(&self) -> Result<usize, ConfigError> {
        let n = self.require_u64("max_workers")?;
        if n == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_workers".to_string(),
                reason: "must be a positive integer".to_string(),
            });
        }
        Ok(n as usize)
    }

    pub fn require_u64(&self, key: &str) -> Result<u64, ConfigError> {
        let value = self
            .options
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        value.as_u64().ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a non-negative integer, got {value}"),
        })
    }

    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        let value = self
            .options
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        value.as_str().ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a string, got {value}"),
        })
    }

    /// Optional integer key falling back to `default` when absent.
    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.options.get(key) {
            None => Ok(default),
            Some(_) => self.require_u64(key),
        }
    }

    /// Optional boolean key falling back to `default` when absent.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.options.get(key) {
            None => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("expected a boolean, got {value}"),
            }),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for StageConfig {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            options: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Application settings for the demo binary: which stage to host and how the
/// queues around it are sized. Loaded from `framegate.toml` plus
/// `FRAMEGATE_`-prefixed environment overrides.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub stage: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub stage_config: StageConfig,
}

fn default_queue_capacity() -> usize {
    64
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("framegate").required(false))
            .add_source(config::Environment::with_prefix("FRAMEGATE"))
            .build()?
            .try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stage: "key_frame_trigger".to_string(),
            queue_capacity: default_queue_capacity(),
            stage_config: StageConfig::new()
                .with("max_workers", 1)
                .with("n_total_px", 1000)
                .with("n_left_px", 200)
                .with("n_right_px", 200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_workers_is_required() {
        let config = StageConfig::new();
        assert!(matches!(
            config.max_workers(),
            Err(ConfigError::MissingKey(key)) if key == "max_workers"
        ));
    }

    #[test]
    fn max_workers_must_be_positive() {
        let config = StageConfig::new().with("max_workers", 0);
        assert!(matches!(
            config.max_workers(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "max_workers"
        ));
    }

    #[test]
    fn wrong_type_is_invalid_not_missing() {
        let config = StageConfig::new().with("n_total_px", "lots");
        assert!(matches!(
            config.require_u64("n_total_px"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn optional_keys_fall_back() {
        let config = StageConfig::new();
        assert_eq!(config.u64_or("hold_frames", 7).unwrap(), 7);
        assert!(!config.bool_or("training_mode", false).unwrap());
    }
}
