use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::ClauseCombination;

/// Prefix for environment overrides, e.g. `RULEWRIGHT__BASE_URL`.
pub const ENV_PREFIX: &str = "RULEWRIGHT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for an editing session and the store it talks to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub clause_combination: ClauseCombination,
    /// Upper bound for the compactness sigma parameter.
    pub max_sigma: u32,
    pub event_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            request_timeout_secs: 30,
            clause_combination: ClauseCombination::Union,
            max_sigma: 8,
            event_capacity: 64,
        }
    }
}

impl EditorConfig {
    /// Load from an optional TOML/JSON file, then apply `RULEWRIGHT__*`
    /// environment overrides. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be read or a value has the
    /// wrong type, or if the result fails [`EditorConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: EditorConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Rejects an empty base URL, a zero timeout and a zero event capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
