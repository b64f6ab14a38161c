use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::FunnelError;

/// Default request parameter that carries eager-load relation names.
pub const DEFAULT_EAGER_KEY: &str = "with";

/// Environment variable overriding [`FunnelConfig::eager_key`].
pub const ENV_EAGER_KEY: &str = "FUNNEL_EAGER_KEY";

/// Process-wide filter configuration, read-only once the chains are built.
///
/// ```json
/// { "eager_key": "include" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FunnelConfig {
    /// Request parameter reserved for eager loading, e.g. `?with=comments,comments.replies`
    pub eager_key: String,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            eager_key: DEFAULT_EAGER_KEY.to_string(),
        }
    }
}

impl FunnelConfig {
    /// Create a configuration with a custom eager-load key
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Config`] when the key is empty.
    pub fn with_eager_key(eager_key: impl Into<String>) -> Result<Self, FunnelError> {
        let config = Self {
            eager_key: eager_key.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Config`] when the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FunnelError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No filter config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| FunnelError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| FunnelError::Config(format!("invalid config in {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Config`] when an override is invalid.
    pub fn from_env() -> Result<Self, FunnelError> {
        Self::default().with_env_overrides()
    }

    /// Apply `FUNNEL_EAGER_KEY` on top of this configuration
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Config`] when the override is empty.
    pub fn with_env_overrides(self) -> Result<Self, FunnelError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FunnelError> {
        if let Some(eager_key) = lookup(ENV_EAGER_KEY) {
            self.eager_key = eager_key;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), FunnelError> {
        if self.eager_key.is_empty() {
            return Err(FunnelError::Config("eager_key must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether a filter may not listen on this parameter
    #[must_use]
    pub fn is_reserved(&self, parameter: &str) -> bool {
        parameter == self.eager_key
    }
}
