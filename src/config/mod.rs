//! Engine configuration.
//!
//! Every knob has a default, so an empty document is a valid configuration.
//! Values can come from code (`with_*` builders), a JSON file, or environment
//! variables layered on top:
//!
//! ```rust,no_run
//! use agentloop::config::EngineConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_file("agentloop.json")
//!     .await?
//!     .with_env_overrides("AGENTLOOP_")?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod env;

pub use crate::session::SessionConfig;
pub use engine::{
    CompactionConfig, EngineConfig, LoopConfig, LoopGuardConfig, RetryConfig, SanitizerConfig,
    TeamConfig,
};
pub use env::{ENV_KEYS, EnvOverrides};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    ValidationErrors(ValidationErrors),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed: ")?;
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", msgs.join("; "))
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("loop_guard.threshold", "must be at least 1");
        assert!(err.to_string().contains("loop_guard.threshold"));

        let err = ConfigError::ValidationErrors(ValidationErrors(vec![
            ConfigError::invalid("a", "bad"),
            ConfigError::invalid("b", "worse"),
        ]));
        assert_eq!(
            err.to_string(),
            "Validation failed: Invalid value for a: bad; Invalid value for b: worse"
        );
    }
}
