//! config
//!
//! Engine policy configuration.
//!
//! # Overview
//!
//! `EngineConfig` collects the global knobs that change binding and
//! resolution behavior:
//!
//! - **null input**: whether a keyed token with the literal value `null`
//!   binds an explicit-null sentinel instead of the parsed string
//! - **pick first**: whether ambiguous parses collapse to their first
//!   candidate instead of prompting interactive callers
//! - **root cap**: how many same-named roots may register
//! - **decision window**: how long an ambiguity prompt stays answerable
//! - **sweep interval**: how often the request table purges expired entries
//! - **choice prefix**: the first word of the out-of-band fulfillment line
//!
//! Persistence is the host's concern; [`EngineConfig::from_toml_str`] is
//! provided for hosts that keep the knobs in a TOML file.
//!
//! # Example
//!
//! ```
//! use behest::config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     pick_first_on_ambiguity = true
//!     decision_window_ms = 5000
//!     "#,
//! )
//! .unwrap();
//! assert!(config.pick_first_on_ambiguity);
//! assert_eq!(config.decision_window().as_secs(), 5);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Global engine policy.
///
/// All fields have serde defaults, so a partial TOML document (or an empty
/// one) is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Honor the explicit-null sentinel for keyed `name=null` tokens.
    pub allow_null_input: bool,

    /// Collapse ambiguous parses to the first candidate for every caller,
    /// interactive or not.
    pub pick_first_on_ambiguity: bool,

    /// Maximum number of roots that may share one top-level name.
    pub max_roots_per_name: usize,

    /// How long an ambiguity prompt remains answerable, in milliseconds.
    pub decision_window_ms: u64,

    /// Minimum delay between expired-request sweeps, in milliseconds.
    pub sweep_interval_ms: u64,

    /// First word of the out-of-band fulfillment line
    /// (`<prefix> <token> <choice>`).
    pub choice_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_null_input: false,
            pick_first_on_ambiguity: false,
            max_roots_per_name: 8,
            decision_window_ms: 15_000,
            sweep_interval_ms: 30_000,
            choice_prefix: "pick".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document into a config, applying defaults for missing
    /// fields and validating the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` for malformed TOML and
    /// `ConfigError::InvalidValue` for out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_roots_per_name == 0 {
            return Err(ConfigError::InvalidValue(
                "max_roots_per_name must be at least 1".to_string(),
            ));
        }
        if self.decision_window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "decision_window_ms must be positive".to_string(),
            ));
        }
        if self.choice_prefix.is_empty() || self.choice_prefix.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(
                "choice_prefix must be a single non-empty word".to_string(),
            ));
        }
        Ok(())
    }

    /// The decision window as a `Duration`.
    pub fn decision_window(&self) -> Duration {
        Duration::from_millis(self.decision_window_ms)
    }

    /// The sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
