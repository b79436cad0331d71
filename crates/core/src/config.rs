//! Instrumentor configuration
//!
//! Configuration can come from a TOML or JSON document, a file (format
//! chosen by extension), or environment variables. [`InstrumentorConfig::load`]
//! combines them: a `.env` file is loaded into the environment first, then
//! the optional config file, then environment variables override
//! individual fields.
//!
//! ## Environment Variables
//! - `INSTRUMENTOR_EXCEPTION_POLICY`: `mark_all` or `mark_expected_only`
//! - `INSTRUMENTOR_EXTENDED`: maintain `.total`/`.success` meters (true/false)
//! - `INSTRUMENTOR_HEALTH_CHECKS`: attach the health-check registry
//!   (true/false)
//! - `INSTRUMENTOR_DEFAULT_ERROR_THRESHOLD`: ratio in `0.0..` applied when a
//!   unit is wrapped without a threshold
//!
//! ## Example (TOML)
//! ```toml
//! exception_policy = "mark_expected_only"
//! extended = true
//! default_error_threshold = 0.05
//! ```

use std::path::Path;

use instrumentor_common::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};

use crate::filters::ExceptionPolicy;

pub const ENV_EXCEPTION_POLICY: &str = "INSTRUMENTOR_EXCEPTION_POLICY";
pub const ENV_EXTENDED: &str = "INSTRUMENTOR_EXTENDED";
pub const ENV_HEALTH_CHECKS: &str = "INSTRUMENTOR_HEALTH_CHECKS";
pub const ENV_DEFAULT_ERROR_THRESHOLD: &str = "INSTRUMENTOR_DEFAULT_ERROR_THRESHOLD";

/// Settings for building an [`Instrumentor`](crate::Instrumentor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentorConfig {
    /// Which failures count toward the error rate
    pub exception_policy: ExceptionPolicy,
    /// Maintain `.total` and `.success` meters
    pub extended: bool,
    /// Register error-rate health checks when a registry is supplied
    pub health_checks: bool,
    /// Threshold used when a unit is wrapped without one
    pub default_error_threshold: Option<f64>,
}

impl Default for InstrumentorConfig {
    fn default() -> Self {
        Self {
            exception_policy: ExceptionPolicy::MarkAll,
            extended: false,
            health_checks: true,
            default_error_threshold: None,
        }
    }
}

impl InstrumentorConfig {
    /// Parse a TOML document; missing fields take their defaults
    ///
    /// # Errors
    /// Returns `CommonError::Serialization` for malformed TOML.
    pub fn from_toml_str(contents: &str) -> CommonResult<Self> {
        toml::from_str(contents)
            .map_err(|e| CommonError::serialization_format("toml", format!("Invalid TOML: {}", e)))
    }

    /// Parse a JSON document; missing fields take their defaults
    ///
    /// # Errors
    /// Returns `CommonError::Serialization` for malformed JSON.
    pub fn from_json_str(contents: &str) -> CommonResult<Self> {
        serde_json::from_str(contents)
            .map_err(|e| CommonError::serialization_format("json", format!("Invalid JSON: {}", e)))
    }

    /// Load from a `.toml` or `.json` file
    ///
    /// # Errors
    /// Returns `CommonError::Config` if the file is missing, unreadable or
    /// has an unsupported extension, and `CommonError::Serialization` if it
    /// does not parse.
    pub fn load_from_file(path: &Path) -> CommonResult<Self> {
        if !path.exists() {
            return Err(CommonError::config(format!("Config file not found: {}", path.display())));
        }

        tracing::info!(path = %path.display(), "Loading instrumentor configuration from file");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| CommonError::config(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|e| e.to_str()).unwrap_or("json") {
            "toml" => Self::from_toml_str(&contents),
            "json" => Self::from_json_str(&contents),
            other => Err(CommonError::config(format!("Unsupported config format: {}", other))),
        }
    }

    /// Defaults overridden by whichever `INSTRUMENTOR_*` variables are set
    ///
    /// # Errors
    /// Returns `CommonError::Config` when a set variable does not parse.
    pub fn load_from_env() -> CommonResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load `.env`, then the optional file, then apply environment overrides
    ///
    /// # Errors
    /// Propagates file and environment errors; validation failures are
    /// returned as `CommonError::Validation`.
    pub fn load(path: Option<&Path>) -> CommonResult<Self> {
        match dotenvy::dotenv() {
            Ok(env_path) => {
                tracing::debug!(path = %env_path.display(), "Loaded environment from .env file");
            }
            Err(e) => tracing::debug!(error = %e, "No .env file loaded"),
        }

        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;

        tracing::info!(
            policy = %config.exception_policy,
            extended = config.extended,
            health_checks = config.health_checks,
            "Instrumentor configuration loaded"
        );
        Ok(config)
    }

    fn apply_env(&mut self) -> CommonResult<()> {
        if let Some(policy) = env_var(ENV_EXCEPTION_POLICY) {
            self.exception_policy = policy.parse::<ExceptionPolicy>().map_err(|e| {
                CommonError::config_field(ENV_EXCEPTION_POLICY, e.to_string())
            })?;
        }
        self.extended = env_bool(ENV_EXTENDED, self.extended);
        self.health_checks = env_bool(ENV_HEALTH_CHECKS, self.health_checks);
        if let Some(threshold) = env_var(ENV_DEFAULT_ERROR_THRESHOLD) {
            let threshold = threshold.trim().parse::<f64>().map_err(|e| {
                CommonError::config_field(
                    ENV_DEFAULT_ERROR_THRESHOLD,
                    format!("Invalid threshold: {}", e),
                )
            })?;
            self.default_error_threshold = Some(threshold);
        }
        Ok(())
    }

    /// Reject negative or non-finite default thresholds
    ///
    /// # Errors
    /// Returns `CommonError::Validation` naming the offending field.
    pub fn validate(&self) -> CommonResult<()> {
        if let Some(threshold) = self.default_error_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(CommonError::validation_with_value(
                    "default_error_threshold",
                    "must be a finite, non-negative ratio",
                    threshold.to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Non-empty environment variable
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
/// (case-insensitive). Returns `default` when the variable is not set.
fn env_bool(key: &str, default: bool) -> bool {
    env_var(key)
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
