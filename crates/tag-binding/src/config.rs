//! Environment-driven configuration.
//!
//! - `TAG_API_URL`: root URL of the tagging API
//! - `TAG_API_TOKEN`: bearer token for the tagging API
//! - `TAG_MUTATION_TIMEOUT_SECS`: deadline for a create/delete, including
//!   time spent waiting for the resource lock (unset or `0` disables it)

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::controller::ControllerConfig;

/// Environment variable for the tagging API URL.
pub const ENV_API_URL: &str = "TAG_API_URL";

/// Environment variable for the tagging API token.
pub const ENV_API_TOKEN: &str = "TAG_API_TOKEN";

/// Environment variable for the mutation deadline.
pub const ENV_MUTATION_TIMEOUT_SECS: &str = "TAG_MUTATION_TIMEOUT_SECS";

/// Configuration could not be read.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds something that doesn't parse.
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}

/// Settings for talking to the tagging API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root URL of the tagging API.
    pub api_url: Option<String>,
    /// Bearer token.
    pub api_token: Option<String>,
    /// Deadline applied to each mutation.
    pub mutation_timeout: Option<Duration>,
}

impl StoreConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if `TAG_MUTATION_TIMEOUT_SECS` is not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if the timeout variable is not an integer.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mutation_timeout = match non_empty(ENV_MUTATION_TIMEOUT_SECS) {
            Some(raw) => parse_timeout(ENV_MUTATION_TIMEOUT_SECS, &raw)?,
            None => None,
        };

        let config = Self {
            api_url: non_empty(ENV_API_URL),
            api_token: non_empty(ENV_API_TOKEN),
            mutation_timeout,
        };

        debug!(
            api_url = ?config.api_url,
            has_token = config.api_token.is_some(),
            mutation_timeout = ?config.mutation_timeout,
            "Loaded tag store configuration"
        );
        Ok(config)
    }

    /// Controller settings derived from this configuration.
    #[must_use]
    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            mutation_timeout: self.mutation_timeout,
        }
    }
}

/// Parse a seconds value; `0` means no deadline.
///
/// # Errors
/// Returns an error if `raw` is not a non-negative integer.
pub fn parse_timeout(name: &'static str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidTimeout {
        name,
        value: raw.to_string(),
    })?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
