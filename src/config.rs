//! Solver configuration: defaults, an optional TOML file, and `PUZZLE_*` env vars.
//!
//! Layers merge in that order, so the environment wins over the file and the
//! file wins over built-in defaults. Nested keys use `__` in env var names,
//! e.g. `PUZZLE_SOURCE__BASE_URL` or `PUZZLE_FETCH__MAX_CONCURRENCY`.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::assembly::AssemblyConfig;
use crate::discovery::DiscoveryConfig;
use crate::fetch::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, RetryPolicy, SourceConfig,
};
use crate::transport::ConnectionConfig;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "PUZZLE_";

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read or did not match the schema.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// Dotted field path, e.g. `fetch.max_concurrency`.
        field: &'static str,
        /// What was wrong.
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Admission and retry settings for the fetcher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Size of the admission gate (1..=1000).
    pub max_concurrency: usize,
    /// Attempts per logical fetch, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff growth factor.
    pub backoff_multiplier: f32,
    /// Upper bound of random jitter added to each delay; 0 disables jitter.
    pub max_jitter_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter_ms: 0,
        }
    }
}

impl FetchConfig {
    /// Builds the retry policy described by these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.backoff_multiplier,
        );
        if self.max_jitter_ms > 0 {
            policy.with_jitter(Duration::from_millis(self.max_jitter_ms))
        } else {
            policy
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging defaults, applied when neither `RUST_LOG` nor a CLI flag decides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete solver configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Fragment endpoint.
    pub source: SourceConfig,
    /// Admission gate and retries.
    pub fetch: FetchConfig,
    /// Discovery bounds.
    pub discovery: DiscoveryConfig,
    /// Text assembly.
    pub assembly: AssemblyConfig,
    /// Shared HTTP session.
    pub connection: ConnectionConfig,
    /// Log defaults.
    pub logging: LoggingConfig,
}

impl SolverConfig {
    /// Loads defaults, then `path` if given and present, then `PUZZLE_*` env vars.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a layer cannot be parsed and
    /// [`ConfigError::Invalid`] if the merged values fail validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub(crate) fn load_with_env(path: Option<&Path>, env: Env) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment.merge(env).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("source.base_url", "must not be empty"));
        }
        if !self.source.endpoint.starts_with('/') {
            return Err(ConfigError::invalid(
                "source.endpoint",
                format!("{:?} must start with '/'", self.source.endpoint),
            ));
        }
        if !(1..=1000).contains(&self.fetch.max_concurrency) {
            return Err(ConfigError::invalid(
                "fetch.max_concurrency",
                format!("{}. Expected range: 1..=1000", self.fetch.max_concurrency),
            ));
        }
        validate_at_least_one("fetch.max_attempts", u64::from(self.fetch.max_attempts))?;
        if self.fetch.base_delay_ms > self.fetch.max_delay_ms {
            return Err(ConfigError::invalid(
                "fetch.base_delay_ms",
                format!(
                    "{} exceeds fetch.max_delay_ms ({})",
                    self.fetch.base_delay_ms, self.fetch.max_delay_ms
                ),
            ));
        }
        if !self.fetch.backoff_multiplier.is_finite() || self.fetch.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "fetch.backoff_multiplier",
                format!("{}. Expected a finite value >= 1.0", self.fetch.backoff_multiplier),
            ));
        }
        validate_at_least_one(
            "discovery.initial_batch_size",
            u64::from(self.discovery.initial_batch_size),
        )?;
        validate_at_least_one(
            "discovery.max_gap_fill_passes",
            u64::from(self.discovery.max_gap_fill_passes),
        )?;
        validate_at_least_one(
            "discovery.max_requests_per_gap",
            u64::from(self.discovery.max_requests_per_gap),
        )?;
        validate_at_least_one(
            "discovery.max_missing_positions",
            self.discovery.max_missing_positions,
        )?;
        validate_at_least_one("assembly.chunk_size", self.assembly.chunk_size as u64)?;
        validate_timeout_secs(
            "connection.request_timeout_secs",
            self.connection.request_timeout_secs,
        )?;
        validate_timeout_secs(
            "connection.connect_timeout_secs",
            self.connection.connect_timeout_secs,
        )?;
        validate_timeout_secs(
            "connection.read_timeout_secs",
            self.connection.read_timeout_secs,
        )?;
        Ok(())
    }
}

fn validate_at_least_one(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "0. Expected a value >= 1"));
    }
    Ok(())
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{value}. Expected range: 1..=3600"),
        ));
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/puzzle-solver/config.toml`
/// 2. `$HOME/.config/puzzle-solver/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("puzzle-solver")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("puzzle-solver")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
