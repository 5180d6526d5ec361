use std::time::Duration;

use crate::error::{Result, TrackerError};
use crate::types::Step;

pub const ENV_ENDPOINT: &str = "FLEET_TRACKER_ENDPOINT";
pub const ENV_POLL_INTERVAL: &str = "FLEET_TRACKER_POLL_INTERVAL_SECS";
pub const ENV_LOG_POLL_INTERVAL: &str = "FLEET_TRACKER_LOG_POLL_INTERVAL_SECS";
pub const ENV_REQUEST_TIMEOUT: &str = "FLEET_TRACKER_REQUEST_TIMEOUT_SECS";

/// Configuration for the client and its pollers.
///
/// Use [`TrackerConfig::builder()`] for ergonomic construction,
/// [`TrackerConfig::from_env()`] to read `FLEET_TRACKER_*` variables, or
/// [`TrackerConfig::default()`] for a local backend.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the lifecycle backend, including any `/api` prefix.
    pub endpoint: String,

    /// Interval between progress fetches for discovery and batch pollers.
    pub poll_interval: Duration,

    /// Interval between step-log fetches for a single flow.
    pub log_poll_interval: Duration,

    /// Timeout applied to every ordinary request.
    pub request_timeout: Duration,

    /// Timeout for multipart device uploads.
    pub upload_timeout: Duration,

    /// Ordered upgrade steps counted by the reconciler and timeline.
    pub tracked_steps: Vec<Step>,

    /// Maximum number of customer names requested per search.
    pub search_limit: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api".to_string(),
            poll_interval: Duration::from_secs(3),
            log_poll_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(120),
            tracked_steps: Step::upgrade_pipeline(),
            search_limit: 10,
        }
    }
}

impl TrackerConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Build a config from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_POLL_INTERVAL)? {
            config.poll_interval = secs;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_LOG_POLL_INTERVAL)? {
            config.log_poll_interval = secs;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_REQUEST_TIMEOUT)? {
            config.request_timeout = secs;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make polling or requests meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(TrackerError::Config("endpoint must not be empty".into()));
        }
        if self.poll_interval.is_zero() || self.log_poll_interval.is_zero() {
            return Err(TrackerError::Config("poll intervals must be non-zero".into()));
        }
        if self.request_timeout.is_zero() || self.upload_timeout.is_zero() {
            return Err(TrackerError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| TrackerError::Config(format!("{} must be whole seconds, got {:?}", key, raw))),
    }
}

/// Builder for [`TrackerConfig`].
#[derive(Default)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    /// Set the backend base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the interval between progress fetches.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the interval between step-log fetches.
    pub fn with_log_poll_interval(mut self, interval: Duration) -> Self {
        self.config.log_poll_interval = interval;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the timeout for device uploads.
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.config.upload_timeout = timeout;
        self
    }

    /// Replace the tracked step list.
    pub fn with_tracked_steps(mut self, steps: Vec<Step>) -> Self {
        self.config.tracked_steps = steps;
        self
    }

    pub fn with_search_limit(mut self, limit: u32) -> Self {
        self.config.search_limit = limit;
        self
    }

    /// Build the final [`TrackerConfig`], validating it.
    pub fn build(self) -> Result<TrackerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
