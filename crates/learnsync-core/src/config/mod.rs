//! Runtime configuration for the sync engine.
//!
//! Values come from the environment (`LEARNSYNC_*`) so the CLI and embedding
//! hosts share one parser. Timing defaults follow the engine's contract:
//! a pass every 30 seconds, a health probe every 10 seconds with a 5 second
//! timeout, and retry backoff of 1s/5s/15s.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::MAX_RETRIES;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_HEALTH_PATH: &str = "/api/health";
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(15),
];

/// Settings shared by the engine, the HTTP client, and the connectivity monitor.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Base URL of the learning platform API, without trailing slash
    pub api_base_url: String,
    /// Optional bearer token sent with every request
    pub auth_token: Option<String>,
    /// Path probed with `HEAD` to confirm connectivity
    pub health_path: String,
    pub sync_interval: Duration,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// Per-request timeout for record upserts
    pub request_timeout: Duration,
    /// Backoff table indexed by retry count; the last entry repeats
    pub retry_delays: Vec<Duration>,
    pub max_retries: u32,
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("api_base_url", &self.api_base_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("health_path", &self.health_path)
            .field("sync_interval", &self.sync_interval)
            .field("probe_interval", &self.probe_interval)
            .field("probe_timeout", &self.probe_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("retry_delays", &self.retry_delays)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl SyncSettings {
    /// Settings with default timings for the given API base URL.
    pub fn new(api_base_url: impl Into<String>) -> Result<Self> {
        let api_base_url = normalize_base_url(api_base_url.into(), "api_base_url")?;
        Ok(Self {
            api_base_url,
            auth_token: None,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
            max_retries: MAX_RETRIES,
        })
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = normalize_text_option(Some(token.into()));
        self
    }

    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = optional_trimmed(&lookup, "LEARNSYNC_API_BASE_URL")
            .ok_or_else(|| Error::Config("LEARNSYNC_API_BASE_URL is required".to_string()))?;
        let mut settings = Self::new(api_base_url)
            .map_err(|_| Error::Config("LEARNSYNC_API_BASE_URL must start with http:// or https://".to_string()))?;

        settings.auth_token = optional_trimmed(&lookup, "LEARNSYNC_AUTH_TOKEN");

        if let Some(path) = optional_trimmed(&lookup, "LEARNSYNC_HEALTH_PATH") {
            settings.health_path = if path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            };
        }

        if let Some(secs) = parse_secs(&lookup, "LEARNSYNC_SYNC_INTERVAL_SECS", 1)? {
            settings.sync_interval = secs;
        }
        if let Some(secs) = parse_secs(&lookup, "LEARNSYNC_PROBE_INTERVAL_SECS", 1)? {
            settings.probe_interval = secs;
        }
        if let Some(secs) = parse_secs(&lookup, "LEARNSYNC_REQUEST_TIMEOUT_SECS", 1)? {
            settings.request_timeout = secs;
        }

        Ok(settings)
    }

    /// Backoff before the retry that follows `retry_count` earlier retries.
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        let index = usize::try_from(retry_count).unwrap_or(usize::MAX);
        self.retry_delays
            .get(index)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or(DEFAULT_RETRY_DELAYS[0])
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> String {
        format!("{}{}", self.api_base_url, self.health_path)
    }
}

fn normalize_base_url(raw: String, field: &str) -> Result<String> {
    let value = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config(format!("{field} must not be empty")))?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "{field} must include http:// or https://"
        )))
    }
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

fn parse_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    minimum: u64,
) -> Result<Option<Duration>> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(None);
    };
    let secs = raw
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{name} must be an integer >= {minimum}")))?;
    if secs < minimum {
        return Err(Error::Config(format!("{name} must be >= {minimum}")));
    }
    Ok(Some(Duration::from_secs(secs)))
}
