//! Remote API client for record upserts and health probes.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::SyncSettings;
use crate::models::{ErrorCategory, RecordKind, SyncRecord};
use crate::util::compact_text;

/// How a record is sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// Regular upsert from a sync pass or retry
    Upsert,
    /// Replace the server's version (conflict resolved in favour of local)
    Overwrite,
}

/// Successful outcomes of a push.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// 2xx: the server stored the record
    Accepted,
    /// 409: the server holds a competing version, returned as JSON
    Conflict(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::classify(matches!(self, Self::Network(_)), &self.to_string())
    }
}

/// Per-kind upsert endpoint of the learning platform API.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn push(&self, record: &SyncRecord, mode: PushMode) -> Result<PushOutcome, RemoteError>;
}

/// Lightweight reachability check.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// `true` when the server answered with a 2xx status.
    async fn probe(&self) -> bool;
}

/// `reqwest`-backed implementation of [`RemoteApi`] and [`HealthProbe`].
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    health_url: String,
    auth_token: Option<String>,
    probe_timeout: std::time::Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .field("health_url", &self.health_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(settings: &SyncSettings) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            base_url: settings.api_base_url.clone(),
            health_url: settings.health_url(),
            auth_token: settings.auth_token.clone(),
            probe_timeout: settings.probe_timeout,
            client,
        })
    }

    fn collection_url(&self, kind: RecordKind) -> String {
        format!("{}/api/{}", self.base_url, kind.endpoint())
    }

    fn record_url(&self, kind: RecordKind, id: &str) -> String {
        format!("{}/{id}", self.collection_url(kind))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn push(&self, record: &SyncRecord, mode: PushMode) -> Result<PushOutcome, RemoteError> {
        let body = record
            .payload()
            .map_err(|error| RemoteError::Decode(format!("cannot encode record: {error}")))?;

        let request = match mode {
            PushMode::Upsert => self.client.post(self.collection_url(record.kind())),
            PushMode::Overwrite => self.client.put(self.record_url(record.kind(), record.id())),
        };

        let response = self
            .authorize(request)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|error| RemoteError::Network(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(PushOutcome::Accepted);
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return serde_json::from_str(&text)
                .map(PushOutcome::Conflict)
                .map_err(|error| {
                    RemoteError::Decode(format!("HTTP 409 conflict body is not JSON: {error}"))
                });
        }

        Err(RemoteError::Status {
            status: status.as_u16(),
            body: compact_text(&text),
        })
    }
}

#[async_trait]
impl HealthProbe for HttpRemote {
    async fn probe(&self) -> bool {
        let request = self
            .authorize(self.client.head(&self.health_url))
            .timeout(self.probe_timeout);
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Health probe failed: {error}");
                false
            }
        }
    }
}
