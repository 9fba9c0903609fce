//! Dialogue backend client
//!
//! The backend is a small HTTP + JSON service that drives the interview.
//! Replies carry their text under `response`, with `message` and `text`
//! accepted as fallbacks.

pub mod status;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::Role;
use crate::{Error, Result};

/// Base URL used when none is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";

/// Body of a conversational turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRequest {
    /// What the candidate said or typed
    pub message: String,
    /// Session the turn belongs to
    pub session_id: String,
    /// Selected role, if any
    pub role: Option<Role>,
}

/// Body of an interview start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartRequest {
    /// Session being started
    pub session_id: String,
    /// Role to interview for
    pub role: Role,
}

/// Body of a feedback request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackRequest {
    /// Session to assess
    pub session_id: String,
}

/// Backend health probe result
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthReport {
    /// Overall status reported by the backend
    #[serde(default)]
    pub status: String,
    /// Human-readable detail
    #[serde(default)]
    pub message: String,
    /// Whether the backend has its model API key
    #[serde(default)]
    pub api_key_configured: bool,
}

/// Remote dialogue service
#[async_trait]
pub trait DialogueBackend: Send + Sync {
    /// Send one turn and return the raw JSON reply
    async fn send_message(&self, request: &MessageRequest) -> Result<Value>;

    /// Start an interview for a role
    async fn start_session(&self, request: &StartRequest) -> Result<Value>;

    /// Ask for an assessment of the session so far
    async fn request_feedback(&self, request: &FeedbackRequest) -> Result<Value>;

    /// Probe backend liveness
    async fn health(&self) -> Result<HealthReport>;

    /// URL shown in connection failure messages
    fn endpoint(&self) -> &str;
}

/// Text to display for a reply payload
///
/// Uses the first string among `response`, `message` and `text`, falling
/// back to the serialized payload.
#[must_use]
pub fn reply_text(payload: &Value) -> String {
    ["response", "message", "text"]
        .iter()
        .find_map(|key| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map_or_else(|| payload.to_string(), str::to_string)
}

/// Welcome text for a start reply, with a generic greeting as fallback
#[must_use]
pub fn opening_text(payload: &Value, role: Role) -> String {
    payload
        .get("response")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(
            || format!("Welcome! Let's start your {role} interview."),
            str::to_string,
        )
}

/// `reqwest` implementation of [`DialogueBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for `base_url` (e.g. `http://localhost:5000/api`)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// Health endpoint, served beside the API root
    #[must_use]
    pub fn health_url(&self) -> String {
        let origin = self
            .base_url
            .strip_suffix("/api")
            .unwrap_or(&self.base_url);
        format!("{origin}/health")
    }

    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                body
            };
            tracing::error!(url = %url, status = status.as_u16(), "backend returned error");
            return Err(Error::Server {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    fn transport_error(&self, e: &reqwest::Error) -> Error {
        tracing::error!(url = %self.base_url, error = %e, "backend unreachable");
        Error::Network {
            url: self.base_url.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl DialogueBackend for HttpBackend {
    async fn send_message(&self, request: &MessageRequest) -> Result<Value> {
        tracing::debug!(session = %request.session_id, "sending turn");
        self.post(&self.base_url, request).await
    }

    async fn start_session(&self, request: &StartRequest) -> Result<Value> {
        let url = format!("{}/start", self.base_url);
        tracing::debug!(session = %request.session_id, role = %request.role, "starting interview");
        self.post(&url, request).await
    }

    async fn request_feedback(&self, request: &FeedbackRequest) -> Result<Value> {
        let url = format!("{}/feedback", self.base_url);
        tracing::debug!(session = %request.session_id, "requesting feedback");
        self.post(&url, request).await
    }

    async fn health(&self) -> Result<HealthReport> {
        let url = self.health_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Server {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}
