//! Client for the scheduling backend the forwarders sit in front of.
//!
//! One call per method, no retries. Any non-success status is an error that
//! carries the backend's body text.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tempo_core::api::{AvailabilityQuery, BackendChatRequest, BackendChatResponse};
use tempo_core::config::BackendConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid backend response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ForwardError> {
        Self::with_base_url(config.url.clone(), config.timeout())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self, ForwardError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn chat(
        &self,
        request: &BackendChatRequest,
    ) -> Result<BackendChatResponse, ForwardError> {
        let url = format!("{}/zeta/chat", self.base_url);
        tracing::debug!(
            url = %url,
            has_session = request.session_id.is_some(),
            "Forwarding chat"
        );
        let response = self.client.post(&url).json(request).send().await?;
        read_json(response).await
    }

    pub async fn availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<serde_json::Value, ForwardError> {
        let url = format!("{}/availability", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;
        read_json(response).await
    }

    pub async fn schedule_meeting(
        &self,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ForwardError> {
        let url = format!("{}/schedule_meeting", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;
        read_json(response).await
    }

    pub async fn health(&self) -> Result<serde_json::Value, ForwardError> {
        let url = format!("{}/zeta/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ForwardError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ForwardError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| ForwardError::Decode(e.to_string()))
}
