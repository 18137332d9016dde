//! HTTP client for the forwarder endpoints.
//!
//! `ChatTransport` is the seam the session store depends on; `ForwarderClient`
//! is the reqwest implementation. No retries: one call, one request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::{AvailabilityQuery, ChatReply, ChatRequest, ErrorBody, SEND_FAILED};
use crate::models::Availability;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Failed to send message: server unreachable ({0})")]
    Transport(#[from] reqwest::Error),

    /// Non-success status; `detail` is the most specific text the server gave.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("Failed to send message: malformed response ({0})")]
    Malformed(String),
}

/// Performs one chat exchange.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatReply, ExchangeError>;
}

#[derive(Debug, Clone)]
pub struct ForwarderClient {
    client: Client,
    base_url: String,
}

impl ForwarderClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ExchangeError> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(
            url = %url,
            has_session = request.session_id.is_some(),
            "Sending chat exchange"
        );
        let response = self.client.post(&url).json(request).send().await?;
        read_json(response).await
    }

    pub async fn availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<Availability, ExchangeError> {
        let url = format!("{}/api/availability", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;
        read_json(response).await
    }

    pub async fn schedule_meeting(
        &self,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ExchangeError> {
        let url = format!("{}/api/schedule_meeting", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;
        read_json(response).await
    }

    pub async fn health(&self) -> Result<serde_json::Value, ExchangeError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl ChatTransport for ForwarderClient {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatReply, ExchangeError> {
        self.chat(request).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.describe().to_string())
            .unwrap_or_else(|_| SEND_FAILED.to_string());
        tracing::warn!(status = status.as_u16(), detail = %detail, "Forwarder rejected request");
        return Err(ExchangeError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_str(&body).map_err(|e| ExchangeError::Malformed(e.to_string()))
}
