use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::llm::Config;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Non-streaming chat-completion request body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LLMRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Request timeout - the API took too long to respond")]
    Timeout,
    #[error("Connection error - unable to reach the API")]
    Connect,
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse API response as JSON: {0}")]
    Decode(String),
    #[error("Unexpected API response structure")]
    ResponseStructure,
    #[error("Unexpected message structure in API response")]
    MessageStructure,
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_connect() {
            UpstreamError::Connect
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Network(e.to_string())
        }
    }
}

/// The one call the proxy makes. Returns the raw reply JSON; shape checks
/// happen in the caller so every backend is judged the same way.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, config: &Config, request: &LLMRequest) -> Result<Value, UpstreamError>;
}

/// `reqwest`-backed chat-completion client.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: Client,
}

impl HttpChatClient {
    pub fn new() -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, config: &Config, request: &LLMRequest) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .post(&config.api_url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("Content-Type", "application/json")
            .timeout(config.request_timeout())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = status.as_u16(), "Upstream returned an error status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        debug!("Upstream reply received");

        Ok(reply)
    }
}
