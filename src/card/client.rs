use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::llm::GenerationRequest;

const CHAT_ROUTE: &str = "api/chat";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid proxy endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },
    #[error("Request to proxy failed: {0}")]
    Transport(String),
    #[error("Proxy reply is not valid JSON: {0}")]
    Decode(String),
}

/// Whatever the proxy sent back. Error replies carry only `error`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyReply {
    #[serde(default)]
    pub svg_content: Option<String>,
    #[serde(default)]
    pub full_response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Talks to a running proxy's `POST /api/chat`.
#[derive(Debug, Clone)]
pub struct CardClient {
    client: Client,
    endpoint: Url,
}

impl CardClient {
    /// `base` is the proxy origin, e.g. `http://127.0.0.1:3000`.
    pub fn new(base: &str) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::Endpoint {
            endpoint: base.to_string(),
            reason,
        };

        let mut base_url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let endpoint = base_url
            .join(CHAT_ROUTE)
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts `{ prompt }` and decodes the body whatever the status code.
    #[instrument(skip(self))]
    pub async fn generate(&self, word: &str) -> Result<ProxyReply, ClientError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&GenerationRequest::word(word))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        debug!(status = response.status().as_u16(), "Proxy answered");

        response
            .json::<ProxyReply>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
