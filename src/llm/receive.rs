use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::send::UpstreamError;

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;

const SVG_PATTERN: &str = r"(?s)<svg.*?</svg>";

/// Upstream credentials and knobs, read fresh for every proxied request.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl Config {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: None,
            max_tokens: None,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    /// Reads the process environment.
    ///
    /// # Required Environment Variables
    /// - `API_URL`: Chat-completion endpoint
    /// - `API_KEY`: Bearer token for the endpoint
    ///
    /// `MODEL`, `MAX_TOKENS` and `REQUEST_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let api_url = present("API_URL");
        let api_key = present("API_KEY");

        let (api_url, api_key) = match (api_url, api_key) {
            (Some(url), Some(key)) => (url, key),
            (url, key) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push("API_URL");
                }
                if key.is_none() {
                    missing.push("API_KEY");
                }
                return Err(ConfigError::Missing(missing));
            }
        };

        let max_tokens = match present("MAX_TOKENS") {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| ConfigError::Invalid {
                var: "MAX_TOKENS",
                value: raw,
            })?),
            None => None,
        };

        let request_timeout_seconds = match present("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECONDS,
        };

        Ok(Self {
            api_url,
            api_key,
            model: present("MODEL"),
            max_tokens,
            request_timeout_seconds,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// Where the proxy gets its credentials from on each request.
pub trait CredentialSource: Send + Sync {
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Reads `API_URL`/`API_KEY` from the environment every time.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::from_env()
    }
}

impl<F> CredentialSource for F
where
    F: Fn() -> Result<Config, ConfigError> + Send + Sync,
{
    fn load(&self) -> Result<Config, ConfigError> {
        self()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request body is not valid JSON: {0}")]
    Malformed(String),
    #[error("Missing prompt in request body")]
    MissingPrompt,
}

/// Body of `POST /api/chat`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardPrompt {
    /// The fixed 汉语新解 template applied to a word.
    Word(String),
    /// Caller-supplied system instruction applied to `word`.
    Custom { system: String, word: String },
}

impl GenerationRequest {
    pub fn word(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            text: None,
        }
    }

    pub fn from_json(body: &[u8]) -> Result<Self, RequestError> {
        serde_json::from_slice(body).map_err(|e| RequestError::Malformed(e.to_string()))
    }

    pub fn validate(self) -> Result<CardPrompt, RequestError> {
        let prompt = self
            .prompt
            .filter(|p| !p.is_empty())
            .ok_or(RequestError::MissingPrompt)?;

        match self.text {
            None => Ok(CardPrompt::Word(prompt)),
            Some(text) if text.is_empty() => Err(RequestError::MissingPrompt),
            Some(text) => Ok(CardPrompt::Custom {
                system: prompt,
                word: text,
            }),
        }
    }
}

/// Payload returned to the browser/CLI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub svg_content: Option<String>,
    pub full_response: String,
}

impl GenerationResult {
    pub fn from_reply(full_response: String) -> Self {
        let svg_content = extract_svg(&full_response);
        debug!(
            reply_length = full_response.len(),
            svg_found = svg_content.is_some(),
            "Extracted SVG from assistant reply"
        );
        Self {
            svg_content,
            full_response,
        }
    }
}

static SVG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SVG_PATTERN).expect("SVG pattern must compile"));

/// First non-greedy `<svg ... </svg>` match; later blocks are ignored.
pub fn extract_svg(content: &str) -> Option<String> {
    SVG_REGEX.find(content).map(|m| m.as_str().to_string())
}

/// Pulls `choices[0].message.content` out of a chat-completion reply.
pub fn assistant_content(reply: &Value) -> Result<&str, UpstreamError> {
    let first_choice = reply
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(UpstreamError::ResponseStructure)?;

    match first_choice.get("message").and_then(|m| m.get("content")) {
        Some(Value::String(content)) if !content.is_empty() => Ok(content.as_str()),
        None | Some(Value::Null) | Some(Value::Bool(false)) => {
            Err(UpstreamError::MessageStructure)
        }
        Some(Value::String(_)) => Err(UpstreamError::MessageStructure),
        Some(other) => Err(UpstreamError::Decode(format!(
            "assistant content is not text: {}",
            other
        ))),
    }
}
