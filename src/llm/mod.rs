//! # Upstream chat-completion pipeline
//!
//! Everything between a validated card prompt and the JSON the proxy returns:
//! - `receive`: request/credential parsing, reply shape checks, SVG extraction
//! - `send`: the outbound chat-completion call
//!
//! ## Architecture
//!
//! ```text
//! CardPrompt → Preprocessor (messages) → send.rs (upstream call) → receive.rs (extract) → GenerationResult
//! ```

pub mod receive;
pub mod send;

// Re-export commonly used types for easier access
pub use receive::*;

pub use send::*;

use tracing::{info, instrument};

use crate::preprocessing::{Preprocessor, PromptTemplates};

/// Runs one generation: build messages, call upstream once, extract the SVG.
///
/// The whole call is bounded by `config.request_timeout()`; there are no retries.
#[instrument(skip_all)]
pub async fn generate_card(
    templates: &PromptTemplates,
    upstream: &dyn ChatCompletion,
    config: &Config,
    prompt: &CardPrompt,
) -> Result<GenerationResult, UpstreamError> {
    let request = Preprocessor::build_request(templates, config, prompt);

    let reply = tokio::time::timeout(config.request_timeout(), upstream.complete(config, &request))
        .await
        .map_err(|_| UpstreamError::Timeout)??;

    let content = assistant_content(&reply)?;
    let result = GenerationResult::from_reply(content.to_string());

    info!(
        svg_found = result.svg_content.is_some(),
        reply_length = result.full_response.len(),
        "Card generated"
    );
    Ok(result)
}

/// Validates that the required environment variables are set
///
/// # Returns
/// * `Result<(), String>` - Ok if all required variables are present, Err with missing variables
pub fn validate_environment() -> Result<(), String> {
    Config::from_env().map(|_| ()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests;
