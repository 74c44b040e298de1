//! HTTP surface: the single `POST /api/chat` proxy route.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use axum::routing::post;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::llm::{
    validate_environment, ChatCompletion, CredentialSource, EnvCredentials, HttpChatClient,
    UpstreamError,
};
use crate::preprocessing::{PromptTemplates, TemplateError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Prompt template failed to load: {0}")]
    Template(#[from] TemplateError),
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] UpstreamError),
    #[error("Failed to bind or serve: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<PromptTemplates>,
    pub credentials: Arc<dyn CredentialSource>,
    pub upstream: Arc<dyn ChatCompletion>,
}

impl AppState {
    pub fn new(
        templates: PromptTemplates,
        credentials: Arc<dyn CredentialSource>,
        upstream: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            templates: Arc::new(templates),
            credentials,
            upstream,
        }
    }

    /// Embedded template, environment credentials, real HTTP upstream.
    pub fn from_env() -> Result<Self, ServerError> {
        Ok(Self::new(
            PromptTemplates::embedded()?,
            Arc::new(EnvCredentials),
            Arc::new(HttpChatClient::new()?),
        ))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .with_state(state)
}

/// Serves on an already-bound listener until the task is dropped.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ServerError> {
    // Credentials are re-read per request; this is only an early hint.
    if let Err(missing) = validate_environment() {
        warn!(%missing, "Upstream credentials not configured yet");
    }

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    serve_on(listener, state).await
}
