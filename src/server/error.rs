//! Maps pipeline failures onto the route's JSON error bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::llm::{ConfigError, RequestError, UpstreamError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Server configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Bad request: {0}")]
    BadRequest(#[from] RequestError),
    #[error("Upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Configuration(_) | ApiError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The text sent to the client. Details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::Configuration(_) => "Server configuration error",
            ApiError::BadRequest(_) => "Missing prompt in request body",
            ApiError::Upstream(UpstreamError::ResponseStructure) => {
                "Unexpected API response structure"
            }
            ApiError::Upstream(UpstreamError::MessageStructure) => {
                "Unexpected message structure in API response"
            }
            ApiError::Upstream(_) => "Failed to generate response",
        }
    }

    /// Logs the failure in the current span; the response body carries only
    /// the public message.
    pub fn log(&self) {
        match self {
            ApiError::Configuration(e) => {
                error!(error = %e, "Missing API_URL or API_KEY environment variables")
            }
            ApiError::BadRequest(e) => warn!(error = %e, "Rejected chat request"),
            ApiError::Upstream(e) => error!(error = %e, "Error in chat API"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}
