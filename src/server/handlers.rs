use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::llm::{generate_card, GenerationRequest, GenerationResult};

/// `POST /api/chat`
///
/// Credentials are checked before the body is looked at, so a misconfigured
/// server answers 500 even to a malformed request.
pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerationResult>, ApiError> {
    let span = info_span!("chat", request_id = %Uuid::new_v4());

    async move { respond(&state, &body).await.inspect_err(ApiError::log) }
        .instrument(span)
        .await
}

async fn respond(state: &AppState, body: &[u8]) -> Result<Json<GenerationResult>, ApiError> {
    let config = state.credentials.load()?;
    let prompt = GenerationRequest::from_json(body)?.validate()?;
    info!(?prompt, "Generating card");

    let result = generate_card(
        &state.templates,
        state.upstream.as_ref(),
        &config,
        &prompt,
    )
    .await?;

    Ok(Json(result))
}
