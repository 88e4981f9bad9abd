//! Streaming chat endpoint

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;

use super::{ApiError, ApiState};
use crate::pipeline::ChatRequest;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Answer a message with a stream of spoken sentences
///
/// Each line of the body is one JSON object `{"sentence", "audioUrl"}`.
/// The content type is `text/event-stream` so intermediaries do not buffer
/// the reply; the payload itself is plain line-delimited JSON.
async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    tracing::info!(
        message = %request.message,
        model = %state.pipeline.model_for(&request),
        voice = ?request.voice,
        "received chat message"
    );

    let lines = state.pipeline.run(request).map(Ok::<_, Infallible>);

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response())
}
