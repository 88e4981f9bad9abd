//! Voice API endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::voice::{VoiceAlias, normalize_for_stt};

/// Multipart field carrying the recording
const AUDIO_FIELD: &str = "audio";

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/speech-to-text", post(speech_to_text))
        .route("/text-to-speech", post(text_to_speech))
        .route("/voices", get(voices))
        .with_state(state)
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe an uploaded recording
///
/// Expects `multipart/form-data` with the recording in the `audio` field.
/// Browsers typically send `audio/webm` (Safari sends MP4); WAV and MP3 are
/// resampled to 16 kHz mono before upload. The client's file name labels
/// payloads whose container cannot be sniffed.
async fn speech_to_text(
    State(state): State<Arc<ApiState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(ToString::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = upload
        .ok_or_else(|| ApiError::BadRequest(format!("missing `{AUDIO_FIELD}` field")))?;

    if data.is_empty() {
        return Err(ApiError::BadRequest("empty audio data".to_string()));
    }

    tracing::info!(file_name = ?file_name, bytes = data.len(), "received audio file");

    // Decoding and resampling are CPU-bound
    let prepared = tokio::task::spawn_blocking(move || normalize_for_stt(&data, file_name.as_deref()))
        .await
        .map_err(|e| ApiError::TranscriptionFailed(e.to_string()))?
        .map_err(|e| ApiError::InvalidAudio(e.to_string()))?;

    let file_name = prepared.file_name();
    let text = state
        .recognizer
        .transcribe(prepared.data, &file_name)
        .await
        .map_err(|e| ApiError::TranscriptionFailed(e.to_string()))?;

    tracing::info!("speech-to-text conversion successful");
    Ok(Json(TranscribeResponse { text }))
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Synthesize text to speech
///
/// Returns raw audio in the configured provider format
async fn text_to_speech(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("empty text".to_string()));
    }

    let voice = state.voices.resolve(request.voice.as_deref());
    let audio = state
        .synthesizer
        .synthesize(text, voice)
        .await
        .map_err(|e| ApiError::SynthesisFailed(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, state.synthesizer.audio_format().mime_type())],
        audio,
    )
        .into_response())
}

/// Voice listing response
#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub default: String,
    pub voices: Vec<VoiceAlias>,
}

/// List configured voice aliases
async fn voices(State(state): State<Arc<ApiState>>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        default: state.voices.default_voice().to_string(),
        voices: state.voices.aliases(),
    })
}
