//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::SpeechRecognizer;
use crate::config::SttConfig;
use crate::{Error, Result};

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes speech through an OpenAI-compatible `/audio/transcriptions` API
///
/// Works against `OpenAI` Whisper as well as self-hosted servers
/// (faster-whisper, whisper.cpp) that mirror the same endpoint.
pub struct SpeechToText {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    language: Option<String>,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is empty
    pub fn new(base_url: String, model: String, api_key: Option<SecretString>) -> Result<Self> {
        if base_url.is_empty() {
            return Err(Error::Config("STT base URL required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            language: None,
        })
    }

    /// Create a STT client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is incomplete
    pub fn from_config(config: &SttConfig) -> Result<Self> {
        if config.api_key.is_none() && config.base_url.contains("api.openai.com") {
            tracing::warn!("no API key configured for OpenAI transcription; requests will be rejected");
        }

        Ok(Self::new(config.base_url.clone(), config.model.clone(), config.api_key.clone())?
            .with_language(config.language.clone()))
    }

    /// Set a language hint (ISO-639-1)
    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Model used for transcription
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl SpeechRecognizer for SpeechToText {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), file_name, "starting transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio).file_name(file_name.to_string()),
            )
            .text("model", self.model.clone());

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let mut request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        let text = result.text.trim().to_string();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}
