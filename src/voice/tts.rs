//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{AudioFormat, SpeechSynthesizer};
use crate::config::TtsConfig;
use crate::{Error, Result};

/// Synthesizes speech through an OpenAI-compatible `/audio/speech` API
///
/// The default target is a local Kokoro-FastAPI server, which needs no key.
pub struct TextToSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    format: AudioFormat,
    speed: f32,
}

impl TextToSpeech {
    /// Create a new TTS client producing MP3 at normal speed
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is empty
    pub fn new(base_url: String, model: String, api_key: Option<SecretString>) -> Result<Self> {
        if base_url.is_empty() {
            return Err(Error::Config("TTS base URL required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            format: AudioFormat::Mp3,
            speed: 1.0,
        })
    }

    /// Create a TTS client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is incomplete
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        Ok(
            Self::new(config.base_url.clone(), config.model.clone(), config.api_key.clone())?
                .with_format(config.response_format)
                .with_speed(config.speed),
        )
    }

    /// Set the audio format requested from the provider
    #[must_use]
    pub const fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the speed multiplier
    #[must_use]
    pub const fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: AudioFormat,
            speed: f32,
        }

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: self.format,
            speed: self.speed,
        };

        let mut builder = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .json(&request);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("speech API error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    fn audio_format(&self) -> AudioFormat {
        self.format
    }
}
