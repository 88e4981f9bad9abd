//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use voxbridge::voice::{AudioFormat, SpeechRecognizer, SpeechSynthesizer};
use voxbridge::{ApiServerBuilder, ChatModel, Error, Result, TokenStream};

/// Chat model that replays scripted fragments
pub struct FakeChat {
    fragments: Vec<String>,
    fail_after: Option<usize>,
    pub seen: Mutex<Vec<(String, String)>>,
}

impl FakeChat {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(ToString::to_string).collect(),
            fail_after: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Yield `n` fragments, then an error
    pub fn failing_after(fragments: &[&str], n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::new(fragments)
        }
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn chat_stream(&self, model: &str, prompt: &str) -> Result<TokenStream> {
        self.seen
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));

        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(Error::Llm("model went away".to_string())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Synthesizer that returns `voice|text` as the audio bytes
#[derive(Default)]
pub struct FakeSynth {
    pub fail: bool,
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        if self.fail {
            return Err(Error::Tts("speech API error 503: busy".to_string()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice.to_string()));
        Ok(format!("{voice}|{text}").into_bytes())
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }
}

/// Recognizer that returns a fixed transcript
pub struct FakeRecognizer {
    pub text: Option<String>,
    pub uploads: Mutex<Vec<(String, usize)>>,
}

impl FakeRecognizer {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), audio.len()));
        self.text
            .clone()
            .ok_or_else(|| Error::Stt("transcription API error 500".to_string()))
    }
}

/// Build a router wired to the given fakes
pub fn build_test_router(
    chat: Arc<FakeChat>,
    synth: Arc<FakeSynth>,
    recognizer: Arc<FakeRecognizer>,
) -> axum::Router {
    ApiServerBuilder::new(chat, synth, recognizer)
        .default_model("test-model".to_string())
        .build()
        .router()
}

/// Encode a single-field multipart body
pub fn multipart_body(boundary: &str, field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// A short 16 kHz mono WAV clip
pub fn wav_clip(seconds: f32) -> Vec<u8> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..(16_000.0 * seconds) as usize)
        .map(|i| (i as f32 * 0.05).sin() * 0.3)
        .collect();
    voxbridge::voice::samples_to_wav(&samples, 16_000).unwrap()
}
