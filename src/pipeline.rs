//! Streaming chat response assembly
//!
//! For each sentence the model produces: synthesize speech, wrap it in a
//! `data:` URL and emit one JSON line. Work is strictly sequential, so lines
//! arrive in the order the model spoke them.

use std::sync::Arc;
use std::time::Instant;

use async_stream::{stream, try_stream};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::llm::ChatModel;
use crate::sentence::{Segmentation, SentenceSplitter};
use crate::voice::{SpeechSynthesizer, VoiceMap, data_url};

/// A chat turn submitted by the client
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// User message (typed or transcribed)
    pub message: String,

    /// Voice id or provider voice; the configured default when absent
    #[serde(default)]
    pub voice: Option<String>,

    /// Model name; the configured default when absent
    #[serde(default)]
    pub model: Option<String>,
}

/// One spoken sentence of the reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatChunk {
    pub sentence: String,
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
}

impl ChatChunk {
    /// Encode as one line of the chat stream
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Final line emitted when the reply cannot be completed
fn error_line(message: &str) -> String {
    let mut line = serde_json::json!({ "error": message }).to_string();
    line.push('\n');
    line
}

/// Wires a chat model to a speech synthesizer
#[derive(Clone)]
pub struct ChatPipeline {
    llm: Arc<dyn ChatModel>,
    tts: Arc<dyn SpeechSynthesizer>,
    voices: Arc<VoiceMap>,
    default_model: String,
    segmentation: Segmentation,
}

impl ChatPipeline {
    #[must_use]
    pub fn new(
        llm: Arc<dyn ChatModel>,
        tts: Arc<dyn SpeechSynthesizer>,
        voices: Arc<VoiceMap>,
        default_model: String,
    ) -> Self {
        Self {
            llm,
            tts,
            voices,
            default_model,
            segmentation: Segmentation::default(),
        }
    }

    /// Set how replies are cut into spoken pieces
    #[must_use]
    pub const fn with_segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = segmentation;
        self
    }

    /// Model a request resolves to
    #[must_use]
    pub fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str())
    }

    /// Produce the reply as a stream of chunks
    ///
    /// The stream ends after the first error.
    pub fn chunks(&self, request: ChatRequest) -> impl Stream<Item = Result<ChatChunk>> + Send + 'static {
        let llm = Arc::clone(&self.llm);
        let tts = Arc::clone(&self.tts);
        let model = self.model_for(&request).to_string();
        let voice = self.voices.resolve(request.voice.as_deref()).to_string();
        let segmentation = self.segmentation;
        let message = request.message;

        try_stream! {
            let started = Instant::now();
            let mut tokens = llm.chat_stream(&model, &message).await?;
            let mut splitter = SentenceSplitter::new(segmentation);
            let mut spoken = 0_usize;

            while let Some(fragment) = tokens.next().await {
                let fragment = fragment?;
                for sentence in splitter.push(&fragment) {
                    let chunk = speak(tts.as_ref(), sentence, &voice).await?;
                    spoken += 1;
                    yield chunk;
                }
            }

            if let Some(rest) = splitter.finish() {
                let chunk = speak(tts.as_ref(), rest, &voice).await?;
                spoken += 1;
                yield chunk;
            }

            if spoken == 0 {
                tracing::warn!(model = %model, "model returned an empty reply");
            }

            tracing::info!(
                model = %model,
                sentences = spoken,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "chat reply complete"
            );
        }
    }

    /// Produce the reply as newline-terminated JSON lines
    ///
    /// An error ends the stream with a final `{"error": ...}` line, since
    /// the HTTP status has already been sent by then.
    pub fn run(&self, request: ChatRequest) -> impl Stream<Item = String> + Send + 'static {
        let chunks = self.chunks(request);

        stream! {
            let mut chunks = Box::pin(chunks);
            while let Some(item) = chunks.next().await {
                match item.and_then(|chunk| chunk.to_line()) {
                    Ok(line) => yield line,
                    Err(e) => {
                        tracing::error!(error = %e, "error in chat stream");
                        yield error_line(&e.to_string());
                        break;
                    }
                }
            }
        }
    }
}

/// Synthesize one sentence and package it for the client
async fn speak(tts: &dyn SpeechSynthesizer, sentence: String, voice: &str) -> Result<ChatChunk> {
    let started = Instant::now();
    tracing::info!(voice, "starting text-to-speech conversion");

    let audio = tts.synthesize(&sentence, voice).await?;

    tracing::info!(
        bytes = audio.len(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "text-to-speech completed"
    );

    Ok(ChatChunk {
        audio_url: data_url(tts.audio_format(), &audio),
        sentence,
    })
}
