//! Voxbridge - Streaming voice assistant backend
//!
//! This library glues three model services behind a small HTTP API:
//! - Speech-to-text over an OpenAI-compatible transcription API
//! - Chat replies streamed from Ollama
//! - Text-to-speech over an OpenAI-compatible speech API (Kokoro by default)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Browser UI                        │
//! │        record audio  │  play audio  │  show text      │
//! └───────────────────────┬──────────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────────┐
//! │                   Voxbridge API                       │
//! │  /api/speech-to-text  │  /api/chat (NDJSON stream)    │
//! └──────┬─────────────────────┬──────────────────┬───────┘
//!        │                     │                  │
//! ┌──────▼──────┐      ┌───────▼──────┐    ┌──────▼──────┐
//! │  STT (API)  │      │ LLM (Ollama) │───▶│  TTS (API)  │
//! └─────────────┘      └──────────────┘    └─────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod sentence;
pub mod voice;

pub use api::{ApiServer, ApiServerBuilder, ApiState};
pub use config::Config;
pub use error::{Error, Result};
pub use llm::{ChatModel, OllamaClient, TokenStream};
pub use pipeline::{ChatChunk, ChatPipeline, ChatRequest};
pub use sentence::{Segmentation, SentenceSplitter};
pub use voice::{SpeechRecognizer, SpeechSynthesizer, SpeechToText, TextToSpeech, VoiceMap};
