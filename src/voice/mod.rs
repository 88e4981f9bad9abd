//! Voice processing module
//!
//! Speech recognition and synthesis go through OpenAI-compatible HTTP APIs.
//! Each provider implements a trait so the HTTP layer can be driven by any
//! backend (and by fakes in tests).

mod audio;
mod stt;
mod tts;
mod voices;

use async_trait::async_trait;

pub use audio::{
    AudioFormat, PreparedAudio, STT_SAMPLE_RATE, data_url, normalize_for_stt, samples_to_wav,
    sniff_format,
};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use voices::{DEFAULT_VOICE, VoiceAlias, VoiceMap};

use crate::Result;

/// Turns recorded speech into text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe an audio file
    ///
    /// `file_name` carries the container extension the provider uses to
    /// pick a decoder.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String>;
}

/// Turns text into speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given provider voice
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;

    /// Container format of the audio returned by [`Self::synthesize`]
    fn audio_format(&self) -> AudioFormat;
}
