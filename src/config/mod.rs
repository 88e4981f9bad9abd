//! Configuration management for voxbridge
//!
//! Values resolve with priority env > TOML file > built-in default.

pub mod file;

use std::path::Path;

use secrecy::SecretString;

use crate::sentence::Segmentation;
use crate::voice::{AudioFormat, VoiceMap};
use crate::{Error, Result};

pub use file::{VoxbridgeConfigFile, config_file_path, load_config_file};

/// Default Ollama server
pub const DEFAULT_LLM_URL: &str = "http://localhost:11434";

/// Default chat model
pub const DEFAULT_LLM_MODEL: &str = "phi4:latest";

/// Default transcription API base
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1";

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Default speech API base (Kokoro-FastAPI)
pub const DEFAULT_TTS_URL: &str = "http://localhost:8880/v1";

/// Default speech model
pub const DEFAULT_TTS_MODEL: &str = "kokoro";

/// Default body limit for uploads (25 MiB, the `OpenAI` transcription cap)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// voxbridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Chat model configuration
    pub llm: LlmConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Text-to-speech configuration
    pub tts: TtsConfig,

    /// Voice alias table
    pub voices: VoiceMap,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,

    /// Global request budget per minute (`None` disables limiting)
    pub rate_limit_per_minute: Option<u32>,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

/// Chat model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Ollama server URL
    pub base_url: String,

    /// Model used when a request does not name one
    pub model: String,

    /// How replies are cut into spoken pieces
    pub segmentation: Segmentation,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// OpenAI-compatible API base
    pub base_url: String,
    pub model: String,
    pub language: Option<String>,
    pub api_key: Option<SecretString>,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// OpenAI-compatible API base
    pub base_url: String,
    pub model: String,
    pub response_format: AudioFormat,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,
    pub api_key: Option<SecretString>,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unreadable or a value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = load_config_file(config_path)?;
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// `env` is consulted for every override so callers can substitute a
    /// fixed map.
    ///
    /// # Errors
    ///
    /// Returns error if a value fails validation
    pub fn resolve<F>(fc: VoxbridgeConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match env("VOXBRIDGE_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid VOXBRIDGE_PORT: {raw}")))?,
            None => fc.server.port.unwrap_or(8000),
        };

        let server = ServerConfig {
            host: env("VOXBRIDGE_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            cors_origins: fc
                .server
                .cors_origins
                .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]),
            rate_limit_per_minute: fc.server.rate_limit_per_minute.filter(|&n| n > 0),
            max_upload_bytes: fc
                .server
                .max_upload_bytes
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let llm = LlmConfig {
            base_url: normalize_base_url(
                &env("OLLAMA_HOST")
                    .or(fc.llm.base_url)
                    .unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            ),
            model: env("VOXBRIDGE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            segmentation: fc.llm.segmentation.unwrap_or_default(),
        };

        // OPENAI_API_KEY is a shared fallback for both speech services
        let openai_key = env("OPENAI_API_KEY");

        let stt = SttConfig {
            base_url: normalize_base_url(
                &env("VOXBRIDGE_STT_URL")
                    .or(fc.stt.base_url)
                    .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
            ),
            model: env("VOXBRIDGE_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            language: fc.stt.language,
            api_key: env("VOXBRIDGE_STT_API_KEY")
                .or(fc.stt.api_key)
                .or_else(|| openai_key.clone())
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        let response_format = fc
            .tts
            .response_format
            .as_deref()
            .map(str::parse::<AudioFormat>)
            .transpose()?
            .unwrap_or_default();

        let speed = fc.tts.speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&speed) {
            return Err(Error::Config(format!(
                "tts speed must be between 0.25 and 4.0, got {speed}"
            )));
        }

        let tts = TtsConfig {
            base_url: normalize_base_url(
                &env("VOXBRIDGE_TTS_URL")
                    .or(fc.tts.base_url)
                    .unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
            ),
            model: env("VOXBRIDGE_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            response_format,
            speed,
            api_key: env("VOXBRIDGE_TTS_API_KEY")
                .or(fc.tts.api_key)
                .or(openai_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        let default_voice = env("VOXBRIDGE_TTS_VOICE")
            .or(fc.tts.voice)
            .unwrap_or_else(|| crate::voice::DEFAULT_VOICE.to_string());
        let voices = VoiceMap::new(default_voice).with_aliases(fc.voices);

        Ok(Self {
            server,
            llm,
            stt,
            tts,
            voices,
        })
    }
}

/// Add a scheme when missing and strip trailing slashes
///
/// `OLLAMA_HOST` is commonly set as a bare `host:port`.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
