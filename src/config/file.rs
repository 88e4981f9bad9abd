//! TOML configuration file loading
//!
//! Supports `~/.config/voxbridge/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::sentence::Segmentation;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoxbridgeConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Chat model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Extra voice aliases (client id → provider voice)
    #[serde(default)]
    pub voices: BTreeMap<String, String>,
}

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,

    /// Origins allowed by CORS (e.g. `http://localhost:3000`)
    pub cors_origins: Option<Vec<String>>,

    /// Global request budget per minute; unset disables rate limiting
    pub rate_limit_per_minute: Option<u32>,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: Option<usize>,
}

/// Chat model configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Ollama server URL (e.g. `http://localhost:11434`)
    pub base_url: Option<String>,

    /// Default model (e.g. "phi4:latest")
    pub model: Option<String>,

    /// Speak each sentence as it completes ("sentence") or the whole reply at once ("full")
    pub segmentation: Option<Segmentation>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// OpenAI-compatible API base (e.g. `https://api.openai.com/v1`)
    pub base_url: Option<String>,
    pub model: Option<String>,

    /// ISO-639-1 language hint
    pub language: Option<String>,
    pub api_key: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// OpenAI-compatible API base (e.g. `http://localhost:8880/v1`)
    pub base_url: Option<String>,
    pub model: Option<String>,

    /// Default voice (e.g. "af_nicole+af_bella")
    pub voice: Option<String>,

    /// Audio format requested from the provider ("mp3", "wav", ...)
    pub response_format: Option<String>,
    pub speed: Option<f32>,
    pub api_key: Option<String>,
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. The default path is optional:
/// when it is missing or unreadable the defaults are used.
///
/// # Errors
///
/// Returns error if an explicitly requested file cannot be read or parsed
pub fn load_config_file(explicit: Option<&Path>) -> Result<VoxbridgeConfigFile> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(VoxbridgeConfigFile::default());
    };

    if !path.exists() {
        return Ok(VoxbridgeConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(VoxbridgeConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(VoxbridgeConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/voxbridge/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxbridge").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_partial_file() {
        let fc: VoxbridgeConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000

            [llm]
            segmentation = "full"

            [tts]
            voice = "af_sky"

            [voices]
            narrator = "bm_lewis"
            "#,
        )
        .unwrap();

        assert_eq!(fc.server.port, Some(9000));
        assert!(fc.server.host.is_none());
        assert_eq!(fc.tts.voice.as_deref(), Some("af_sky"));
        assert!(fc.llm.model.is_none());
        assert_eq!(fc.llm.segmentation, Some(Segmentation::Full));
        assert_eq!(fc.voices.get("narrator").map(String::as_str), Some("bm_lewis"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let missing = Path::new("/nonexistent/voxbridge/config.toml");
        assert!(matches!(
            load_config_file(Some(missing)),
            Err(crate::Error::Io(_))
        ));
    }

    #[test]
    fn explicit_path_with_bad_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config_file(Some(file.path())),
            Err(crate::Error::Toml(_))
        ));
    }

    #[test]
    fn explicit_path_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm]\nmodel = \"llama3.2:latest\"").unwrap();
        let fc = load_config_file(Some(file.path())).unwrap();
        assert_eq!(fc.llm.model.as_deref(), Some("llama3.2:latest"));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let parsed: std::result::Result<VoxbridgeConfigFile, _> = toml::from_str("[database]\nurl = \"x\"");
        assert!(parsed.is_err());
    }
}
