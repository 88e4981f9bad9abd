//! Client voice ids mapped onto speech-provider voices

use std::collections::BTreeMap;

use serde::Serialize;

/// Default provider voice when a request names none
pub const DEFAULT_VOICE: &str = "af_nicole+af_bella";

/// Built-in client aliases (Google-style ids used by the web client)
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("en-US-Standard-A", "af_bella"),
    ("en-US-Standard-B", "am_michael"),
    ("en-GB-Standard-A", "bf_isabella"),
    ("en-GB-Standard-B", "bm_george"),
];

/// A single alias entry, as listed by the voices endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceAlias {
    pub id: String,
    pub voice: String,
}

/// Resolves client-facing voice ids to provider voices
#[derive(Debug, Clone)]
pub struct VoiceMap {
    aliases: BTreeMap<String, String>,
    default_voice: String,
}

impl Default for VoiceMap {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE.to_string())
    }
}

impl VoiceMap {
    /// Create a map with the built-in aliases and the given default voice
    #[must_use]
    pub fn new(default_voice: String) -> Self {
        let aliases = BUILTIN_ALIASES
            .iter()
            .map(|(id, voice)| ((*id).to_string(), (*voice).to_string()))
            .collect();
        Self {
            aliases,
            default_voice,
        }
    }

    /// Add or replace aliases
    #[must_use]
    pub fn with_aliases<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.aliases.extend(extra);
        self
    }

    /// Voice used when a request does not name one
    #[must_use]
    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    /// Resolve a requested voice
    ///
    /// Known aliases map to their provider voice. Anything else is treated as
    /// a provider-native voice name (Kokoro accepts blends like `a+b`).
    #[must_use]
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        let requested = requested.map(str::trim).unwrap_or_default();
        if requested.is_empty() {
            return &self.default_voice;
        }
        self.aliases
            .get(requested)
            .map_or(requested, String::as_str)
    }

    /// List all aliases in id order
    #[must_use]
    pub fn aliases(&self) -> Vec<VoiceAlias> {
        self.aliases
            .iter()
            .map(|(id, voice)| VoiceAlias {
                id: id.clone(),
                voice: voice.clone(),
            })
            .collect()
    }
}
