//! Ollama chat client

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::{ChatModel, NdjsonDecoder, TokenStream};
use crate::config::LlmConfig;
use crate::{Error, Result};

/// One object of Ollama's streamed `/api/chat` response
#[derive(Debug, Deserialize)]
struct ChatResponseChunk {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Streams chat replies from an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for the Ollama server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is empty
    pub fn new(base_url: String) -> Result<Self> {
        if base_url.is_empty() {
            return Err(Error::Config("Ollama base URL required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is incomplete
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(config.base_url.clone())
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat_stream(&self, model: &str, prompt: &str) -> Result<TokenStream> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: [ChatRequestMessage<'a>; 1],
            stream: bool,
        }

        #[derive(Serialize)]
        struct ChatRequestMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        let request = ChatRequest {
            model,
            messages: [ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        tracing::debug!(model, prompt_chars = prompt.len(), "starting chat completion");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Ollama request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Ollama API error");
            return Err(Error::Llm(format!("Ollama API error {status}: {body}")));
        }

        Ok(fragments(response).boxed())
    }
}

/// Decode a streamed `/api/chat` body into content fragments
fn fragments(response: reqwest::Response) -> impl Stream<Item = Result<String>> + Send + 'static {
    try_stream! {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = NdjsonDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for line in decoder.push(&chunk) {
                if let Some(fragment) = parse_line(&line)? {
                    yield fragment;
                }
            }
        }

        if let Some(line) = decoder.finish() {
            if let Some(fragment) = parse_line(&line)? {
                yield fragment;
            }
        }
    }
}

/// Extract the content fragment from one response line
///
/// Returns `None` for objects without text (the final `done` record).
fn parse_line(line: &str) -> Result<Option<String>> {
    let chunk: ChatResponseChunk = serde_json::from_str(line)?;

    if let Some(error) = chunk.error {
        return Err(Error::Llm(error));
    }

    if chunk.done {
        tracing::debug!("chat completion finished");
    }

    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_fragment() {
        let line = r#"{"model":"phi4","created_at":"2025-01-01T00:00:00Z","message":{"role":"assistant","content":"Hello"},"done":false}"#;
        assert_eq!(parse_line(line).unwrap().as_deref(), Some("Hello"));
    }

    #[test]
    fn final_record_has_no_fragment() {
        let line = r#"{"model":"phi4","message":{"role":"assistant","content":""},"done":true,"total_duration":123}"#;
        assert!(parse_line(line).unwrap().is_none());
    }

    #[test]
    fn error_record_becomes_llm_error() {
        let line = r#"{"error":"model 'nope' not found"}"#;
        match parse_line(line) {
            Err(Error::Llm(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected LLM error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_line_is_serialization_error() {
        assert!(matches!(parse_line("{not json"), Err(Error::Serialization(_))));
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(OllamaClient::new(String::new()).is_err());
    }
}
