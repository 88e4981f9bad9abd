//! Conversational model clients
//!
//! Replies stream back as text fragments so speech can start before the
//! model has finished.

mod ndjson;
mod ollama;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use ndjson::NdjsonDecoder;
pub use ollama::OllamaClient;

use crate::Result;

/// Stream of reply fragments from a chat model
pub type TokenStream = BoxStream<'static, Result<String>>;

/// A chat model that answers a single user prompt
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a streamed reply to `prompt` using `model`
    ///
    /// Connection and status errors surface here; errors while reading the
    /// reply arrive as items of the stream.
    async fn chat_stream(&self, model: &str, prompt: &str) -> Result<TokenStream>;
}
