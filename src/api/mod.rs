//! HTTP API server for voxbridge

pub mod chat;
mod error;
pub mod health;
pub mod rate_limit;
pub mod voice;

pub use error::ApiError;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};
use crate::llm::ChatModel;
use crate::pipeline::ChatPipeline;
use crate::sentence::Segmentation;
use crate::voice::{DEFAULT_VOICE, SpeechRecognizer, SpeechSynthesizer, VoiceMap};

/// Shared state for API handlers
pub struct ApiState {
    pub pipeline: ChatPipeline,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub voices: Arc<VoiceMap>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    llm: Arc<dyn ChatModel>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn SpeechRecognizer>,
    voices: VoiceMap,
    default_model: String,
    segmentation: Segmentation,
    host: String,
    port: u16,
    cors_origins: Vec<String>,
    rate_limit_per_minute: Option<u32>,
    max_upload_bytes: usize,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(
        llm: Arc<dyn ChatModel>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            llm,
            synthesizer,
            recognizer,
            voices: VoiceMap::new(DEFAULT_VOICE.to_string()),
            default_model: crate::config::DEFAULT_LLM_MODEL.to_string(),
            segmentation: Segmentation::default(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            rate_limit_per_minute: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Apply listen address, CORS, rate limit and body limit settings
    #[must_use]
    pub fn server_config(mut self, config: &ServerConfig) -> Self {
        self.host.clone_from(&config.host);
        self.port = config.port;
        self.cors_origins.clone_from(&config.cors_origins);
        self.rate_limit_per_minute = config.rate_limit_per_minute;
        self.max_upload_bytes = config.max_upload_bytes;
        self
    }

    /// Set the voice alias table
    #[must_use]
    pub fn voices(mut self, voices: VoiceMap) -> Self {
        self.voices = voices;
        self
    }

    /// Set the model used when a request does not name one
    #[must_use]
    pub fn default_model(mut self, model: String) -> Self {
        self.default_model = model;
        self
    }

    /// Set how chat replies are cut into spoken pieces
    #[must_use]
    pub const fn segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = segmentation;
        self
    }

    /// Set the global request budget per minute
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let voices = Arc::new(self.voices);
        let pipeline = ChatPipeline::new(
            self.llm,
            Arc::clone(&self.synthesizer),
            Arc::clone(&voices),
            self.default_model,
        )
        .with_segmentation(self.segmentation);

        let rate_limiter = self.rate_limit_per_minute.map(|rpm| {
            tracing::info!(rpm, "rate limiting enabled");
            rate_limit::create_limiter(rpm)
        });

        let state = Arc::new(ApiState {
            pipeline,
            recognizer: self.recognizer,
            synthesizer: self.synthesizer,
            voices,
            rate_limiter,
        });

        ApiServer {
            state,
            host: self.host,
            port: self.port,
            cors_origins: self.cors_origins,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    cors_origins: Vec<String>,
    max_upload_bytes: usize,
}

impl ApiServer {
    /// Build the router with all endpoints and layers
    pub fn router(&self) -> Router {
        let api = Router::new()
            .merge(chat::router(self.state.clone()))
            .merge(voice::router(self.state.clone()));

        Router::new()
            .nest("/api", api)
            .merge(health::router())
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::rate_limit_middleware,
            ))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.max_upload_bytes))
            .layer(cors_layer(&self.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server until ctrl-c
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// CORS for the configured browser origins
///
/// A `*` entry opens the API to any origin, without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_skips_invalid_origins() {
        // Construction must not panic on a bad origin or a wildcard
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&["*".to_string()]);
    }
}
