//! Model backends: a rendered instruction string in, generated text out.
//!
//! The pipeline only depends on [`ModelBackend`]. Calls are synchronous and
//! block until the full response is received.

pub mod ollama;
pub mod endpoint;
pub mod mock;

pub use ollama::OllamaBackend;
pub use endpoint::EndpointBackend;
pub use mock::MockBackend;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed backend response: {0}")]
    ResponseParsing(String),
}

impl BackendError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::HttpClient(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::ResponseParsing(_) => false,
        }
    }

    /// Map a transport error from `reqwest`.
    pub(crate) fn from_reqwest(e: reqwest::Error, base_url: &str, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            Self::Timeout(timeout_secs)
        } else if e.is_connect() {
            Self::Connection(base_url.to_string())
        } else {
            Self::HttpClient(e.to_string())
        }
    }
}

/// Decoding parameters for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature. Ignored when `deterministic` is set.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Maximum tokens to generate. None = backend default.
    pub max_tokens: Option<u32>,
    /// Context window to request. None = backend default.
    pub context_length: Option<u32>,
    /// Greedy decoding with a fixed seed.
    pub deterministic: bool,
    /// Sequences that end generation.
    pub stop: Vec<String>,
}

impl GenerationConfig {
    /// Seed sent with deterministic requests.
    pub const DETERMINISTIC_SEED: u64 = 42;

    /// Temperature actually sent to the backend.
    pub fn effective_temperature(&self) -> f32 {
        if self.deterministic {
            0.0
        } else {
            self.temperature
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.deterministic.then_some(Self::DETERMINISTIC_SEED)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.8,
            max_tokens: Some(2048),
            context_length: None,
            deterministic: true,
            stop: Vec::new(),
        }
    }
}

/// A synchronous text-generation backend.
pub trait ModelBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Generate a continuation of `prompt`. Returns the suffix only.
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String, BackendError>;
}

impl<T: ModelBackend + ?Sized> ModelBackend for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String, BackendError> {
        (**self).generate(prompt, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(BackendError::Connection("http://x".into()).is_retryable());
        assert!(BackendError::Timeout(30).is_retryable());
        assert!(BackendError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(BackendError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!BackendError::Status { status: 404, body: String::new() }.is_retryable());
        assert!(!BackendError::ResponseParsing("eof".into()).is_retryable());
    }

    #[test]
    fn deterministic_overrides_temperature() {
        let config = GenerationConfig::default();
        assert!(config.deterministic);
        assert_eq!(config.effective_temperature(), 0.0);
        assert_eq!(config.seed(), Some(GenerationConfig::DETERMINISTIC_SEED));

        let sampled = GenerationConfig {
            deterministic: false,
            ..GenerationConfig::default()
        };
        assert!((sampled.effective_temperature() - 0.8).abs() < f32::EPSILON);
        assert_eq!(sampled.seed(), None);
    }

    #[test]
    fn backend_trait_is_object_safe() {
        fn _assert_backend(_: &dyn ModelBackend) {}
    }
}
