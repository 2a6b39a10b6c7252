//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured (no API key).
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// Provider returned a non-success status.
    #[error("API request failed with status {status}: {body}")]
    ApiRequest { status: u16, body: String },

    /// Provider rejected the call with HTTP 429.
    #[error("rate limited by embedding provider")]
    RateLimited,

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Byte buffer is not a whole number of f32 components.
    #[error("invalid vector byte length {0}, must be a multiple of 4")]
    InvalidByteLength(usize),

    /// Input text was empty after trimming.
    #[error("cannot embed empty text")]
    EmptyText,

    /// All retry attempts failed.
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<EmbeddingError>,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (connect failures, timeouts, body decoding).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::ApiRequest { .. } => true,
            // Body decode failures mean the provider answered with the wrong shape.
            Self::Http(err) => !err.is_decode(),
            _ => false,
        }
    }

    /// Whether this is the provider's rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
