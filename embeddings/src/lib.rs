//! # Embeddings
//!
//! Text embedding generation and vector similarity for dispensary menu
//! search.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert product and query text to dense vectors
//! - **Retry/Backoff**: Bounded retries with rate-limit aware jitter
//! - **Vector Codec**: Compact little-endian storage form for vectors
//! - **Similarity Ranking**: Cosine scoring, top-k and cross-group interleaving
//! - **Rate Limiting**: Rolling-window throttle for bulk embedding jobs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RateLimiter ──► EmbeddingClient ──► EmbeddingProvider          │
//! │                        │                    │                   │
//! │                        ▼                    ▼                   │
//! │                  RetryPolicy          Gemini embedContent       │
//! │                                                                 │
//! │  codec (f32 LE bytes)        similarity (cosine, top-k)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod provider;
pub mod rate_limit;
pub mod retry;
pub mod similarity;

pub use client::EmbeddingClient;
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, EmbeddingRequest, GeminiProvider, TaskType};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::RetryPolicy;
pub use similarity::{ScoredItem, cosine_similarity, interleave_by_group, top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "gemini-embedding-exp-03-07";

/// Dimension of embeddings produced by the default model.
pub const DEFAULT_DIMENSION: usize = 3072;
