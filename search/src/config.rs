//! Configuration for search and embedding jobs.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use menuscout_embeddings::provider::DEFAULT_BASE_URL;
use menuscout_embeddings::{
    DEFAULT_DIMENSION, DEFAULT_MODEL, EmbeddingClient, GeminiProvider, RateLimitConfig,
    RetryPolicy,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Directory holding the catalog files.
    pub data_dir: PathBuf,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Bulk job throttling.
    pub rate_limit: RateLimitConfig,

    /// Similarity query defaults.
    pub similarity: SimilarityConfig,
}

impl SearchConfig {
    /// Create a configuration with default values.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            embedding: EmbeddingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            similarity: SimilarityConfig::default(),
        }
    }

    /// Load from a `.env` file (if any) and the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let embedding_defaults = EmbeddingConfig::default();
        let embedding = EmbeddingConfig {
            api_key: var("GOOGLE_API_KEY"),
            model: var("EMBEDDING_MODEL").unwrap_or(embedding_defaults.model),
            dimension: parse_or(&var, "EMBEDDING_DIMENSIONS", embedding_defaults.dimension)?,
            base_url: var("EMBEDDING_API_URL").unwrap_or(embedding_defaults.base_url),
            request_timeout_secs: parse_or(
                &var,
                "EMBEDDING_TIMEOUT_SECS",
                embedding_defaults.request_timeout_secs,
            )?,
            max_retries: parse_or(&var, "EMBEDDING_MAX_RETRIES", embedding_defaults.max_retries)?,
        };

        let rate_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_calls_per_minute: parse_or(
                &var,
                "EMBEDDING_RPM",
                rate_defaults.max_calls_per_minute,
            )?,
            batch_size: parse_or(&var, "EMBEDDING_BATCH_SIZE", rate_defaults.batch_size)?,
            batch_delay_secs: parse_or(
                &var,
                "EMBEDDING_BATCH_DELAY_SECS",
                rate_defaults.batch_delay_secs,
            )?,
        };

        let similarity_defaults = SimilarityConfig::default();
        let similarity = SimilarityConfig {
            threshold: parse_or(&var, "SIMILARITY_THRESHOLD", similarity_defaults.threshold)?,
            limit: parse_or(&var, "SIMILARITY_LIMIT", similarity_defaults.limit)?,
        };

        let data_dir = var("DATA_DIR").map_or_else(default_data_dir, PathBuf::from);

        Ok(Self {
            data_dir,
            embedding,
            rate_limit,
            similarity,
        })
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SearchError::Config(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key; without one every embedding is unavailable.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model to use for embeddings. Also the stored model tag.
    pub model: String,

    /// Requested output dimension.
    pub dimension: usize,

    /// API base URL.
    pub base_url: String,

    /// Per-request timeout (in seconds).
    pub request_timeout_secs: u64,

    /// Retries after the first failed attempt.
    pub max_retries: u32,
}

impl EmbeddingConfig {
    /// Build the provider described by this configuration.
    pub fn provider(&self) -> GeminiProvider {
        GeminiProvider::new()
            .with_api_key(self.api_key.clone())
            .with_base_url(&self.base_url)
            .with_model(&self.model)
            .with_dimension(self.dimension)
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    /// Build a retrying client over [`Self::provider`].
    pub fn client(&self) -> EmbeddingClient {
        EmbeddingClient::new(Arc::new(self.provider()))
            .with_retry(RetryPolicy::new(self.max_retries, Duration::from_secs(1)))
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Defaults for similarity queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Minimum cosine score (-1.0 to 1.0).
    pub threshold: f32,

    /// Maximum number of results.
    pub limit: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            limit: 5,
        }
    }
}
