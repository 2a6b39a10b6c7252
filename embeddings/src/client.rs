//! Embedding client: one provider plus a retry policy.
//!
//! This is the boundary where failures turn into "no embedding". Callers
//! that only care whether a vector is available use [`EmbeddingClient::embed`];
//! callers that want the reason use [`EmbeddingClient::try_embed`].

use std::sync::Arc;

use tracing::{error, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, TaskType};
use crate::retry::RetryPolicy;

/// Retrying embedding client over any [`EmbeddingProvider`].
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    /// Create a client with the default retry policy.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Model tag recorded alongside every vector from this client.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Dimension every returned vector has.
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Whether the underlying provider has credentials.
    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    /// Embed `text`, returning the failure reason on error.
    pub async fn try_embed(&self, text: &str, task_type: TaskType) -> Result<Embedding> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyText);
        }
        if !self.provider.is_available() {
            return Err(EmbeddingError::ProviderNotConfigured);
        }

        let request = EmbeddingRequest {
            text: text.to_string(),
            task_type,
        };
        let vector = self
            .retry
            .run(|_| self.provider.embed(&request))
            .await?;

        let expected = self.provider.dimension();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Embed `text`, or `None` when no vector could be obtained.
    ///
    /// Never fails past this point: a missing key, exhausted retries and
    /// malformed responses are logged and reported as `None`.
    pub async fn embed(&self, text: &str, is_query: bool) -> Option<Embedding> {
        match self.try_embed(text, TaskType::from_query_flag(is_query)).await {
            Ok(vector) => Some(vector),
            Err(EmbeddingError::ProviderNotConfigured) => {
                error!(
                    "Embedding provider {} has no API key configured",
                    self.provider.name()
                );
                None
            }
            Err(err) => {
                warn!("Embedding unavailable: {err}");
                None
            }
        }
    }
}
