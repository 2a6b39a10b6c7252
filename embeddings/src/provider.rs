//! Embedding providers.
//!
//! A provider performs exactly one network attempt per call. Retries and
//! backoff live in [`crate::client::EmbeddingClient`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_DIMENSION, DEFAULT_MODEL, Embedding};

/// Default Generative Language API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// How the provider should weight the embedded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// A stored item (product listing).
    RetrievalDocument,
    /// A search-time query.
    RetrievalQuery,
}

impl TaskType {
    /// Pick the task type from the query flag.
    pub fn from_query_flag(is_query: bool) -> Self {
        if is_query {
            Self::RetrievalQuery
        } else {
            Self::RetrievalDocument
        }
    }
}

/// Request for generating one embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Document or query mode.
    pub task_type: TaskType,
}

impl EmbeddingRequest {
    /// Create a document-mode request.
    pub fn document(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            task_type: TaskType::RetrievalDocument,
        }
    }

    /// Create a query-mode request.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            task_type: TaskType::RetrievalQuery,
        }
    }
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model identifier, stored as the model tag on every record.
    fn model(&self) -> &str;

    /// Dimension of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;

    /// Make a single attempt at embedding the request text.
    async fn embed(&self, request: &EmbeddingRequest) -> Result<Embedding>;
}

/// Google Gemini `embedContent` provider.
pub struct GeminiProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Embedding model.
    model: String,

    /// Requested output dimension.
    dimension: usize,
}

impl GeminiProvider {
    /// Create a provider reading `GOOGLE_API_KEY` from the environment.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("GOOGLE_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Set the API key. `None` leaves the provider unconfigured.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Bound every request by `timeout`. A timed out request is retryable.
    ///
    /// If the HTTP client cannot be built the current client is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => self.client = client,
            Err(e) => warn!("Failed to apply {timeout:?} request timeout: {e}"),
        }
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model)
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed(&self, request: &EmbeddingRequest) -> Result<Embedding> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        debug!(
            "Requesting {:?} embedding with model {}",
            request.task_type, self.model
        );

        let body = GeminiEmbedRequest {
            model: format!("models/{}", self.model),
            content: GeminiContent {
                parts: vec![GeminiPart {
                    text: &request.text,
                }],
            },
            task_type: request.task_type,
            dimensions: self.dimension,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbeddingError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest {
                status: status.as_u16(),
                body,
            });
        }

        let result: GeminiEmbedResponse = response.json().await?;
        let values = result
            .embedding
            .map(|e| e.values)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding values".to_string()))?;

        debug!("Received embedding with {} dimensions", values.len());
        Ok(values)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbedRequest<'a> {
    model: String,
    content: GeminiContent<'a>,
    task_type: TaskType,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: Option<GeminiValues>,
}

#[derive(Debug, Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new()
            .with_api_key(Some("test-key".to_string()))
            .with_base_url(server.uri())
            .with_model("test-model")
            .with_dimension(3)
    }

    #[test]
    fn test_task_type_wire_names() {
        assert_eq!(
            serde_json::to_value(TaskType::RetrievalDocument).unwrap(),
            serde_json::json!("RETRIEVAL_DOCUMENT")
        );
        assert_eq!(
            serde_json::to_value(TaskType::from_query_flag(true)).unwrap(),
            serde_json::json!("RETRIEVAL_QUERY")
        );
    }

    #[tokio::test]
    async fn test_embed_sends_expected_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:embedContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "models/test-model",
                "content": { "parts": [{ "text": "Blue Dream 3.5g" }] },
                "taskType": "RETRIEVAL_QUERY",
                "dimensions": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": { "values": [0.1, 0.2, 0.3] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = provider(&server)
            .embed(&EmbeddingRequest::query("Blue Dream 3.5g"))
            .await
            .unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_embed_maps_429_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider(&server)
            .embed(&EmbeddingRequest::document("x"))
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_embed_rejects_missing_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = provider(&server)
            .embed(&EmbeddingRequest::document("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_embed_without_key_is_not_configured() {
        let provider = GeminiProvider::new().with_api_key(None);
        assert!(!provider.is_available());

        let err = provider
            .embed(&EmbeddingRequest::document("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
    }
}
