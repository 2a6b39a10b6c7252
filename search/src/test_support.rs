//! In-process embedding provider for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use menuscout_catalog::{DispensaryId, JsonCatalog, NewProduct, ProductId};
use menuscout_embeddings::{
    Embedding, EmbeddingClient, EmbeddingError, EmbeddingProvider, EmbeddingRequest, TaskType,
};

pub const MOCK_MODEL: &str = "mock-model";

/// Returns canned vectors per text and records every request.
#[derive(Default)]
pub struct MockProvider {
    vectors: HashMap<String, Embedding>,
    failing: HashSet<String>,
    unavailable: bool,
    requests: Mutex<Vec<(String, TaskType)>>,
}

impl MockProvider {
    pub fn with_vector(mut self, text: &str, vector: Embedding) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn requests(&self) -> Vec<(String, TaskType)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        MOCK_MODEL
    }

    fn dimension(&self) -> usize {
        2
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn embed(&self, request: &EmbeddingRequest) -> menuscout_embeddings::Result<Embedding> {
        self.requests
            .lock()
            .unwrap()
            .push((request.text.clone(), request.task_type));

        if self.failing.contains(&request.text) {
            return Err(EmbeddingError::InvalidResponse("mock failure".to_string()));
        }
        Ok(self
            .vectors
            .get(&request.text)
            .cloned()
            .unwrap_or_else(|| vec![1.0, 0.0]))
    }
}

pub fn client(provider: &Arc<MockProvider>) -> EmbeddingClient {
    EmbeddingClient::new(Arc::clone(provider) as Arc<dyn EmbeddingProvider>)
}

/// Unit vector whose cosine with `[1, 0]` is `score`.
pub fn vector_with_score(score: f32) -> Embedding {
    vec![score, (1.0 - score * score).max(0.0).sqrt()]
}

/// Add a dispensary with the given products, returning their ids.
pub async fn add_dispensary(
    catalog: &JsonCatalog,
    name: &str,
    products: &[(&str, Option<&str>)],
) -> (DispensaryId, Vec<ProductId>) {
    let dispensary = catalog
        .get_or_insert_dispensary(name, &format!("https://{name}.example/menu"))
        .await
        .unwrap();
    let products = products
        .iter()
        .map(|(product_name, weight)| {
            let product = NewProduct::new(*product_name, "$10.00");
            match weight {
                Some(weight) => product.with_weight(*weight),
                None => product,
            }
        })
        .collect();
    let ids = catalog.insert_products(dispensary, products).await.unwrap();
    (dispensary, ids)
}
