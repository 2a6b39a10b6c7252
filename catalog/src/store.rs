//! Typed contracts the search layer depends on.
//!
//! Any backend (flat files, a relational table, a key-value store) can sit
//! behind these traits.

use async_trait::async_trait;
use menuscout_embeddings::Embedding;

use crate::error::Result;
use crate::model::{EmbeddedProduct, EmbeddingRecord, ProductId, ProductListing};

/// Read access to products.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Look up a product with its dispensary name.
    async fn product(&self, id: ProductId) -> Result<Option<ProductListing>>;

    /// All product ids, in storage order.
    async fn product_ids(&self) -> Result<Vec<ProductId>>;
}

/// Exclusive owner of embedding records, one per product at most.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Insert or fully replace the record for `product_id`.
    ///
    /// Fails with [`crate::CatalogError::ProductNotFound`] for unknown products.
    async fn upsert(&self, product_id: ProductId, vector: Embedding, model_tag: &str)
    -> Result<()>;

    /// The stored vector for a product.
    async fn get(&self, product_id: ProductId) -> Result<Option<Embedding>> {
        Ok(self.get_record(product_id).await?.map(|r| r.vector))
    }

    /// The full stored record for a product.
    async fn get_record(&self, product_id: ProductId) -> Result<Option<EmbeddingRecord>>;

    /// Products without a record, in storage order, capped at `limit`.
    async fn list_missing(&self, limit: Option<usize>) -> Result<Vec<ProductId>>;

    /// Remove the record for a product. Returns whether one existed.
    async fn delete_for_product(&self, product_id: ProductId) -> Result<bool>;

    /// Every record joined with its product, in storage order.
    async fn embedded_products(&self) -> Result<Vec<EmbeddedProduct>>;
}
