//! Error types for similarity search and embedding jobs.

use menuscout_catalog::{CatalogError, ProductId};
use menuscout_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while searching or embedding.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Embedding error, including vector dimension mismatches.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Catalog error.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A stored vector was produced by a different model.
    #[error(
        "embedding for product {product_id} was made with model {actual}, expected {expected}; regenerate all embeddings"
    )]
    ModelMismatch {
        product_id: ProductId,
        expected: String,
        actual: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
