//! Error types for the catalog.

use thiserror::Error;

use crate::model::{DispensaryId, ProductId};

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur in the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Product not found.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Dispensary not found.
    #[error("dispensary not found: {0}")]
    DispensaryNotFound(DispensaryId),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create the data directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read a collection file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write a collection file.
    #[error("failed to write file: {0}")]
    WriteFile(String),
}
