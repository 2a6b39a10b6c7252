//! # Catalog
//!
//! Persistence for scraped dispensary menus and their product embeddings.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Catalog                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Dispensary ──► Product ──► EmbeddingRecord                     │
//! │                    │               │                            │
//! │                    ▼               ▼                            │
//! │          ProductRepository   EmbeddingStore                     │
//! │                    └───────┬───────┘                            │
//! │                            ▼                                    │
//! │                       JsonCatalog (data_dir/*.json)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a product always deletes its embedding record, and there is at
//! most one record per product.

pub mod error;
pub mod json;
pub mod model;
pub mod store;

pub use error::{CatalogError, Result, StorageError};
pub use json::JsonCatalog;
pub use model::{
    CatalogStats, Dispensary, DispensaryId, EmbeddedProduct, EmbeddingRecord, NewProduct,
    Product, ProductId, ProductListing, ScrapeError,
};
pub use store::{EmbeddingStore, ProductRepository};
