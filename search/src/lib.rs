//! # Search
//!
//! Product similarity search and bulk embedding jobs over the menu catalog.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Search                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────────────┐          ┌──────────────────────┐     │
//! │  │ EmbeddingOrchestrator│          │   SimilarityEngine   │     │
//! │  │ backfill/regenerate  │          │ by text / by product │     │
//! │  └──────────────────────┘          └──────────────────────┘     │
//! │     │         │       │                │              │         │
//! │     ▼         ▼       ▼                ▼              ▼         │
//! │ RateLimiter  EmbeddingClient ◄─────────┘        EmbeddingStore  │
//! │                       │                               ▲         │
//! │                       └──────── upsert ───────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use menuscout_catalog::JsonCatalog;
//! use menuscout_embeddings::RateLimiter;
//! use menuscout_search::{EmbeddingOrchestrator, SearchConfig, SimilarityEngine};
//!
//! let config = SearchConfig::from_env()?;
//! let catalog = Arc::new(JsonCatalog::open(&config.data_dir).await?);
//! let client = config.embedding.client();
//!
//! let orchestrator = EmbeddingOrchestrator::new(
//!     Arc::clone(&catalog),
//!     client.clone(),
//!     Arc::new(RateLimiter::new(config.rate_limit)),
//! );
//! orchestrator.backfill_missing(100, false).await?;
//!
//! let engine = SimilarityEngine::new(catalog, client);
//! let results = engine.find_similar_by_text("fruity sativa", 5, 0.7).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;

#[cfg(test)]
mod test_support;

pub use config::{EmbeddingConfig, SearchConfig, SimilarityConfig};
pub use engine::{SimilarProduct, SimilarityEngine, SimilarityQuery};
pub use error::{Result, SearchError};
pub use orchestrator::{EmbeddingOrchestrator, format_product_text};
