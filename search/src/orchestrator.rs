//! Bulk embedding jobs: backfill and full regeneration.

use std::sync::Arc;

use menuscout_catalog::{EmbeddingStore, ProductId, ProductRepository};
use menuscout_embeddings::{EmbeddingClient, RateLimiter};
use tracing::{error, info, warn};

use crate::error::Result;

/// Log progress every this many items.
const PROGRESS_INTERVAL: usize = 20;

/// Canonical text fed to the embedding model for a product.
///
/// Changing this format makes existing vectors incomparable with new ones;
/// run a full regeneration afterwards.
pub fn format_product_text(product_name: &str, weight_or_size: Option<&str>) -> String {
    let name = product_name.trim();
    match weight_or_size.map(str::trim).filter(|w| !w.is_empty()) {
        Some(weight) if !name.is_empty() => format!("{name} {weight}"),
        Some(weight) => weight.to_string(),
        None => name.to_string(),
    }
}

/// Generates and stores product embeddings, one item at a time under the
/// rate limit.
pub struct EmbeddingOrchestrator<C> {
    catalog: Arc<C>,
    client: EmbeddingClient,
    limiter: Arc<RateLimiter>,
}

impl<C> EmbeddingOrchestrator<C>
where
    C: ProductRepository + EmbeddingStore,
{
    pub fn new(catalog: Arc<C>, client: EmbeddingClient, limiter: Arc<RateLimiter>) -> Self {
        Self {
            catalog,
            client,
            limiter,
        }
    }

    /// Embed one product and store the vector, replacing any existing one.
    ///
    /// Returns `false` if the product is unknown, no embedding could be
    /// obtained, or storing failed.
    pub async fn generate_embedding_for_product(&self, product_id: ProductId) -> bool {
        let listing = match self.catalog.product(product_id).await {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                warn!("Product {product_id} not found");
                return false;
            }
            Err(e) => {
                error!("Failed to load product {product_id}: {e}");
                return false;
            }
        };

        let text = format_product_text(&listing.product_name, listing.weight_or_size.as_deref());
        let Some(vector) = self.client.embed(&text, false).await else {
            warn!("No embedding for product {product_id} ({text})");
            return false;
        };

        match self
            .catalog
            .upsert(product_id, vector, self.client.model())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store embedding for product {product_id}: {e}");
                false
            }
        }
    }

    /// Embed products that have no embedding yet.
    ///
    /// At most `limit` products are processed unless `process_all` is set.
    /// Returns how many embeddings were stored.
    pub async fn backfill_missing(&self, limit: usize, process_all: bool) -> Result<usize> {
        let cap = (!process_all).then_some(limit);
        let missing = self.catalog.list_missing(cap).await?;
        info!("Found {} products without embeddings", missing.len());

        Ok(self.run("Backfill", missing).await)
    }

    /// Re-embed products whether or not they already have an embedding.
    ///
    /// Used after switching models. Same limits and return value as
    /// [`Self::backfill_missing`].
    pub async fn regenerate_all(&self, limit: usize, process_all: bool) -> Result<usize> {
        let mut ids = self.catalog.product_ids().await?;
        if !process_all {
            ids.truncate(limit);
        }
        info!(
            "Regenerating embeddings for {} products with model {}",
            ids.len(),
            self.client.model()
        );

        Ok(self.run("Regeneration", ids).await)
    }

    async fn run(&self, job: &str, ids: Vec<ProductId>) -> usize {
        if ids.is_empty() {
            return 0;
        }

        let total = ids.len();
        let stored = self
            .limiter
            .process_batch(
                ids,
                |product_id| self.generate_embedding_for_product(product_id),
                |done, total| {
                    if done % PROGRESS_INTERVAL == 0 && done < total {
                        info!("{job}: processed {done}/{total}");
                    }
                },
            )
            .await;

        info!("{job} complete: {stored}/{total} embeddings stored");
        stored
    }
}
