//! Similarity search over stored product embeddings.

use std::sync::Arc;

use menuscout_catalog::{
    DispensaryId, EmbeddedProduct, EmbeddingStore, ProductId, ProductListing,
};
use menuscout_embeddings::{
    EmbeddingClient, ScoredItem, cosine_similarity, interleave_by_group, top_k,
};
use serde::Serialize;
use tracing::debug;

use crate::config::SimilarityConfig;
use crate::error::{Result, SearchError};

/// Parameters for one similarity search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityQuery {
    /// Maximum number of results.
    pub limit: usize,

    /// Minimum cosine score a result must reach.
    pub threshold: f32,

    /// Product that must never be returned (usually the query product).
    pub exclude_product: Option<ProductId>,

    /// Spread results across dispensaries instead of ranking purely by score.
    pub cross_dispensary: bool,

    /// Dispensary whose products must never be returned.
    pub exclude_dispensary: Option<DispensaryId>,
}

impl SimilarityQuery {
    /// Create a query with no exclusions.
    pub fn new(limit: usize, threshold: f32) -> Self {
        Self {
            limit,
            threshold,
            exclude_product: None,
            cross_dispensary: false,
            exclude_dispensary: None,
        }
    }

    /// Exclude one product.
    pub fn excluding_product(mut self, product_id: ProductId) -> Self {
        self.exclude_product = Some(product_id);
        self
    }

    /// Exclude every product of one dispensary.
    pub fn excluding_dispensary(mut self, dispensary_id: DispensaryId) -> Self {
        self.exclude_dispensary = Some(dispensary_id);
        self
    }

    /// Enable or disable cross-dispensary interleaving.
    pub fn with_cross_dispensary(mut self, enabled: bool) -> Self {
        self.cross_dispensary = enabled;
        self
    }

    fn excludes(&self, listing: &ProductListing) -> bool {
        self.exclude_product == Some(listing.id)
            || self.exclude_dispensary == Some(listing.dispensary_id)
    }
}

impl From<SimilarityConfig> for SimilarityQuery {
    fn from(config: SimilarityConfig) -> Self {
        Self::new(config.limit, config.threshold)
    }
}

impl Default for SimilarityQuery {
    fn default() -> Self {
        SimilarityConfig::default().into()
    }
}

/// A product and how similar it is to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarProduct {
    #[serde(flatten)]
    pub listing: ProductListing,
    pub score: f32,
}

/// Ranks stored embeddings against a query vector.
///
/// Every search is a linear scan over all stored records.
pub struct SimilarityEngine<S> {
    store: Arc<S>,
    client: EmbeddingClient,
}

impl<S: EmbeddingStore> SimilarityEngine<S> {
    /// Create an engine. `client` supplies query embeddings and the model
    /// every stored record must have been produced with.
    pub fn new(store: Arc<S>, client: EmbeddingClient) -> Self {
        Self { store, client }
    }

    /// Rank stored products against `target`.
    ///
    /// Candidates below the threshold are dropped before ranking, so in
    /// cross-dispensary mode only dispensaries with at least one passing
    /// product take part in the round robin.
    pub async fn find_similar(
        &self,
        target: &[f32],
        query: &SimilarityQuery,
    ) -> Result<Vec<SimilarProduct>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let expected_model = self.client.model();
        let mut candidates = Vec::new();
        for EmbeddedProduct { listing, record } in self.store.embedded_products().await? {
            if query.excludes(&listing) {
                continue;
            }
            if record.model_tag != expected_model {
                return Err(SearchError::ModelMismatch {
                    product_id: listing.id,
                    expected: expected_model.to_string(),
                    actual: record.model_tag,
                });
            }

            let score = cosine_similarity(target, &record.vector)?;
            if score >= query.threshold {
                candidates.push(ScoredItem::new(listing, score));
            }
        }

        debug!(
            "{} candidates at or above {}",
            candidates.len(),
            query.threshold
        );

        let ranked = if query.cross_dispensary {
            interleave_by_group(candidates, query.limit, |listing: &ProductListing| {
                listing.dispensary_id
            })
        } else {
            top_k(candidates, query.limit)
        };

        Ok(ranked
            .into_iter()
            .map(|scored| SimilarProduct {
                listing: scored.item,
                score: scored.score,
            })
            .collect())
    }

    /// Search with free text.
    ///
    /// The text is embedded in query mode. If no embedding can be obtained
    /// the result is empty, same as when nothing matches.
    pub async fn find_similar_by_text(
        &self,
        text: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarProduct>> {
        let Some(target) = self.client.embed(text, true).await else {
            return Ok(Vec::new());
        };
        self.find_similar(&target, &SimilarityQuery::new(limit, threshold))
            .await
    }

    /// Find products similar to a stored product, excluding the product itself.
    ///
    /// A product without an embedding yields no results; one is not
    /// generated on demand.
    pub async fn find_similar_by_product(
        &self,
        product_id: ProductId,
        limit: usize,
        threshold: f32,
        cross_dispensary: bool,
    ) -> Result<Vec<SimilarProduct>> {
        let query = SimilarityQuery::new(limit, threshold).with_cross_dispensary(cross_dispensary);
        self.find_similar_to_product(product_id, query).await
    }

    /// Like [`Self::find_similar_by_product`] with full query control.
    pub async fn find_similar_to_product(
        &self,
        product_id: ProductId,
        query: SimilarityQuery,
    ) -> Result<Vec<SimilarProduct>> {
        let Some(target) = self.store.get(product_id).await? else {
            debug!("Product {product_id} has no embedding");
            return Ok(Vec::new());
        };
        self.find_similar(&target, &query.excluding_product(product_id))
            .await
    }
}
