//! Catalog entities.

use chrono::{DateTime, Utc};
use menuscout_embeddings::Embedding;
use serde::{Deserialize, Serialize};

/// Product identifier.
pub type ProductId = u64;

/// Dispensary identifier.
pub type DispensaryId = u64;

/// A dispensary whose menu is scraped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispensary {
    /// Unique identifier.
    pub id: DispensaryId,

    /// Display name.
    pub name: String,

    /// Menu page URL; dispensaries are keyed by it.
    pub menu_url: String,

    /// When the menu was last scraped.
    #[serde(default)]
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// A product as emitted by the scraper, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    /// Product name.
    pub product_name: String,

    /// Price, kept verbatim (e.g. "$50.00", "$15/g").
    pub price: String,

    /// Optional weight or size (e.g. "3.5g", "1oz", "100mg").
    #[serde(default)]
    pub weight_or_size: Option<String>,
}

impl NewProduct {
    /// Create a product without a weight.
    pub fn new(product_name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            price: price.into(),
            weight_or_size: None,
        }
    }

    /// Set the weight or size.
    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.weight_or_size = Some(weight.into());
        self
    }
}

/// A stored product. Immutable until its dispensary is re-scraped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier.
    pub id: ProductId,

    /// Owning dispensary.
    pub dispensary_id: DispensaryId,

    /// Product name.
    pub product_name: String,

    /// Price string.
    pub price: String,

    /// Optional weight or size.
    #[serde(default)]
    pub weight_or_size: Option<String>,

    /// When the product was captured.
    pub scraped_at: DateTime<Utc>,
}

/// A product joined with its dispensary, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: ProductId,
    pub product_name: String,
    pub price: String,
    pub weight_or_size: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub dispensary_id: DispensaryId,
    pub dispensary_name: String,
}

/// The current embedding of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Product this vector belongs to.
    pub product_id: ProductId,

    /// The vector, stored as base64 of its little-endian f32 bytes.
    #[serde(with = "vector_base64")]
    pub vector: Embedding,

    /// Model that produced the vector.
    pub model_tag: String,

    /// When the vector was (re)generated.
    pub created_at: DateTime<Utc>,
}

/// An embedding record together with the product it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedProduct {
    pub listing: ProductListing,
    pub record: EmbeddingRecord,
}

/// A failed scrape, kept for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeError {
    pub id: u64,
    #[serde(default)]
    pub dispensary_id: Option<DispensaryId>,
    #[serde(default)]
    pub url: Option<String>,
    pub error_message: String,
    pub log_time: DateTime<Utc>,
}

/// Catalog counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Number of dispensaries.
    pub dispensaries: usize,

    /// Number of products.
    pub products: usize,

    /// Number of products with an embedding.
    pub embedded: usize,

    /// Number of products without an embedding.
    pub missing: usize,
}

mod vector_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use menuscout_embeddings::codec;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vector: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(codec::serialize(vector)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded).map_err(D::Error::custom)?;
        codec::deserialize(&bytes).map_err(D::Error::custom)
    }
}
