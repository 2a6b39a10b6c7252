//! Flat JSON file catalog.
//!
//! Each collection lives in its own pretty-printed JSON file inside the data
//! directory. Everything is loaded once at open and held in memory.
//!
//! Every mutation writes the new collection to disk first and only then
//! applies it in memory, so a failed write leaves memory matching disk.
//! Embedding files are always written before product files: an interrupted
//! delete can leave a product without its embedding, never an embedding
//! without its product.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use menuscout_embeddings::Embedding;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CatalogError, Result, StorageError};
use crate::model::{
    CatalogStats, Dispensary, DispensaryId, EmbeddedProduct, EmbeddingRecord, NewProduct,
    Product, ProductId, ProductListing, ScrapeError,
};
use crate::store::{EmbeddingStore, ProductRepository};

const DISPENSARIES_FILE: &str = "dispensaries.json";
const PRODUCTS_FILE: &str = "products.json";
const EMBEDDINGS_FILE: &str = "embeddings.json";
const SCRAPE_ERRORS_FILE: &str = "scrape_errors.json";

/// Catalog backed by JSON files, or purely in memory.
pub struct JsonCatalog {
    /// Directory holding the collection files; `None` keeps data in memory.
    data_dir: Option<PathBuf>,

    /// Loaded collections.
    state: RwLock<CatalogState>,
}

#[derive(Default)]
struct CatalogState {
    dispensaries: Vec<Dispensary>,
    products: Vec<Product>,
    embeddings: HashMap<ProductId, EmbeddingRecord>,
    scrape_errors: Vec<ScrapeError>,
}

impl CatalogState {
    fn listing(&self, product: &Product) -> ProductListing {
        let dispensary_name = self
            .dispensaries
            .iter()
            .find(|d| d.id == product.dispensary_id)
            .map_or_else(|| "Unknown".to_string(), |d| d.name.clone());

        ProductListing {
            id: product.id,
            product_name: product.product_name.clone(),
            price: product.price.clone(),
            weight_or_size: product.weight_or_size.clone(),
            scraped_at: product.scraped_at,
            dispensary_id: product.dispensary_id,
            dispensary_name,
        }
    }

    fn has_dispensary(&self, id: DispensaryId) -> bool {
        self.dispensaries.iter().any(|d| d.id == id)
    }

    fn has_product(&self, id: ProductId) -> bool {
        self.products.iter().any(|p| p.id == id)
    }

    /// Embedding records as they will be written, sorted by product id.
    ///
    /// Records for `skip` are left out and `extra` is added.
    fn embeddings_to_write<'a>(
        &'a self,
        skip: &HashSet<ProductId>,
        extra: Option<&'a EmbeddingRecord>,
    ) -> Vec<&'a EmbeddingRecord> {
        let mut records: Vec<&EmbeddingRecord> = self
            .embeddings
            .values()
            .filter(|r| !skip.contains(&r.product_id))
            .chain(extra)
            .collect();
        records.sort_by_key(|r| r.product_id);
        records
    }
}

impl JsonCatalog {
    /// Create an empty catalog that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            state: RwLock::new(CatalogState::default()),
        }
    }

    /// Open (or create) a catalog in `data_dir`.
    ///
    /// Embedding records whose product no longer exists are dropped.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        fs::create_dir_all(&data_dir).await.map_err(|e| {
            StorageError::CreateDirectory(format!("{}: {e}", data_dir.display()))
        })?;

        let products: Vec<Product> = read_collection(&data_dir.join(PRODUCTS_FILE)).await?;
        let records: Vec<EmbeddingRecord> =
            read_collection(&data_dir.join(EMBEDDINGS_FILE)).await?;

        let product_ids: HashSet<ProductId> = products.iter().map(|p| p.id).collect();
        let loaded = records.len();
        let embeddings: HashMap<ProductId, EmbeddingRecord> = records
            .into_iter()
            .filter(|r| product_ids.contains(&r.product_id))
            .map(|r| (r.product_id, r))
            .collect();

        let state = CatalogState {
            dispensaries: read_collection(&data_dir.join(DISPENSARIES_FILE)).await?,
            products,
            embeddings,
            scrape_errors: read_collection(&data_dir.join(SCRAPE_ERRORS_FILE)).await?,
        };

        let orphaned = loaded - state.embeddings.len();
        if orphaned > 0 {
            warn!("Dropping {orphaned} embeddings whose products no longer exist");
            write_collection(
                &data_dir.join(EMBEDDINGS_FILE),
                &state.embeddings_to_write(&HashSet::new(), None),
            )
            .await?;
        }

        info!(
            "Opened catalog at {}: {} dispensaries, {} products, {} embeddings",
            data_dir.display(),
            state.dispensaries.len(),
            state.products.len(),
            state.embeddings.len()
        );

        Ok(Self {
            data_dir: Some(data_dir),
            state: RwLock::new(state),
        })
    }

    async fn persist<T: Serialize + ?Sized>(&self, file_name: &str, items: &T) -> Result<()> {
        match &self.data_dir {
            Some(dir) => write_collection(&dir.join(file_name), items).await,
            None => Ok(()),
        }
    }

    // ---- Dispensaries ----

    /// Find the dispensary for `menu_url`, creating it if needed.
    pub async fn get_or_insert_dispensary(
        &self,
        name: &str,
        menu_url: &str,
    ) -> Result<DispensaryId> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.dispensaries.iter().find(|d| d.menu_url == menu_url) {
            return Ok(existing.id);
        }

        let id = state.dispensaries.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        let dispensary = Dispensary {
            id,
            name: name.to_string(),
            menu_url: menu_url.to_string(),
            last_scraped_at: None,
        };
        let updated: Vec<&Dispensary> = state
            .dispensaries
            .iter()
            .chain(std::iter::once(&dispensary))
            .collect();
        self.persist(DISPENSARIES_FILE, &updated).await?;
        state.dispensaries.push(dispensary);

        info!("Registered dispensary {id}: {name}");
        Ok(id)
    }

    /// Record that a dispensary was just scraped.
    pub async fn touch_dispensary(&self, id: DispensaryId) -> Result<()> {
        let mut state = self.state.write().await;
        let index = state
            .dispensaries
            .iter()
            .position(|d| d.id == id)
            .ok_or(CatalogError::DispensaryNotFound(id))?;

        let mut updated = state.dispensaries.clone();
        updated[index].last_scraped_at = Some(Utc::now());
        self.persist(DISPENSARIES_FILE, &updated).await?;
        state.dispensaries = updated;
        Ok(())
    }

    /// All dispensaries, ordered by name.
    pub async fn dispensaries(&self) -> Vec<Dispensary> {
        let mut dispensaries = self.state.read().await.dispensaries.clone();
        dispensaries.sort_by(|a, b| a.name.cmp(&b.name));
        dispensaries
    }

    // ---- Products ----

    /// Append products for a dispensary. Returns the new ids in input order.
    pub async fn insert_products(
        &self,
        dispensary_id: DispensaryId,
        products: Vec<NewProduct>,
    ) -> Result<Vec<ProductId>> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.state.write().await;
        if !state.has_dispensary(dispensary_id) {
            return Err(CatalogError::DispensaryNotFound(dispensary_id));
        }

        let scraped_at = Utc::now();
        let first_id = state.products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let added: Vec<Product> = (first_id..)
            .zip(products)
            .map(|(id, product)| Product {
                id,
                dispensary_id,
                product_name: product.product_name,
                price: product.price,
                weight_or_size: product.weight_or_size.filter(|w| !w.trim().is_empty()),
                scraped_at,
            })
            .collect();

        let updated: Vec<&Product> = state.products.iter().chain(&added).collect();
        self.persist(PRODUCTS_FILE, &updated).await?;

        let ids: Vec<ProductId> = added.iter().map(|p| p.id).collect();
        state.products.extend(added);

        info!(
            "Inserted {} products for dispensary {dispensary_id}",
            ids.len()
        );
        Ok(ids)
    }

    /// Remove every product of a dispensary, along with their embeddings.
    pub async fn clear_products_for_dispensary(
        &self,
        dispensary_id: DispensaryId,
    ) -> Result<usize> {
        let mut state = self.state.write().await;

        let removed: HashSet<ProductId> = state
            .products
            .iter()
            .filter(|p| p.dispensary_id == dispensary_id)
            .map(|p| p.id)
            .collect();
        if removed.is_empty() {
            return Ok(0);
        }

        let embeddings_removed = removed
            .iter()
            .filter(|id| state.embeddings.contains_key(id))
            .count();
        if embeddings_removed > 0 {
            self.persist(EMBEDDINGS_FILE, &state.embeddings_to_write(&removed, None))
                .await?;
            state.embeddings.retain(|id, _| !removed.contains(id));
        }

        let kept: Vec<&Product> = state
            .products
            .iter()
            .filter(|p| !removed.contains(&p.id))
            .collect();
        self.persist(PRODUCTS_FILE, &kept).await?;
        state.products.retain(|p| !removed.contains(&p.id));

        info!(
            "Cleared {} products ({embeddings_removed} embeddings) for dispensary {dispensary_id}",
            removed.len()
        );
        Ok(removed.len())
    }

    /// Replace a dispensary's catalog with a fresh scrape.
    pub async fn replace_products(
        &self,
        dispensary_id: DispensaryId,
        products: Vec<NewProduct>,
    ) -> Result<Vec<ProductId>> {
        self.clear_products_for_dispensary(dispensary_id).await?;
        let ids = self.insert_products(dispensary_id, products).await?;
        self.touch_dispensary(dispensary_id).await?;
        Ok(ids)
    }

    /// Products of one dispensary, ordered by name.
    pub async fn products_for_dispensary(
        &self,
        dispensary_id: DispensaryId,
    ) -> Vec<ProductListing> {
        let state = self.state.read().await;
        let mut listings: Vec<ProductListing> = state
            .products
            .iter()
            .filter(|p| p.dispensary_id == dispensary_id)
            .map(|p| state.listing(p))
            .collect();
        listings.sort_by(|a, b| a.product_name.cmp(&b.product_name));
        listings
    }

    /// Case-insensitive substring search over product names.
    ///
    /// An empty term matches every product. Results are ordered by
    /// dispensary name, then product name.
    pub async fn search_products_by_name(&self, term: &str) -> Vec<ProductListing> {
        let needle = term.trim().to_lowercase();
        let state = self.state.read().await;
        let mut listings: Vec<ProductListing> = state
            .products
            .iter()
            .filter(|p| p.product_name.to_lowercase().contains(&needle))
            .map(|p| state.listing(p))
            .collect();
        listings.sort_by(|a, b| {
            a.dispensary_name
                .cmp(&b.dispensary_name)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        listings
    }

    // ---- Scrape log ----

    /// Record a failed scrape.
    pub async fn log_scrape_error(
        &self,
        error_message: &str,
        url: Option<&str>,
        dispensary_id: Option<DispensaryId>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = ScrapeError {
            id: state.scrape_errors.iter().map(|e| e.id).max().unwrap_or(0) + 1,
            dispensary_id,
            url: url.map(str::to_string),
            error_message: error_message.to_string(),
            log_time: Utc::now(),
        };
        let updated: Vec<&ScrapeError> = state
            .scrape_errors
            .iter()
            .chain(std::iter::once(&entry))
            .collect();
        self.persist(SCRAPE_ERRORS_FILE, &updated).await?;
        state.scrape_errors.push(entry);
        Ok(())
    }

    /// Most recent scrape errors, newest first.
    pub async fn recent_errors(&self, limit: usize) -> Vec<ScrapeError> {
        let state = self.state.read().await;
        state.scrape_errors.iter().rev().take(limit).cloned().collect()
    }

    /// Counts of dispensaries, products and embeddings.
    pub async fn stats(&self) -> CatalogStats {
        let state = self.state.read().await;
        let embedded = state
            .products
            .iter()
            .filter(|p| state.embeddings.contains_key(&p.id))
            .count();
        CatalogStats {
            dispensaries: state.dispensaries.len(),
            products: state.products.len(),
            embedded,
            missing: state.products.len() - embedded,
        }
    }
}

#[async_trait]
impl ProductRepository for JsonCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<ProductListing>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .find(|p| p.id == id)
            .map(|p| state.listing(p)))
    }

    async fn product_ids(&self) -> Result<Vec<ProductId>> {
        Ok(self.state.read().await.products.iter().map(|p| p.id).collect())
    }
}

#[async_trait]
impl EmbeddingStore for JsonCatalog {
    async fn upsert(
        &self,
        product_id: ProductId,
        vector: Embedding,
        model_tag: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.has_product(product_id) {
            return Err(CatalogError::ProductNotFound(product_id));
        }

        let record = EmbeddingRecord {
            product_id,
            vector,
            model_tag: model_tag.to_string(),
            created_at: Utc::now(),
        };
        let replaced_ids = HashSet::from([product_id]);
        self.persist(
            EMBEDDINGS_FILE,
            &state.embeddings_to_write(&replaced_ids, Some(&record)),
        )
        .await?;
        let replaced = state.embeddings.insert(product_id, record).is_some();

        debug!(
            "{} embedding for product {product_id} ({model_tag})",
            if replaced { "Replaced" } else { "Stored" }
        );
        Ok(())
    }

    async fn get_record(&self, product_id: ProductId) -> Result<Option<EmbeddingRecord>> {
        Ok(self.state.read().await.embeddings.get(&product_id).cloned())
    }

    async fn list_missing(&self, limit: Option<usize>) -> Result<Vec<ProductId>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .filter(|p| !state.embeddings.contains_key(&p.id))
            .map(|p| p.id)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn delete_for_product(&self, product_id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.embeddings.contains_key(&product_id) {
            return Ok(false);
        }

        let removed = HashSet::from([product_id]);
        self.persist(EMBEDDINGS_FILE, &state.embeddings_to_write(&removed, None))
            .await?;
        state.embeddings.remove(&product_id);
        Ok(true)
    }

    async fn embedded_products(&self) -> Result<Vec<EmbeddedProduct>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .filter_map(|p| {
                state.embeddings.get(&p.id).map(|record| EmbeddedProduct {
                    listing: state.listing(p),
                    record: record.clone(),
                })
            })
            .collect())
    }
}

async fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StorageError::ReadFile(format!("{}: {e}", path.display())).into());
        }
    };
    Ok(serde_json::from_str(&content)?)
}

async fn write_collection<T: Serialize + ?Sized>(path: &Path, items: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(items)?;

    // Write atomically using a temp file
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &content)
        .await
        .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| StorageError::WriteFile(format!("{}: {e}", path.display())))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn seeded() -> (JsonCatalog, DispensaryId, Vec<ProductId>) {
        let catalog = JsonCatalog::in_memory();
        let dispensary = catalog
            .get_or_insert_dispensary("Green Leaf", "https://greenleaf.example/menu")
            .await
            .unwrap();
        let ids = catalog
            .insert_products(
                dispensary,
                vec![
                    NewProduct::new("Blue Dream", "$35.00").with_weight("3.5g"),
                    NewProduct::new("Sour Diesel Cart", "$40.00").with_weight("1g"),
                    NewProduct::new("Mango Gummies", "$20.00").with_weight("100mg"),
                ],
            )
            .await
            .unwrap();
        (catalog, dispensary, ids)
    }

    #[tokio::test]
    async fn test_dispensary_keyed_by_menu_url() {
        let catalog = JsonCatalog::in_memory();
        let first = catalog
            .get_or_insert_dispensary("Green Leaf", "https://greenleaf.example/menu")
            .await
            .unwrap();
        let again = catalog
            .get_or_insert_dispensary("Green Leaf Renamed", "https://greenleaf.example/menu")
            .await
            .unwrap();
        let other = catalog
            .get_or_insert_dispensary("Canna Co", "https://canna.example/menu")
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(catalog.dispensaries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_requires_dispensary() {
        let catalog = JsonCatalog::in_memory();
        let err = catalog
            .insert_products(42, vec![NewProduct::new("Blue Dream", "$35.00")])
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::DispensaryNotFound(42)));
    }

    #[tokio::test]
    async fn test_search_by_name_is_case_insensitive() {
        let (catalog, _, _) = seeded().await;

        let results = catalog.search_products_by_name("DREAM").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_name, "Blue Dream");
        assert_eq!(results[0].dispensary_name, "Green Leaf");

        assert_eq!(catalog.search_products_by_name("").await.len(), 3);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_record_per_product() {
        let (catalog, _, ids) = seeded().await;

        catalog.upsert(ids[0], vec![1.0, 0.0], "model-a").await.unwrap();
        catalog.upsert(ids[0], vec![0.0, 1.0], "model-b").await.unwrap();

        let record = catalog.get_record(ids[0]).await.unwrap().unwrap();
        assert_eq!(record.vector, vec![0.0, 1.0]);
        assert_eq!(record.model_tag, "model-b");
        assert_eq!(catalog.embedded_products().await.unwrap().len(), 1);
        assert_eq!(catalog.get(ids[1]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_unknown_product_fails() {
        let (catalog, _, _) = seeded().await;
        let err = catalog.upsert(999, vec![1.0], "m").await.unwrap_err();
        assert!(matches!(err, CatalogError::ProductNotFound(999)));
    }

    #[tokio::test]
    async fn test_list_missing_respects_order_and_limit() {
        let (catalog, _, ids) = seeded().await;
        catalog.upsert(ids[1], vec![1.0], "m").await.unwrap();

        assert_eq!(catalog.list_missing(None).await.unwrap(), vec![ids[0], ids[2]]);
        assert_eq!(catalog.list_missing(Some(1)).await.unwrap(), vec![ids[0]]);
        assert!(catalog.list_missing(Some(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_for_product() {
        let (catalog, _, ids) = seeded().await;
        catalog.upsert(ids[0], vec![1.0], "m").await.unwrap();

        assert!(catalog.delete_for_product(ids[0]).await.unwrap());
        assert!(!catalog.delete_for_product(ids[0]).await.unwrap());
        assert_eq!(catalog.get(ids[0]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_products_cascades_embeddings() {
        let (catalog, dispensary, ids) = seeded().await;
        catalog.upsert(ids[0], vec![1.0], "m").await.unwrap();

        let new_ids = catalog
            .replace_products(dispensary, vec![NewProduct::new("Blue Dream", "$30.00")])
            .await
            .unwrap();

        assert_eq!(new_ids.len(), 1);
        assert!(catalog.embedded_products().await.unwrap().is_empty());
        assert_eq!(catalog.product_ids().await.unwrap(), new_ids);

        let dispensaries = catalog.dispensaries().await;
        assert!(dispensaries[0].last_scraped_at.is_some());
    }

    #[tokio::test]
    async fn test_recent_errors_newest_first() {
        let catalog = JsonCatalog::in_memory();
        for message in ["first", "second", "third"] {
            catalog.log_scrape_error(message, None, None).await.unwrap();
        }

        let recent = catalog.recent_errors(2).await;
        let messages: Vec<&str> = recent.iter().map(|e| e.error_message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn test_stats() {
        let (catalog, _, ids) = seeded().await;
        catalog.upsert(ids[2], vec![1.0], "m").await.unwrap();

        assert_eq!(
            catalog.stats().await,
            CatalogStats {
                dispensaries: 1,
                products: 3,
                embedded: 1,
                missing: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let vector = vec![0.25, -1.5, 3.0e-7];

        let product_id = {
            let catalog = JsonCatalog::open(temp_dir.path()).await.unwrap();
            let dispensary = catalog
                .get_or_insert_dispensary("Green Leaf", "https://greenleaf.example/menu")
                .await
                .unwrap();
            let ids = catalog
                .insert_products(
                    dispensary,
                    vec![NewProduct::new("Blue Dream", "$35.00").with_weight("3.5g")],
                )
                .await
                .unwrap();
            catalog.upsert(ids[0], vector.clone(), "model-a").await.unwrap();
            catalog
                .log_scrape_error("timeout", Some("https://x"), Some(dispensary))
                .await
                .unwrap();
            ids[0]
        };

        let catalog = JsonCatalog::open(temp_dir.path()).await.unwrap();
        let listing = catalog.product(product_id).await.unwrap().unwrap();
        assert_eq!(listing.product_name, "Blue Dream");
        assert_eq!(listing.weight_or_size.as_deref(), Some("3.5g"));
        assert_eq!(listing.dispensary_name, "Green Leaf");

        let record = catalog.get_record(product_id).await.unwrap().unwrap();
        assert_eq!(record.vector, vector);
        assert_eq!(record.model_tag, "model-a");
        assert_eq!(catalog.recent_errors(10).await.len(), 1);
        assert!(temp_dir.path().join(EMBEDDINGS_FILE).exists());
    }

    #[tokio::test]
    async fn test_products_for_dispensary() {
        let (catalog, dispensary, _) = seeded().await;
        let other = catalog
            .get_or_insert_dispensary("Canna Co", "https://canna.example/menu")
            .await
            .unwrap();
        catalog
            .insert_products(other, vec![NewProduct::new("Wedding Cake", "$45.00")])
            .await
            .unwrap();

        let names: Vec<String> = catalog
            .products_for_dispensary(dispensary)
            .await
            .into_iter()
            .map(|p| p.product_name)
            .collect();
        assert_eq!(names, vec!["Blue Dream", "Mango Gummies", "Sour Diesel Cart"]);

        let other_products = catalog.products_for_dispensary(other).await;
        assert_eq!(other_products.len(), 1);
        assert_eq!(other_products[0].dispensary_name, "Canna Co");
        assert!(catalog.products_for_dispensary(999).await.is_empty());
    }

    async fn open_with_product(dir: &Path) -> (JsonCatalog, DispensaryId, ProductId) {
        let catalog = JsonCatalog::open(dir).await.unwrap();
        let dispensary = catalog
            .get_or_insert_dispensary("Green Leaf", "https://greenleaf.example/menu")
            .await
            .unwrap();
        let ids = catalog
            .insert_products(dispensary, vec![NewProduct::new("Blue Dream", "$35.00")])
            .await
            .unwrap();
        (catalog, dispensary, ids[0])
    }

    /// A directory at the temp path makes the next write of `file_name` fail.
    async fn block_writes(dir: &Path, file_name: &str) -> PathBuf {
        let blocker = dir.join(file_name).with_extension("json.tmp");
        fs::create_dir(&blocker).await.unwrap();
        blocker
    }

    #[tokio::test]
    async fn test_failed_upsert_write_leaves_product_missing() {
        let temp_dir = TempDir::new().unwrap();
        let (catalog, _, product_id) = open_with_product(temp_dir.path()).await;
        let blocker = block_writes(temp_dir.path(), EMBEDDINGS_FILE).await;

        let err = catalog.upsert(product_id, vec![1.0, 0.0], "m").await.unwrap_err();
        assert!(matches!(err, CatalogError::Storage(StorageError::WriteFile(_))));
        assert_eq!(catalog.get(product_id).await.unwrap(), None);
        assert_eq!(catalog.list_missing(None).await.unwrap(), vec![product_id]);

        fs::remove_dir(&blocker).await.unwrap();
        catalog.upsert(product_id, vec![1.0, 0.0], "m").await.unwrap();
        assert!(catalog.list_missing(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_products_and_embeddings() {
        let temp_dir = TempDir::new().unwrap();
        let (catalog, dispensary, product_id) = open_with_product(temp_dir.path()).await;
        catalog.upsert(product_id, vec![1.0], "m").await.unwrap();
        block_writes(temp_dir.path(), EMBEDDINGS_FILE).await;

        assert!(catalog.clear_products_for_dispensary(dispensary).await.is_err());
        assert_eq!(catalog.product_ids().await.unwrap(), vec![product_id]);
        assert_eq!(catalog.get(product_id).await.unwrap(), Some(vec![1.0]));

        let reopened = JsonCatalog::open(temp_dir.path()).await.unwrap();
        assert_eq!(reopened.product_ids().await.unwrap(), vec![product_id]);
        assert_eq!(reopened.get(product_id).await.unwrap(), Some(vec![1.0]));
    }

    #[tokio::test]
    async fn test_open_drops_embeddings_without_products() {
        let temp_dir = TempDir::new().unwrap();
        let (catalog, dispensary, product_id) = open_with_product(temp_dir.path()).await;
        catalog.upsert(product_id, vec![1.0], "m").await.unwrap();
        drop(catalog);

        // Products removed on disk while their embedding stayed behind.
        fs::write(temp_dir.path().join(PRODUCTS_FILE), "[]").await.unwrap();

        let catalog = JsonCatalog::open(temp_dir.path()).await.unwrap();
        assert_eq!(catalog.stats().await.embedded, 0);
        let on_disk = fs::read_to_string(temp_dir.path().join(EMBEDDINGS_FILE))
            .await
            .unwrap();
        assert_eq!(on_disk, "[]");

        let ids = catalog
            .insert_products(dispensary, vec![NewProduct::new("Mango Gummies", "$20.00")])
            .await
            .unwrap();
        assert_eq!(ids, vec![product_id]);
        assert_eq!(catalog.get(product_id).await.unwrap(), None);
        assert_eq!(catalog.list_missing(None).await.unwrap(), vec![product_id]);
    }
}
