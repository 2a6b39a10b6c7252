use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use menuscout_catalog::{DispensaryId, JsonCatalog, NewProduct, ProductId, ProductRepository};
use menuscout_embeddings::RateLimiter;
use menuscout_search::{
    EmbeddingOrchestrator, SearchConfig, SimilarProduct, SimilarityEngine, SimilarityQuery,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default cap on products per bulk run.
const DEFAULT_BATCH_LIMIT: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "menuscout")]
#[command(about = "Embeddings and similarity search for dispensary menus")]
#[command(version)]
struct Cli {
    /// Catalog directory (overrides DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace a dispensary's products with a scraped menu (JSON array)
    Import {
        /// Dispensary display name
        #[arg(long)]
        dispensary: String,

        /// Menu page URL identifying the dispensary
        #[arg(long)]
        menu_url: String,

        /// Scraper output file
        file: PathBuf,
    },
    /// Embed products that have no embedding yet
    Backfill {
        /// Maximum products to process
        #[arg(long, default_value_t = DEFAULT_BATCH_LIMIT)]
        limit: usize,

        /// Ignore --limit and process everything
        #[arg(long)]
        all: bool,
    },
    /// Re-embed products, e.g. after changing EMBEDDING_MODEL
    Regenerate {
        /// Maximum products to process
        #[arg(long, default_value_t = DEFAULT_BATCH_LIMIT)]
        limit: usize,

        /// Ignore --limit and process everything
        #[arg(long)]
        all: bool,
    },
    /// Embed a single product
    Embed {
        product_id: ProductId,
    },
    /// Find products matching free text
    Search {
        text: String,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Find products similar to a stored product
    Similar {
        product_id: ProductId,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        threshold: Option<f32>,

        /// Spread results across dispensaries
        #[arg(long)]
        cross_dispensary: bool,

        /// Leave out one dispensary's products
        #[arg(long)]
        exclude_dispensary: Option<DispensaryId>,
    },
    /// Show catalog and embedding counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = SearchConfig::from_env()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let catalog = Arc::new(JsonCatalog::open(&config.data_dir).await?);
    run(cli.command, &config, catalog).await
}

async fn run(command: Command, config: &SearchConfig, catalog: Arc<JsonCatalog>) -> Result<()> {
    match command {
        Command::Import {
            dispensary,
            menu_url,
            file,
        } => import(&catalog, &dispensary, &menu_url, &file).await,
        Command::Backfill { limit, all } => {
            let stored = orchestrator(config, catalog)
                .backfill_missing(limit, all)
                .await?;
            println!("Stored {stored} new embeddings");
            Ok(())
        }
        Command::Regenerate { limit, all } => {
            let stored = orchestrator(config, catalog)
                .regenerate_all(limit, all)
                .await?;
            println!("Regenerated {stored} embeddings");
            Ok(())
        }
        Command::Embed { product_id } => {
            if orchestrator(config, catalog)
                .generate_embedding_for_product(product_id)
                .await
            {
                println!("Embedded product {product_id}");
                Ok(())
            } else {
                bail!("could not embed product {product_id}")
            }
        }
        Command::Search {
            text,
            limit,
            threshold,
        } => {
            let engine = SimilarityEngine::new(catalog, config.embedding.client());
            let results = engine
                .find_similar_by_text(
                    &text,
                    limit.unwrap_or(config.similarity.limit),
                    threshold.unwrap_or(config.similarity.threshold),
                )
                .await?;
            print_results(&results);
            Ok(())
        }
        Command::Similar {
            product_id,
            limit,
            threshold,
            cross_dispensary,
            exclude_dispensary,
        } => {
            if catalog.product(product_id).await?.is_none() {
                bail!("product {product_id} not found");
            }

            let mut query = SimilarityQuery::new(
                limit.unwrap_or(config.similarity.limit),
                threshold.unwrap_or(config.similarity.threshold),
            )
            .with_cross_dispensary(cross_dispensary);
            if let Some(dispensary_id) = exclude_dispensary {
                query = query.excluding_dispensary(dispensary_id);
            }

            let engine = SimilarityEngine::new(catalog, config.embedding.client());
            let results = engine.find_similar_to_product(product_id, query).await?;
            print_results(&results);
            Ok(())
        }
        Command::Status => {
            let stats = catalog.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            for dispensary in catalog.dispensaries().await {
                let products = catalog.products_for_dispensary(dispensary.id).await;
                println!("{}: {} products", dispensary.name, products.len());
            }
            for error in catalog.recent_errors(5).await {
                println!(
                    "{} {}: {}",
                    error.log_time.to_rfc3339(),
                    error.url.as_deref().unwrap_or("-"),
                    error.error_message
                );
            }
            Ok(())
        }
    }
}

fn orchestrator(
    config: &SearchConfig,
    catalog: Arc<JsonCatalog>,
) -> EmbeddingOrchestrator<JsonCatalog> {
    EmbeddingOrchestrator::new(
        catalog,
        config.embedding.client(),
        Arc::new(RateLimiter::new(config.rate_limit)),
    )
}

async fn import(catalog: &JsonCatalog, name: &str, menu_url: &str, file: &Path) -> Result<()> {
    let dispensary_id = catalog.get_or_insert_dispensary(name, menu_url).await?;

    let products = match read_products(file).await {
        Ok(products) => products,
        Err(e) => {
            let message = format!("{e:#}");
            catalog
                .log_scrape_error(&message, Some(menu_url), Some(dispensary_id))
                .await?;
            return Err(e);
        }
    };

    let ids = catalog.replace_products(dispensary_id, products).await?;
    info!("Imported {} products for {name}", ids.len());
    Ok(())
}

async fn read_products(file: &Path) -> Result<Vec<NewProduct>> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid menu file {}", file.display()))
}

fn print_results(results: &[SimilarProduct]) {
    if results.is_empty() {
        println!("No similar products found.");
        return;
    }

    for (rank, result) in results.iter().enumerate() {
        let listing = &result.listing;
        let size = listing
            .weight_or_size
            .as_deref()
            .map(|w| format!(" ({w})"))
            .unwrap_or_default();
        println!(
            "{}. [{:.3}] {}{size} {} @ {} (product {})",
            rank + 1,
            result.score,
            listing.product_name,
            listing.price,
            listing.dispensary_name,
            listing.id
        );
    }
}
