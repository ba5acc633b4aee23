//! CLI command handlers.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use medfind_core::catalog::Catalog;
use medfind_core::embedding::EmbeddingCache;
use medfind_core::models::{GeoPoint, InventoryItem, Pharmacy};
use medfind_core::resolver::Resolver;
use medfind_core::SqlitePharmacyStore;

use crate::config::{Commands, Settings};
use crate::http::{router, AppState};

pub async fn run(settings: &Settings, command: &Commands) -> Result<()> {
    match command {
        Commands::Serve { bind } => serve(settings, *bind).await,
        Commands::WarmCache { limit } => {
            let report = warm_cache(settings, *limit).await?;
            println!(
                "Embedded {} names ({} failed, {} already cached)",
                report.computed, report.failed, report.already_cached
            );
            Ok(())
        }
        Commands::Seed { file } => {
            let report = seed(settings, file)?;
            println!(
                "Seeded {} pharmacies with {} stock lines ({} pharmacies in store)",
                report.pharmacies, report.items, report.total_pharmacies
            );
            Ok(())
        }
    }
}

fn open_store(settings: &Settings) -> Result<SqlitePharmacyStore> {
    SqlitePharmacyStore::open(&settings.db)
        .with_context(|| format!("failed to open pharmacy database {}", settings.db.display()))
}

fn open_cache(settings: &Settings) -> Result<EmbeddingCache> {
    let provider = settings
        .embedding_provider()
        .context("failed to configure embedding provider")?;
    let model = provider.model().to_string();
    let cache = EmbeddingCache::open(&settings.embedding_cache, provider)
        .with_timeout(settings.provider_timeout());
    info!(
        model = %model,
        path = %cache.path().display(),
        entries = cache.len(),
        dimension = ?cache.dimension(),
        "Embedding cache ready"
    );
    Ok(cache)
}

/// Build the resolver and start loading the catalog behind it.
pub fn build_resolver(settings: &Settings) -> Result<Resolver> {
    let store = open_store(settings)?;
    let cache = open_cache(settings)?;
    let resolver = Resolver::new(Arc::new(store), cache, settings.resolver_config());
    // Detached: requests are served from an empty catalog until it lands.
    drop(resolver.load_catalog(settings.dataset.clone()));
    Ok(resolver)
}

/// Run the HTTP API until interrupted.
pub async fn serve(settings: &Settings, bind: SocketAddr) -> Result<()> {
    let resolver = build_resolver(settings)?;
    let cache = resolver.embeddings().clone();

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(AppState::new(resolver)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    cache.close().await.context("failed to flush embedding cache")?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Outcome of a cache warm-up run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub computed: usize,
    pub failed: usize,
    pub already_cached: usize,
}

/// Embed catalog names missing from the cache, one at a time.
pub async fn warm_cache(settings: &Settings, limit: Option<usize>) -> Result<WarmReport> {
    let catalog = Catalog::load(&settings.dataset)
        .with_context(|| format!("failed to load dataset {}", settings.dataset.display()))?;
    let cache = open_cache(settings)?;
    let report = warm(&catalog, &cache, limit).await;
    cache.close().await.context("failed to flush embedding cache")?;
    Ok(report)
}

async fn warm(catalog: &Catalog, cache: &EmbeddingCache, limit: Option<usize>) -> WarmReport {
    let mut report = WarmReport::default();
    let (cached, missing): (Vec<&str>, Vec<&str>) = catalog.names().partition(|n| cache.contains(n));
    report.already_cached = cached.len();

    for name in missing.into_iter().take(limit.unwrap_or(usize::MAX)) {
        match cache.get_or_compute(name).await {
            Some(_) => report.computed += 1,
            None => report.failed += 1,
        }
    }
    info!(
        computed = report.computed,
        failed = report.failed,
        already_cached = report.already_cached,
        "Embedding cache warmed"
    );
    report
}

/// One pharmacy in a seed file.
#[derive(Debug, Deserialize)]
struct SeedPharmacy {
    id: Option<String>,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    location: GeoPoint,
    #[serde(default)]
    inventory: Vec<InventoryItem>,
}

impl SeedPharmacy {
    fn into_parts(self) -> (Pharmacy, Vec<InventoryItem>) {
        let mut pharmacy = Pharmacy::new(self.name, self.location);
        if let Some(id) = self.id {
            pharmacy.id = id;
        }
        pharmacy.address = self.address;
        pharmacy.phone = self.phone;
        (pharmacy, self.inventory)
    }
}

/// Outcome of a seed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub pharmacies: usize,
    pub items: usize,
    /// Pharmacies in the store afterwards, including earlier seeds.
    pub total_pharmacies: usize,
}

/// Load pharmacies and stock from a JSON file. Each pharmacy is written
/// atomically with its stock; the first rejected entry stops the run.
pub fn seed(settings: &Settings, file: &Path) -> Result<SeedReport> {
    let store = open_store(settings)?;
    seed_store(&store, file)
}

fn seed_store(store: &SqlitePharmacyStore, file: &Path) -> Result<SeedReport> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read seed file {}", file.display()))?;
    let entries: Vec<SeedPharmacy> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid seed file {}", file.display()))?;

    let mut report = SeedReport::default();
    for entry in entries {
        let (pharmacy, stock) = entry.into_parts();
        store
            .seed_pharmacy(&pharmacy, &stock)
            .with_context(|| format!("failed to seed pharmacy {}", pharmacy.name))?;
        report.pharmacies += 1;
        report.items += stock.len();
    }
    report.total_pharmacies = store
        .pharmacy_count()
        .context("failed to count pharmacies")?;
    info!(
        pharmacies = report.pharmacies,
        items = report.items,
        total = report.total_pharmacies,
        "Seeded pharmacy store"
    );
    Ok(report)
}
