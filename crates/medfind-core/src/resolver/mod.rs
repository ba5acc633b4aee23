//! Tiered medicine resolution.
//!
//! Pipeline: Inventory → Fuzzy → Semantic → None
//!
//! Each tier runs only when every tier before it came up empty, and the first
//! non-empty tier answers. Nothing is carried between requests except the
//! embedding cache.

mod fuzzy;
mod index;
mod semantic;

pub use fuzzy::*;
pub use index::*;
pub use semantic::*;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingCache;
use crate::inventory::{find_stock, PharmacyStore, DEFAULT_RADIUS_M, DEFAULT_STOCK_LIMIT};
use crate::models::{
    normalize_name, GeoPoint, InventoryFilter, InventoryMatch, Resolution, ResolutionResult,
    Suggestion, Tier,
};

/// Resolver errors.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Tunables for the resolution pipeline.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Inventory search radius in meters
    pub radius_m: f64,
    /// Maximum pharmacies returned by the inventory tier
    pub stock_limit: usize,
    /// Maximum suggestions returned by the fuzzy and semantic tiers
    pub suggestion_limit: usize,
    /// Maximum fuzzy distance, applied when the catalog index is built
    pub fuzzy_threshold: f64,
    /// Maximum pharmacies returned by an exact-name stock lookup
    pub pharmacy_lookup_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_M,
            stock_limit: DEFAULT_STOCK_LIMIT,
            suggestion_limit: DEFAULT_FUZZY_LIMIT,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            pharmacy_lookup_limit: 10,
        }
    }
}

/// Main resolver that coordinates the tiers.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn PharmacyStore>,
    index: SharedIndex,
    embeddings: EmbeddingCache,
    config: ResolverConfig,
}

impl Resolver {
    /// Create a resolver with an empty catalog snapshot.
    pub fn new(
        store: Arc<dyn PharmacyStore>,
        embeddings: EmbeddingCache,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            index: SharedIndex::empty(),
            embeddings,
            config,
        }
    }

    /// Use an existing index handle instead of an empty one.
    pub fn with_index(mut self, index: SharedIndex) -> Self {
        self.index = index;
        self
    }

    /// Load the medicine dataset in the background. Requests made before it
    /// finishes see an empty catalog.
    pub fn load_catalog(&self, path: impl Into<PathBuf>) -> JoinHandle<()> {
        self.index
            .load_in_background(path, self.config.fuzzy_threshold)
    }

    /// Resolve a medicine query, optionally around a location.
    pub async fn resolve(&self, query: &str, center: Option<GeoPoint>) -> ResolverResult<Resolution> {
        let query = normalize_query(query)?;
        let center = validate_center(center)?;
        Ok(self.run(query, center, Tier::Inventory).await)
    }

    /// Alternatives for a medicine name, skipping the inventory tier.
    pub async fn suggest(&self, query: &str) -> ResolverResult<Resolution> {
        let query = normalize_query(query)?;
        Ok(self.run(query, None, Tier::Fuzzy).await)
    }

    /// Pharmacies stocking exactly `medicine`, nearest first when a center is
    /// given.
    pub async fn pharmacy_stock(
        &self,
        medicine: &str,
        center: Option<GeoPoint>,
    ) -> ResolverResult<Vec<InventoryMatch>> {
        let medicine = normalize_query(medicine)?;
        let center = validate_center(center)?;
        let filter = InventoryFilter::exact(&medicine);
        Ok(self
            .stock(&filter, center, self.config.pharmacy_lookup_limit)
            .await)
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn embeddings(&self) -> &EmbeddingCache {
        &self.embeddings
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    async fn run(&self, query: String, center: Option<GeoPoint>, start: Tier) -> Resolution {
        let snapshot = self.index.snapshot();
        let mut visited = Vec::new();
        let mut state = start;

        let result = loop {
            visited.push(state);
            let outcome = match state {
                Tier::Inventory => self.inventory_tier(&query, center).await,
                Tier::Fuzzy => self.fuzzy_tier(&snapshot, &query),
                Tier::Semantic => self.semantic_tier(&snapshot, &query).await,
                Tier::None => break ResolutionResult::None,
            };
            match outcome {
                Some(result) => break result,
                None => {
                    debug!(query = %query, from = %state, to = %state.next(), "Tier empty; falling through");
                    state = state.next();
                }
            }
        };

        info!(query = %query, tier = %result.tier(), attempted = visited.len(), "Resolved query");
        Resolution {
            query,
            result,
            visited,
        }
    }

    async fn inventory_tier(&self, query: &str, center: Option<GeoPoint>) -> Option<ResolutionResult> {
        let filter = InventoryFilter::contains(query);
        let matches = self.stock(&filter, center, self.config.stock_limit).await;
        (!matches.is_empty()).then_some(ResolutionResult::Inventory { matches })
    }

    fn fuzzy_tier(&self, snapshot: &SearchIndex, query: &str) -> Option<ResolutionResult> {
        let catalog = snapshot.catalog();
        let matches: Vec<Suggestion> = snapshot
            .fuzzy()
            .search(query, self.config.suggestion_limit)
            .into_iter()
            .filter_map(|m| catalog.get(m.index))
            .map(Suggestion::from_record)
            .collect();
        (!matches.is_empty()).then_some(ResolutionResult::Fuzzy { matches })
    }

    async fn semantic_tier(&self, snapshot: &SearchIndex, query: &str) -> Option<ResolutionResult> {
        let catalog = snapshot.catalog();
        if catalog.is_empty() {
            debug!("Catalog not loaded; skipping semantic ranking");
            return None;
        }

        // Failures are logged by the cache.
        let query_vector = self.embeddings.get_or_compute(query).await?;

        let ranked = self.embeddings.with_vectors(|vectors| {
            rank(
                &query_vector,
                catalog.names(),
                |name| vectors.get(name).map(Vec::as_slice),
                self.config.suggestion_limit,
            )
        });

        let matches: Vec<Suggestion> = ranked
            .into_iter()
            .filter_map(|m| {
                catalog
                    .get(m.index)
                    .map(|record| Suggestion::with_similarity(record, m.similarity))
            })
            .collect();
        (!matches.is_empty()).then_some(ResolutionResult::Semantic { matches })
    }

    /// Stock query where a store failure reads as "nothing stocked".
    async fn stock(
        &self,
        filter: &InventoryFilter,
        center: Option<GeoPoint>,
        limit: usize,
    ) -> Vec<InventoryMatch> {
        match find_stock(self.store.as_ref(), filter, center, self.config.radius_m, limit).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(medicine = filter.needle(), error = %e, "Pharmacy store query failed");
                Vec::new()
            }
        }
    }
}

fn normalize_query(query: &str) -> ResolverResult<String> {
    let query = normalize_name(query);
    if query.is_empty() {
        return Err(ResolverError::InvalidInput("query must not be empty".into()));
    }
    Ok(query)
}

fn validate_center(center: Option<GeoPoint>) -> ResolverResult<Option<GeoPoint>> {
    match center {
        Some(point) if !point.is_valid() => Err(ResolverError::InvalidInput(format!(
            "coordinates out of range: lat={}, lng={}",
            point.lat, point.lng
        ))),
        other => Ok(other),
    }
}
