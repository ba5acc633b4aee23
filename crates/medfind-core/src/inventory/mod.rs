//! Geospatial inventory query.
//!
//! The pharmacy store owns pharmacies and their stock. The resolver only
//! needs two query primitives from it: a distance-ordered proximity query
//! with a pre-filter, and a plain filtered scan.

mod sqlite;

pub use sqlite::SqlitePharmacyStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{GeoPoint, InventoryFilter, InventoryMatch};

/// Default search radius in meters.
pub const DEFAULT_RADIUS_M: f64 = 50_000.0;

/// Default maximum number of pharmacies returned by a stock search.
pub const DEFAULT_STOCK_LIMIT: usize = 20;

/// Pharmacy store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Query interface of the pharmacy store.
#[async_trait]
pub trait PharmacyStore: Send + Sync {
    /// Pharmacies within `max_distance_m` of `center` that have in-stock lines
    /// matching `filter`, nearest first, each annotated with its distance.
    async fn near(
        &self,
        filter: &InventoryFilter,
        center: GeoPoint,
        max_distance_m: f64,
        limit: usize,
    ) -> StoreResult<Vec<InventoryMatch>>;

    /// Pharmacies with in-stock lines matching `filter`, in store order,
    /// without distances.
    async fn find(&self, filter: &InventoryFilter, limit: usize)
        -> StoreResult<Vec<InventoryMatch>>;
}

/// Find pharmacies stocking `filter`, ordered by distance when a center is given.
pub async fn find_stock(
    store: &dyn PharmacyStore,
    filter: &InventoryFilter,
    center: Option<GeoPoint>,
    radius_m: f64,
    limit: usize,
) -> StoreResult<Vec<InventoryMatch>> {
    if filter.needle().is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    match center {
        Some(center) => store.near(filter, center, radius_m, limit).await,
        None => store.find(filter, limit).await,
    }
}
