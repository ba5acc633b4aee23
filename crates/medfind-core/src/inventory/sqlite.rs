//! SQLite-backed pharmacy store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PharmacyStore, StoreError, StoreResult};
use crate::db::{Database, DbResult, StockRow};
use crate::geo::{haversine_distance_m, BoundingBox};
use crate::models::{GeoPoint, InventoryFilter, InventoryItem, InventoryMatch, Pharmacy};

/// Pharmacy store over a SQLite database.
///
/// Queries run on the blocking thread pool; the connection is shared behind
/// a mutex.
#[derive(Clone)]
pub struct SqlitePharmacyStore {
    db: Arc<Mutex<Database>>,
}

impl SqlitePharmacyStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// In-memory store (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Add or update a pharmacy together with its stock lines. A rejected
    /// line leaves the store unchanged.
    pub fn seed_pharmacy(&self, pharmacy: &Pharmacy, items: &[InventoryItem]) -> DbResult<()> {
        self.db.lock().seed_pharmacy(pharmacy, items)
    }

    /// Number of pharmacies in the store.
    pub fn pharmacy_count(&self) -> DbResult<usize> {
        self.db.lock().count_pharmacies()
    }

    /// Run a closure against the database on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("query task failed: {}", e)))?
        .map_err(StoreError::from)
    }
}

#[async_trait]
impl PharmacyStore for SqlitePharmacyStore {
    async fn near(
        &self,
        filter: &InventoryFilter,
        center: GeoPoint,
        max_distance_m: f64,
        limit: usize,
    ) -> StoreResult<Vec<InventoryMatch>> {
        let filter = filter.clone();
        let bbox = BoundingBox::around(center, max_distance_m);
        let rows = self
            .with_db(move |db| db.stock_candidates(&filter, Some(&bbox)))
            .await?;
        Ok(order_by_distance(rows, center, max_distance_m, limit))
    }

    async fn find(
        &self,
        filter: &InventoryFilter,
        limit: usize,
    ) -> StoreResult<Vec<InventoryMatch>> {
        let filter = filter.clone();
        let rows = self
            .with_db(move |db| db.stock_candidates(&filter, None))
            .await?;
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|row| InventoryMatch {
                pharmacy: row.pharmacy,
                distance: None,
                items: row.items,
            })
            .collect())
    }
}

/// Keep rows within the radius, nearest first. Equal distances keep store order.
fn order_by_distance(
    rows: Vec<StockRow>,
    center: GeoPoint,
    max_distance_m: f64,
    limit: usize,
) -> Vec<InventoryMatch> {
    let mut matches: Vec<InventoryMatch> = rows
        .into_iter()
        .filter_map(|row| {
            let distance = haversine_distance_m(center, row.pharmacy.location);
            (distance <= max_distance_m).then(|| InventoryMatch {
                pharmacy: row.pharmacy,
                distance: Some(distance),
                items: row.items,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(limit);
    matches
}
