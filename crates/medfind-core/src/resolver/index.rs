//! Catalog snapshot shared by every request.
//!
//! The catalog and its fuzzy index are built together, off the request path,
//! and published as a single `Arc`. Until the first publish, readers see an
//! empty snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::fuzzy::FuzzyIndex;
use crate::catalog::Catalog;

/// Catalog plus the fuzzy index built over it.
pub struct SearchIndex {
    catalog: Catalog,
    fuzzy: FuzzyIndex,
}

impl SearchIndex {
    pub fn build(catalog: Catalog, fuzzy_threshold: f64) -> Self {
        let fuzzy = FuzzyIndex::build(&catalog, fuzzy_threshold);
        Self { catalog, fuzzy }
    }

    pub fn empty() -> Self {
        Self {
            catalog: Catalog::empty(),
            fuzzy: FuzzyIndex::empty(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn fuzzy(&self) -> &FuzzyIndex {
        &self.fuzzy
    }
}

/// Swappable handle to the current [`SearchIndex`].
#[derive(Clone)]
pub struct SharedIndex {
    current: Arc<RwLock<Arc<SearchIndex>>>,
}

impl SharedIndex {
    /// A handle whose snapshot is empty until something is published.
    pub fn empty() -> Self {
        Self::new(SearchIndex::empty())
    }

    pub fn new(index: SearchIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The current snapshot. Holding it never blocks a publish.
    pub fn snapshot(&self) -> Arc<SearchIndex> {
        Arc::clone(&self.current.read())
    }

    /// Replace the snapshot for all subsequent readers.
    pub fn publish(&self, index: SearchIndex) {
        *self.current.write() = Arc::new(index);
    }

    /// True once a non-empty catalog has been published.
    pub fn is_ready(&self) -> bool {
        !self.current.read().catalog.is_empty()
    }

    /// Load the dataset on the blocking pool and publish it when built.
    ///
    /// A dataset that can't be read publishes nothing; the empty snapshot stays.
    pub fn load_in_background(&self, path: impl Into<PathBuf>, fuzzy_threshold: f64) -> JoinHandle<()> {
        let shared = self.clone();
        let path = path.into();
        tokio::task::spawn_blocking(move || match Catalog::load(&path) {
            Ok(catalog) => {
                let medicines = catalog.len();
                shared.publish(SearchIndex::build(catalog, fuzzy_threshold));
                info!(medicines, "Search index ready");
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Medicine dataset not loaded; fuzzy and semantic tiers stay empty"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicineRecord;
    use std::io::Write;

    #[test]
    fn test_snapshot_survives_publish() {
        let shared = SharedIndex::empty();
        let before = shared.snapshot();
        assert!(!shared.is_ready());

        let catalog = Catalog::from_records([MedicineRecord::new("paracetamol")]);
        shared.publish(SearchIndex::build(catalog, 0.3));

        assert!(before.catalog().is_empty());
        assert_eq!(shared.snapshot().catalog().len(), 1);
        assert_eq!(shared.snapshot().fuzzy().len(), 1);
        assert!(shared.is_ready());
    }

    #[tokio::test]
    async fn test_load_in_background() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,substitute0").unwrap();
        writeln!(file, "Paracetamol,Crocin").unwrap();
        writeln!(file, "Cetirizine,Okacet").unwrap();

        let shared = SharedIndex::empty();
        shared.load_in_background(file.path(), 0.3).await.unwrap();

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.catalog().len(), 2);
        assert!(!snapshot.fuzzy().search("paracetmol", 5).is_empty());
    }

    #[tokio::test]
    async fn test_missing_dataset_keeps_empty_snapshot() {
        let shared = SharedIndex::empty();
        shared
            .load_in_background("/nonexistent/medicine_dataset.csv", 0.3)
            .await
            .unwrap();
        assert!(!shared.is_ready());
    }
}
