//! Medicine catalog store.
//!
//! The catalog is loaded once from the static dataset and never mutated
//! afterwards. Record order is dataset order, and that order is what every
//! tie-break in the resolver falls back to.

mod dataset;

pub use dataset::read_records;

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::models::{normalize_name, MedicineRecord};

/// Catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Dataset unavailable: {0}")]
    DatasetUnavailable(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset is missing required column: {0}")]
    MissingColumn(&'static str),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Immutable in-memory medicine catalog.
#[derive(Debug, Default)]
pub struct Catalog {
    records: Vec<MedicineRecord>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from records. A repeated name keeps its first record.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MedicineRecord>,
    {
        let mut catalog = Self::default();
        for record in records {
            if catalog.by_name.contains_key(&record.name) {
                continue;
            }
            catalog
                .by_name
                .insert(record.name.clone(), catalog.records.len());
            catalog.records.push(record);
        }
        catalog
    }

    /// Load the catalog from a CSV dataset.
    pub fn load<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let file = File::open(path.as_ref())?;
        let records = read_records(file)?;
        let catalog = Self::from_records(records);
        info!(
            path = %path.as_ref().display(),
            medicines = catalog.len(),
            "Loaded medicine catalog"
        );
        Ok(catalog)
    }

    /// Look up a medicine by name (normalized before lookup).
    pub fn lookup(&self, name: &str) -> Option<&MedicineRecord> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&i| &self.records[i])
    }

    /// Record at a catalog position.
    pub fn get(&self, index: usize) -> Option<&MedicineRecord> {
        self.records.get(index)
    }

    /// All records in catalog order.
    pub fn records(&self) -> &[MedicineRecord] {
        &self.records
    }

    /// All names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup_normalizes() {
        let catalog = Catalog::from_records([
            MedicineRecord::new("paracetamol"),
            MedicineRecord::new("ibuprofen"),
        ]);
        assert_eq!(catalog.lookup("  Paracetamol ").unwrap().name, "paracetamol");
        assert!(catalog.lookup("aspirin").is_none());
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let first = MedicineRecord::new("crocin").with_uses(["fever"]);
        let second = MedicineRecord::new("Crocin").with_uses(["pain"]);
        let catalog = Catalog::from_records([first, second]);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("crocin").unwrap().uses, vec!["fever"]);
    }

    #[test]
    fn test_missing_dataset_is_unavailable() {
        let result = Catalog::load("/nonexistent/medicine_dataset.csv");
        assert!(matches!(result, Err(CatalogError::DatasetUnavailable(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,use0").unwrap();
        writeln!(file, "Dolo 650 Tablet,Fever").unwrap();
        writeln!(file, "Crocin Advance Tablet,Headache").unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["dolo 650 tablet", "crocin advance tablet"]);
    }
}
