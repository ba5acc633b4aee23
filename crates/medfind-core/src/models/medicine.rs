//! Medicine catalog models.

use serde::{Deserialize, Serialize};

/// Maximum number of substitutes kept per medicine.
pub const MAX_SUBSTITUTES: usize = 5;

/// Maximum number of uses kept per medicine.
pub const MAX_USES: usize = 5;

/// A single medicine in the reference catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicineRecord {
    /// Row identifier from the dataset, when present
    pub id: Option<String>,
    /// Normalized (trimmed, lowercase) name - unique within the catalog
    pub name: String,
    /// Substitute medicines, in dataset column order
    pub substitutes: Vec<String>,
    /// Therapeutic uses, in dataset column order
    pub uses: Vec<String>,
    /// Known side effects
    pub side_effects: Vec<String>,
    pub chemical_class: String,
    pub habit_forming: String,
    pub therapeutic_class: String,
    pub action_class: String,
}

impl MedicineRecord {
    /// Create a record with only a name; classification fields take their defaults.
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: normalize_name(name),
            substitutes: Vec::new(),
            uses: Vec::new(),
            side_effects: Vec::new(),
            chemical_class: "NA".into(),
            habit_forming: "No".into(),
            therapeutic_class: "NA".into(),
            action_class: "NA".into(),
        }
    }

    /// Builder-style setter for substitutes, capped at [`MAX_SUBSTITUTES`].
    pub fn with_substitutes<I, S>(mut self, substitutes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.substitutes = substitutes
            .into_iter()
            .map(Into::into)
            .take(MAX_SUBSTITUTES)
            .collect();
        self
    }

    /// Builder-style setter for uses, capped at [`MAX_USES`].
    pub fn with_uses<I, S>(mut self, uses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses = uses.into_iter().map(Into::into).take(MAX_USES).collect();
        self
    }
}

/// Normalize a medicine name: trim, lowercase, collapse inner whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let record = MedicineRecord::new("  Paracetamol 500mg ");
        assert_eq!(record.name, "paracetamol 500mg");
        assert_eq!(record.chemical_class, "NA");
        assert_eq!(record.habit_forming, "No");
    }

    #[test]
    fn test_substitutes_capped() {
        let record = MedicineRecord::new("x").with_substitutes(["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(record.substitutes.len(), MAX_SUBSTITUTES);
        assert_eq!(record.substitutes[0], "a");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Dolo   650\tTablet "), "dolo 650 tablet");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_serializes_camel_case() {
        let record = MedicineRecord::new("crocin");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("sideEffects").is_some());
        assert!(json.get("therapeuticClass").is_some());
    }
}
