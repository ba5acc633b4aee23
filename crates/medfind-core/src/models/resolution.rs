//! Resolution result models for the tiered search pipeline.

use serde::{Deserialize, Serialize};

use super::{InventoryMatch, MedicineRecord};

/// The resolution strategies, in the order they are attempted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Nearby pharmacy stock
    Inventory,
    /// Typo-tolerant catalog name match
    Fuzzy,
    /// Embedding similarity over the catalog
    Semantic,
    /// Nothing matched
    None,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Inventory => "inventory",
            Tier::Fuzzy => "fuzzy",
            Tier::Semantic => "semantic",
            Tier::None => "none",
        }
    }

    /// The tier tried when this one comes up empty. `None` is terminal.
    pub fn next(self) -> Tier {
        match self {
            Tier::Inventory => Tier::Fuzzy,
            Tier::Fuzzy => Tier::Semantic,
            Tier::Semantic | Tier::None => Tier::None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alternative medicine offered when the query isn't stocked nearby.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub name: String,
    /// Cosine similarity to the query (semantic tier only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub substitutes: Vec<String>,
    pub uses: Vec<String>,
}

impl Suggestion {
    /// Suggestion from a fuzzy name match.
    pub fn from_record(record: &MedicineRecord) -> Self {
        Self {
            name: record.name.clone(),
            similarity: None,
            substitutes: record.substitutes.clone(),
            uses: record.uses.clone(),
        }
    }

    /// Suggestion from a semantic match.
    pub fn with_similarity(record: &MedicineRecord, similarity: f64) -> Self {
        Self {
            similarity: Some(similarity),
            ..Self::from_record(record)
        }
    }
}

/// Outcome of one resolution. Exactly one tier answers; a non-`None` tier
/// always carries at least one match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum ResolutionResult {
    Inventory { matches: Vec<InventoryMatch> },
    Fuzzy { matches: Vec<Suggestion> },
    Semantic { matches: Vec<Suggestion> },
    None,
}

impl ResolutionResult {
    /// Which tier produced this result.
    pub fn tier(&self) -> Tier {
        match self {
            ResolutionResult::Inventory { .. } => Tier::Inventory,
            ResolutionResult::Fuzzy { .. } => Tier::Fuzzy,
            ResolutionResult::Semantic { .. } => Tier::Semantic,
            ResolutionResult::None => Tier::None,
        }
    }

    /// Suggestions carried by the fuzzy or semantic tier.
    pub fn suggestions(&self) -> &[Suggestion] {
        match self {
            ResolutionResult::Fuzzy { matches } | ResolutionResult::Semantic { matches } => {
                matches
            }
            _ => &[],
        }
    }

    /// True only when a pharmacy stocks the query.
    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionResult::Inventory { .. })
    }
}

/// A resolution together with the tiers that were attempted to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    /// Normalized query that was resolved
    pub query: String,
    pub result: ResolutionResult,
    /// Tiers consulted, in order. The last entry is always the answering
    /// tier, `None` included.
    pub visited: Vec<Tier>,
}

impl Resolution {
    pub fn tier(&self) -> Tier {
        self.result.tier()
    }
}
