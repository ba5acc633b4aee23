//! Typo-tolerant name matching over the catalog.
//!
//! Scores are distances in `[0, 1]` where `0` is an exact match. A name is
//! compared as a whole, token by token, and by its prefix of the query's
//! length; the best of these is the name's distance. Only names within the
//! threshold are returned.

use strsim::{jaro_winkler, normalized_levenshtein};

use crate::catalog::Catalog;

/// Default maximum distance for a fuzzy match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.3;

/// Default number of fuzzy matches returned.
pub const DEFAULT_FUZZY_LIMIT: usize = 5;

/// A catalog name close enough to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Catalog position of the matched record
    pub index: usize,
    /// Distance from the query (0.0 = exact)
    pub distance: f64,
}

struct IndexedName {
    name: String,
    tokens: Vec<String>,
}

/// Fuzzy index over catalog names, in catalog order.
pub struct FuzzyIndex {
    entries: Vec<IndexedName>,
    threshold: f64,
}

impl FuzzyIndex {
    /// Build the index over every catalog name.
    pub fn build(catalog: &Catalog, threshold: f64) -> Self {
        let entries = catalog
            .names()
            .map(|name| IndexedName {
                name: name.to_string(),
                tokens: name.split_whitespace().map(String::from).collect(),
            })
            .collect();

        Self {
            entries,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// An index with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest names to `query`, nearest first; ties keep catalog order.
    ///
    /// Returns an empty vec when nothing is within the threshold.
    pub fn search(&self, query: &str, limit: usize) -> Vec<FuzzyMatch> {
        let query = query.trim().to_lowercase();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let query_len = query.chars().count();

        let mut matches: Vec<FuzzyMatch> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let distance = name_distance(&query, query_len, entry);
                (distance <= self.threshold).then_some(FuzzyMatch { index, distance })
            })
            .collect();

        // Stable: equal distances stay in catalog order.
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        matches
    }
}

fn name_distance(query: &str, query_len: usize, entry: &IndexedName) -> f64 {
    let prefix: String = entry.name.chars().take(query_len).collect();

    let best = entry
        .tokens
        .iter()
        .map(|token| similarity(query, token))
        .chain([similarity(query, &entry.name), similarity(query, &prefix)])
        .fold(0.0_f64, f64::max);

    1.0 - best
}

/// Compute fuzzy string similarity using combined metrics.
fn similarity(a: &str, b: &str) -> f64 {
    // Combine Jaro-Winkler (good for typos) and Levenshtein (good for overall similarity)
    let jw = jaro_winkler(a, b);
    let lev = normalized_levenshtein(a, b);

    // Weight Jaro-Winkler more heavily as it's better for prefix matching
    jw * 0.6 + lev * 0.4
}
