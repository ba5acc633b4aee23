//! Cosine-similarity ranking of catalog names against a query vector.

/// A catalog name ranked by similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    /// Catalog position of the ranked name
    pub index: usize,
    pub name: String,
    pub similarity: f64,
}

/// Cosine similarity of two vectors.
///
/// `None` when the lengths differ, either vector has zero magnitude, or the
/// result isn't finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    similarity.is_finite().then_some(similarity)
}

/// Rank `names` (in catalog order) by similarity to `query`.
///
/// Names without a vector from `lookup` are skipped, not scored as zero.
/// Highest similarity first; ties keep catalog order.
pub fn rank<'n, 'v, I, F>(query: &[f32], names: I, lookup: F, limit: usize) -> Vec<SemanticMatch>
where
    I: IntoIterator<Item = &'n str>,
    F: Fn(&str) -> Option<&'v [f32]>,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<SemanticMatch> = names
        .into_iter()
        .enumerate()
        .filter_map(|(index, name)| {
            let vector = lookup(name)?;
            let similarity = cosine_similarity(query, vector)?;
            Some(SemanticMatch {
                index,
                name: name.to_string(),
                similarity,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}
