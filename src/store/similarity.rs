//! Cosine similarity and score ordering.

use std::cmp::Ordering;

/// Cosine similarity: `dot(a, b) / (||a|| * ||b||)`.
///
/// A zero-magnitude input yields NaN; callers rank NaN scores last instead
/// of guarding here (the embedding collaborator is expected never to
/// produce a zero vector).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot / (norm_a * norm_b)
}

/// Descending score order with NaN sinking to the end. Used with a stable
/// sort so equal scores keep insertion order.
pub fn compare_scores_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
