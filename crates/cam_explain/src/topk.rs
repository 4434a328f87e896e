//! Top-k class selection.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A class index with its probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    /// Index into the classifier's class set.
    pub index: usize,
    /// Probability assigned to the class.
    pub probability: f32,
}

/// Descending order with NaN last.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Return the `k` most probable classes, highest first.
///
/// Ties keep their original index order. `k` is clamped to the number of
/// classes, so `k == 0` or an empty input yields an empty list.
pub fn top_k(probabilities: &[f32], k: usize) -> Vec<ClassScore> {
    let mut scores: Vec<ClassScore> = probabilities
        .iter()
        .enumerate()
        .map(|(index, &probability)| ClassScore { index, probability })
        .collect();

    scores.sort_by(|a, b| descending(a.probability, b.probability));
    scores.truncate(k);
    scores
}
