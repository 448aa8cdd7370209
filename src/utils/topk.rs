//! Top-k ranking of class probabilities.
//!
//! The ranker works on raw probabilities only; any display rounding is a
//! presentation concern applied at the serialization boundary, never here.
//! Label mapping likewise stays with the caller, which owns the catalog.

/// Ranks class probabilities by score.
#[derive(Debug, Clone, Copy, Default)]
pub struct Topk;

impl Topk {
    /// Creates a ranker.
    pub fn new() -> Self {
        Self
    }

    /// Returns the top-k `(index, score)` pairs, best first.
    ///
    /// Output length is `min(k, scores.len())`. Ordering is descending by
    /// score; ties keep the lower class index first (the sort is stable).
    pub fn rank(&self, scores: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        indexed.truncate(k.min(scores.len()));
        indexed
    }
}
