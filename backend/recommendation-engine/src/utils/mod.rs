// Utility functions for recommendation-engine

use crate::models::ScoredId;
use std::cmp::Ordering;

/// Sort scored ids by score descending, breaking ties by ascending id
///
/// NaN scores compare equal, so they fall back to id order.
pub fn sort_scored(scored: &mut [ScoredId]) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

/// Sort, then keep the first `n` entries when a limit is given
pub fn top_n(mut scored: Vec<ScoredId>, n: Option<usize>) -> Vec<ScoredId> {
    sort_scored(&mut scored);
    if let Some(n) = n {
        scored.truncate(n);
    }
    scored
}
