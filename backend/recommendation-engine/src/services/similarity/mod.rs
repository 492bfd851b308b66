//! Similarity Module
//!
//! Pairwise similarity between two users or two items, computed only over the
//! ratings both entities share. Unrated pairs contribute nothing; no default
//! rating is ever substituted.
//!
//! # Metrics
//! - **Euclidean**: `1 / (1 + sqrt(Σ(a - b)²))`, in (0, 1] for a non-empty set
//! - **Pearson**: `|r|` of the product-moment correlation, in [0, 1]
//!
//! Both return 0 for an empty shared set.

use crate::error::{RecommendError, Result};
use crate::models::{Dimension, SharedPreferenceSet};
use crate::services::RatingStore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Closed set of supported distance metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Euclidean,
    Pearson,
}

impl Metric {
    /// Resolve a metric by exact name, failing with `UnknownMetric` for anything else
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "euclidean" => Ok(Metric::Euclidean),
            "pearson" => Ok(Metric::Pearson),
            _ => Err(RecommendError::UnknownMetric(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Pearson => "pearson",
        }
    }

    /// Apply the metric to an already-extracted shared preference set
    pub fn score(&self, preferences: &SharedPreferenceSet) -> f64 {
        match self {
            Metric::Euclidean => euclidean(preferences),
            Metric::Pearson => pearson(preferences),
        }
    }
}

impl FromStr for Metric {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::from_name(s)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn euclidean(preferences: &SharedPreferenceSet) -> f64 {
    if preferences.is_empty() {
        return 0.0;
    }

    let sum_of_squares: f64 = preferences.values().map(|(a, b)| (a - b).powi(2)).sum();

    1.0 / (1.0 + sum_of_squares.sqrt())
}

fn pearson(preferences: &SharedPreferenceSet) -> f64 {
    let length = preferences.len() as f64;
    if preferences.is_empty() {
        return 0.0;
    }

    let (mut sum_a, mut sum_b, mut sum_sq_a, mut sum_sq_b, mut sum_product) =
        (0.0, 0.0, 0.0, 0.0, 0.0);
    for (a, b) in preferences.values() {
        sum_a += a;
        sum_b += b;
        sum_sq_a += a * a;
        sum_sq_b += b * b;
        sum_product += a * b;
    }

    let numerator = sum_product * length - sum_a * sum_b;
    let variance_product =
        (sum_sq_a * length - sum_a * sum_a) * (sum_sq_b * length - sum_b * sum_b);

    // Constant vector on either side
    if variance_product <= 0.0 {
        return 0.0;
    }

    (numerator / variance_product.sqrt()).abs()
}

/// Similarity between users or items backed by a rating store
#[derive(Debug, Clone, Copy)]
pub struct SimilarityEngine<'a> {
    store: &'a RatingStore,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(store: &'a RatingStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a RatingStore {
        self.store
    }

    /// Intersection of two entities' ratings along `dimension`
    ///
    /// Comparing an entity with itself yields its full rating set.
    pub fn shared_preferences(
        &self,
        a: u32,
        b: u32,
        dimension: Dimension,
    ) -> Result<SharedPreferenceSet> {
        match dimension {
            Dimension::Users => self.shared_items(a, b),
            Dimension::Items => self.shared_users(a, b),
        }
    }

    fn shared_items(&self, user_a: u32, user_b: u32) -> Result<SharedPreferenceSet> {
        let ratings_a = self.store.user_ratings(user_a)?;
        let ratings_b = self.store.user_ratings(user_b)?;

        Ok(ratings_a
            .iter()
            .filter_map(|(item_id, ra)| {
                ratings_b
                    .get(item_id)
                    .map(|rb| (*item_id, (f64::from(ra.score), f64::from(rb.score))))
            })
            .collect())
    }

    fn shared_users(&self, item_a: u32, item_b: u32) -> Result<SharedPreferenceSet> {
        let ratings_a = self.store.item_ratings(item_a)?;
        if !self.store.contains_item(item_b) {
            return Err(RecommendError::unknown_item(item_b));
        }

        Ok(ratings_a
            .into_iter()
            .filter_map(|ra| {
                self.store
                    .score(ra.user_id, item_b)
                    .map(|sb| (ra.user_id, (f64::from(ra.score), sb)))
            })
            .collect())
    }

    pub fn euclidean_similarity(&self, a: u32, b: u32, dimension: Dimension) -> Result<f64> {
        self.similarity(a, b, Metric::Euclidean, dimension)
    }

    pub fn pearson_similarity(&self, a: u32, b: u32, dimension: Dimension) -> Result<f64> {
        self.similarity(a, b, Metric::Pearson, dimension)
    }

    pub fn similarity(&self, a: u32, b: u32, metric: Metric, dimension: Dimension) -> Result<f64> {
        let preferences = self.shared_preferences(a, b, dimension)?;
        let score = metric.score(&preferences);

        debug!(
            a,
            b,
            metric = metric.as_str(),
            dimension = dimension.as_str(),
            shared = preferences.len(),
            score,
            "Similarity computed"
        );

        Ok(score)
    }
}
