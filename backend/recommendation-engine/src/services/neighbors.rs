use super::similarity::{Metric, SimilarityEngine};
use super::RatingStore;
use crate::error::{RecommendError, Result};
use crate::models::{Dimension, ScoredId};
use crate::utils::top_n;
use tracing::debug;

/// Neighbor-based rating prediction
///
/// Algorithm:
/// 1. Score every other user (or item) against the target with the chosen metric
/// 2. Predict a missing rating as the similarity-weighted average of neighbor ratings
///
/// A prediction whose weights sum to zero is reported as 0.0. That value is a
/// legitimate, rankable score rather than an error.
#[derive(Debug, Clone, Copy)]
pub struct NeighborPredictor<'a> {
    similarity: SimilarityEngine<'a>,
}

impl<'a> NeighborPredictor<'a> {
    pub fn new(store: &'a RatingStore) -> Self {
        Self {
            similarity: SimilarityEngine::new(store),
        }
    }

    fn store(&self) -> &'a RatingStore {
        self.similarity.store()
    }

    /// Rank every other entity along `dimension` by similarity to `entity`
    ///
    /// Results are ordered by score descending, ties by ascending id, and
    /// truncated to `limit` entries when given.
    pub fn rank_neighbors(
        &self,
        entity: u32,
        metric: Metric,
        dimension: Dimension,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredId>> {
        let candidates: Vec<u32> = match dimension {
            Dimension::Users => {
                if !self.store().contains_user(entity) {
                    return Err(RecommendError::unknown_user(entity));
                }
                self.store().user_ids().filter(|id| *id != entity).collect()
            }
            Dimension::Items => {
                if !self.store().contains_item(entity) {
                    return Err(RecommendError::unknown_item(entity));
                }
                self.store().item_ids().filter(|id| *id != entity).collect()
            }
        };

        let scored = candidates
            .into_iter()
            .map(|other| {
                self.similarity
                    .similarity(entity, other, metric, dimension)
                    .map(|score| (other, score))
            })
            .collect::<Result<Vec<_>>>()?;

        let ranked = top_n(scored, limit);

        debug!(
            entity,
            metric = metric.as_str(),
            dimension = dimension.as_str(),
            neighbors = ranked.len(),
            "Neighbors ranked"
        );

        Ok(ranked)
    }

    /// Predict `user`'s rating of `item` from the users most like them
    ///
    /// `neighbors` may carry a precomputed neighbor list from `rank_neighbors`;
    /// otherwise every other user is scored with `metric`.
    pub fn predict_user_based(
        &self,
        user: u32,
        item: u32,
        metric: Metric,
        neighbors: Option<&[ScoredId]>,
    ) -> Result<f64> {
        if !self.store().contains_user(user) {
            return Err(RecommendError::unknown_user(user));
        }
        if !self.store().contains_item(item) {
            return Err(RecommendError::unknown_item(item));
        }

        let computed;
        let neighbors = match neighbors {
            Some(neighbors) => neighbors,
            None => {
                computed = self.rank_neighbors(user, metric, Dimension::Users, None)?;
                computed.as_slice()
            }
        };

        let pairs = neighbors
            .iter()
            .filter_map(|(critic, similarity)| {
                self.store()
                    .score(*critic, item)
                    .map(|score| (*similarity, score))
            });

        Ok(weighted_average(pairs))
    }

    /// Predict `user`'s rating of `item` from the items most like it that the user rated
    pub fn predict_item_based(&self, user: u32, item: u32, metric: Metric) -> Result<f64> {
        let user_ratings = self.store().user_ratings(user)?;
        let related = self.rank_neighbors(item, metric, Dimension::Items, None)?;

        let pairs = related.iter().filter_map(|(related_item, similarity)| {
            user_ratings
                .get(related_item)
                .map(|rating| (*similarity, f64::from(rating.score)))
        });

        Ok(weighted_average(pairs))
    }

    /// User-based predictions for every item in the store
    ///
    /// Neighbors are ranked once and shared across all items. Results are
    /// ordered by predicted score descending, ties by ascending item id.
    pub fn predict_all(
        &self,
        user: u32,
        metric: Metric,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredId>> {
        let neighbors = self.rank_neighbors(user, metric, Dimension::Users, None)?;

        let predictions = self
            .store()
            .item_ids()
            .map(|item| {
                self.predict_user_based(user, item, metric, Some(&neighbors))
                    .map(|score| (item, score))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(top_n(predictions, limit))
    }
}

/// Σ(weight · value) / Σ weight, or 0.0 when the weights sum to zero
fn weighted_average(pairs: impl Iterator<Item = (f64, f64)>) -> f64 {
    let (total, sim_sum) = pairs.fold((0.0, 0.0), |(total, sim_sum), (similarity, score)| {
        (total + similarity * score, sim_sum + similarity)
    });

    if sim_sum == 0.0 {
        return 0.0;
    }
    total / sim_sum
}
