// ============================================
// Ranking Aggregator
// ============================================
//
// Item popularity ranking independent of similarity.
//
// Bayesian average:
//   score(i) = (c * m + Σ ratings(i)) / (c + n(i))
//
// Where:
//   - c: prior count, how many "virtual" ratings the prior is worth
//   - m: prior mean rating
//   - n(i): number of ratings for item i
//
// Low-count items are shrunk toward m, so a single 5-star rating cannot
// outrank hundreds of consistent 4-star ratings.

use super::RatingStore;
use crate::error::{RecommendError, Result};
use crate::models::ItemAverage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Prior used to shrink averages toward a global mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BayesianPrior {
    /// Prior count (c)
    pub count: f64,
    /// Prior mean (m)
    pub mean: f64,
}

impl Default for BayesianPrior {
    fn default() -> Self {
        Self {
            count: 59.0,
            mean: 3.0,
        }
    }
}

impl BayesianPrior {
    pub fn new(count: f64, mean: f64) -> Self {
        Self { count, mean }
    }
}

pub struct RankingAggregator<'a> {
    store: &'a RatingStore,
}

impl<'a> RankingAggregator<'a> {
    pub fn new(store: &'a RatingStore) -> Self {
        Self { store }
    }

    /// Sum and count of an item's ratings
    fn totals(&self, item_id: u32) -> Result<(f64, usize)> {
        let ratings = self.store.item_ratings(item_id)?;
        let sum = ratings.iter().map(|r| f64::from(r.score)).sum();
        Ok((sum, ratings.len()))
    }

    /// Simple average and count; `NoRatings` for an item nobody rated
    pub fn average_rating(&self, item_id: u32) -> Result<(f64, usize)> {
        let (sum, count) = self.totals(item_id)?;
        if count == 0 {
            return Err(RecommendError::NoRatings(item_id));
        }
        Ok((sum / count as f64, count))
    }

    /// Bayesian average with prior count `c` and prior mean `m`
    ///
    /// An unrated item scores exactly `m`.
    pub fn bayesian_average(&self, item_id: u32, prior: BayesianPrior) -> Result<(f64, usize)> {
        let (sum, count) = self.totals(item_id)?;
        let average = (prior.count * prior.mean + sum) / (prior.count + count as f64);
        Ok((average, count))
    }

    /// Items with the highest simple average
    ///
    /// Only items with at least one rating are eligible. Ties keep ascending item id order.
    pub fn top_rated(&self, n: usize) -> Result<Vec<ItemAverage>> {
        self.rank_by(n, |item_id| self.average_rating(item_id))
    }

    /// Items with the highest Bayesian average
    pub fn bayesian_top_rated(&self, n: usize, prior: BayesianPrior) -> Result<Vec<ItemAverage>> {
        self.rank_by(n, |item_id| self.bayesian_average(item_id, prior))
    }

    fn rank_by<F>(&self, n: usize, score: F) -> Result<Vec<ItemAverage>>
    where
        F: Fn(u32) -> Result<(f64, usize)>,
    {
        let mut ranked = Vec::new();
        for item_id in self.store.item_ids() {
            if self.store.item_ratings(item_id)?.is_empty() {
                continue;
            }
            let (average, count) = score(item_id)?;
            ranked.push(ItemAverage {
                item_id,
                average,
                count,
            });
        }

        // Stable sort keeps ascending item id order among equal averages
        ranked.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));
        ranked.truncate(n);

        debug!(requested = n, returned = ranked.len(), "Items ranked by average");

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rating_store::tests::{item, rating, sample_store};

    const EPS: f64 = 1e-12;

    #[test]
    fn test_average_rating() {
        let store = sample_store();
        let aggregator = RankingAggregator::new(&store);

        let (average, count) = aggregator.average_rating(20).unwrap();
        assert_eq!(count, 3);
        assert!((average - 10.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn test_average_rating_no_ratings() {
        let store = RatingStore::new(vec![rating(1, 10, 4)], vec![item(10, "A"), item(11, "B")]);
        let aggregator = RankingAggregator::new(&store);

        assert!(matches!(
            aggregator.average_rating(11),
            Err(RecommendError::NoRatings(11))
        ));
        assert!(matches!(
            aggregator.average_rating(12),
            Err(RecommendError::UnknownEntity { id: 12, .. })
        ));
    }

    #[test]
    fn test_bayesian_average_worked_example() {
        let store = RatingStore::new(vec![rating(1, 10, 5)], Vec::new());
        let aggregator = RankingAggregator::new(&store);

        let (average, count) = aggregator
            .bayesian_average(10, BayesianPrior::default())
            .unwrap();
        assert_eq!(count, 1);
        assert!((average - 182.0 / 60.0).abs() < EPS);
    }

    #[test]
    fn test_bayesian_average_limits() {
        let prior = BayesianPrior::new(10.0, 3.0);

        let mut previous_gap = f64::MAX;
        for n in [1u32, 10, 100, 1000] {
            let ratings = (0..n).map(|user| rating(user, 10, 5)).collect::<Vec<_>>();
            let store = RatingStore::new(ratings, Vec::new());
            let (average, _) = RankingAggregator::new(&store)
                .bayesian_average(10, prior)
                .unwrap();

            let gap = 5.0 - average;
            assert!(gap > 0.0 && gap < previous_gap);
            previous_gap = gap;
        }
        assert!(previous_gap < 0.05);

        let store = RatingStore::new(Vec::new(), vec![item(10, "Unrated")]);
        let (average, count) = RankingAggregator::new(&store)
            .bayesian_average(10, prior)
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(average, 3.0);
    }

    #[test]
    fn test_top_rated_sorted_and_bounded() {
        let store = sample_store();
        let aggregator = RankingAggregator::new(&store);

        let top = aggregator.top_rated(10).unwrap();
        assert_eq!(top.len(), 3);
        for pair in top.windows(2) {
            assert!(pair[0].average >= pair[1].average);
        }
        // item 10: 4.5, item 30: 4.0, item 20: 3.33
        assert_eq!(
            top.iter().map(|a| a.item_id).collect::<Vec<_>>(),
            vec![10, 30, 20]
        );

        assert_eq!(aggregator.top_rated(2).unwrap().len(), 2);
    }

    #[test]
    fn test_top_rated_skips_unrated_items() {
        let store = RatingStore::new(
            vec![rating(1, 10, 4), rating(1, 12, 4)],
            vec![item(10, "A"), item(11, "B"), item(12, "C")],
        );
        let aggregator = RankingAggregator::new(&store);

        let top = aggregator.top_rated(5).unwrap();
        assert_eq!(
            top.iter().map(|a| a.item_id).collect::<Vec<_>>(),
            vec![10, 12]
        );
    }

    #[test]
    fn test_bayesian_top_rated_prefers_volume() {
        let mut ratings = vec![rating(1, 10, 5)];
        ratings.extend((1..=200).map(|user| rating(user, 20, 4)));
        let store = RatingStore::new(ratings, Vec::new());
        let aggregator = RankingAggregator::new(&store);

        let simple = aggregator.top_rated(1).unwrap();
        assert_eq!(simple[0].item_id, 10);

        let bayesian = aggregator
            .bayesian_top_rated(1, BayesianPrior::default())
            .unwrap();
        assert_eq!(bayesian[0].item_id, 20);
    }
}
