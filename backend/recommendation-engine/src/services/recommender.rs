use super::factorization::{FactorizationConfig, LatentFactorModel, RatingMatrix, TrainingReport};
use crate::error::Result;
use crate::models::ScoredId;
use crate::utils::top_n;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Latent-factor recommender keyed by user and item ids
///
/// Pairs the dense rating matrix (and its id orderings) with the model
/// trained on it, translating ids to matrix rows/columns.
#[derive(Debug, Clone)]
pub struct Recommender {
    matrix: RatingMatrix,
    model: LatentFactorModel,
    build_started: Option<DateTime<Utc>>,
    build_finished: Option<DateTime<Utc>>,
}

impl Recommender {
    pub fn new(matrix: RatingMatrix, config: FactorizationConfig) -> Self {
        Self {
            matrix,
            model: LatentFactorModel::new(config),
            build_started: None,
            build_finished: None,
        }
    }

    /// Wrap an already trained model
    pub(crate) fn from_parts(matrix: RatingMatrix, model: LatentFactorModel) -> Self {
        Self {
            matrix,
            model,
            build_started: None,
            build_finished: None,
        }
    }

    /// Train the model on the rating matrix, replacing any earlier factors
    pub fn build(&mut self) -> Result<TrainingReport> {
        let started = Utc::now();
        self.build_started = Some(started);

        let report = self.model.fit(self.matrix.values().view())?;

        let finished = Utc::now();
        self.build_finished = Some(finished);

        info!(
            users = self.matrix.user_ids().len(),
            items = self.matrix.item_ids().len(),
            elapsed_ms = (finished - started).num_milliseconds(),
            "Recommender built"
        );

        Ok(report)
    }

    /// Predicted rating, or `None` when the user already rated the item
    pub fn predict_rating(&self, user_id: u32, item_id: u32) -> Result<Option<f64>> {
        let row = self.matrix.user_index(user_id)?;
        let col = self.matrix.item_index(item_id)?;
        self.model.predict(row, col)
    }

    /// The user's `n` best unrated items by predicted rating
    ///
    /// Ordered by score descending, ties by ascending item id.
    pub fn top_recommendations(&self, user_id: u32, n: usize) -> Result<Vec<ScoredId>> {
        let row = self.matrix.user_index(user_id)?;

        let mut predictions = Vec::new();
        for (col, item_id) in self.matrix.item_ids().iter().enumerate() {
            if let Some(score) = self.model.predict(row, col)? {
                predictions.push((*item_id, score));
            }
        }

        debug!(user_id, candidates = predictions.len(), "Predicted unrated items");

        Ok(top_n(predictions, Some(n)))
    }

    pub fn density(&self) -> f64 {
        self.matrix.density()
    }

    pub fn sparsity(&self) -> f64 {
        self.matrix.sparsity()
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.matrix
    }

    pub fn model(&self) -> &LatentFactorModel {
        &self.model
    }

    pub fn build_started(&self) -> Option<DateTime<Utc>> {
        self.build_started
    }

    pub fn build_finished(&self) -> Option<DateTime<Utc>> {
        self.build_finished
    }
}
