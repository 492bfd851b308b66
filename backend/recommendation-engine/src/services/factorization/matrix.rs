use crate::error::{RecommendError, Result};
use crate::services::RatingStore;
use ndarray::Array2;
use std::collections::HashMap;

/// Dense users × items view of a rating store
///
/// Rows follow ascending user id, columns ascending item id. A cell holds
/// the rating score, or 0.0 when the pair is unrated. Ratings are strictly
/// positive, so 0.0 is never a real rating.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    user_ids: Vec<u32>,
    item_ids: Vec<u32>,
    user_index: HashMap<u32, usize>,
    item_index: HashMap<u32, usize>,
    values: Array2<f64>,
}

impl RatingMatrix {
    pub fn from_store(store: &RatingStore) -> Self {
        let user_ids: Vec<u32> = store.user_ids().collect();
        let item_ids: Vec<u32> = store.item_ids().collect();
        let user_index = index_of(&user_ids);
        let item_index = index_of(&item_ids);

        let mut values = Array2::<f64>::zeros((user_ids.len(), item_ids.len()));
        for (row, user_id) in user_ids.iter().enumerate() {
            if let Ok(ratings) = store.user_ratings(*user_id) {
                for (item_id, rating) in ratings {
                    if let Some(col) = item_index.get(item_id) {
                        values[[row, *col]] = f64::from(rating.score);
                    }
                }
            }
        }

        Self {
            user_ids,
            item_ids,
            user_index,
            item_index,
            values,
        }
    }

    /// Wrap an externally built dense matrix with its id orderings
    pub fn from_dense(user_ids: Vec<u32>, item_ids: Vec<u32>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (user_ids.len(), item_ids.len()) {
            return Err(RecommendError::DimensionMismatch(format!(
                "matrix is {:?} but {} user ids and {} item ids were given",
                values.dim(),
                user_ids.len(),
                item_ids.len()
            )));
        }

        let user_index = index_of(&user_ids);
        let item_index = index_of(&item_ids);
        if user_index.len() != user_ids.len() || item_index.len() != item_ids.len() {
            return Err(RecommendError::DimensionMismatch(
                "id orderings contain duplicates".to_string(),
            ));
        }

        Ok(Self {
            user_ids,
            item_ids,
            user_index,
            item_index,
            values,
        })
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn user_ids(&self) -> &[u32] {
        &self.user_ids
    }

    pub fn item_ids(&self) -> &[u32] {
        &self.item_ids
    }

    pub fn user_index(&self, user_id: u32) -> Result<usize> {
        self.user_index
            .get(&user_id)
            .copied()
            .ok_or_else(|| RecommendError::unknown_user(user_id))
    }

    pub fn item_index(&self, item_id: u32) -> Result<usize> {
        self.item_index
            .get(&item_id)
            .copied()
            .ok_or_else(|| RecommendError::unknown_item(item_id))
    }

    pub fn is_rated(&self, row: usize, col: usize) -> bool {
        self.values.get((row, col)).is_some_and(|v| *v > 0.0)
    }

    /// Fraction of cells holding a rating
    pub fn density(&self) -> f64 {
        density(&self.values)
    }

    /// Fraction of cells without a rating
    pub fn sparsity(&self) -> f64 {
        1.0 - self.density()
    }
}

/// Nonzero fraction of a matrix; 0.0 for an empty matrix
pub fn density(values: &Array2<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let nonzero = values.iter().filter(|v| **v != 0.0).count();
    nonzero as f64 / values.len() as f64
}

fn index_of(ids: &[u32]) -> HashMap<u32, usize> {
    ids.iter().enumerate().map(|(idx, id)| (*id, idx)).collect()
}
