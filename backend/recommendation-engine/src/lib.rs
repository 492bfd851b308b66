//! Collaborative-filtering recommendation engine
//!
//! Predicts unseen ratings from a sparse user × item rating matrix:
//! - **Similarity**: Euclidean and Pearson over shared ratings
//! - **Neighbors**: user-based and item-based weighted averages
//! - **Aggregates**: simple and Bayesian average item rankings
//! - **Latent factors**: SGD matrix factorization, predictions as `P · Qᵗ`
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use recommendation_engine::{Dimension, Metric, NeighborPredictor, Rating, RatingStore};
//!
//! let rating = |user_id, item_id, score| Rating { user_id, item_id, score, timestamp: Utc::now() };
//! let store = RatingStore::new(
//!     vec![rating(1, 10, 5), rating(1, 20, 3), rating(2, 10, 4), rating(2, 20, 2), rating(2, 30, 4)],
//!     Vec::new(),
//! );
//!
//! let predictor = NeighborPredictor::new(&store);
//! let neighbors = predictor.rank_neighbors(1, Metric::Euclidean, Dimension::Users, Some(5)).unwrap();
//! assert_eq!(neighbors[0].0, 2);
//!
//! let predicted = predictor.predict_user_based(1, 30, Metric::Euclidean, None).unwrap();
//! assert!((predicted - 4.0).abs() < 1e-9);
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod persistence;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{EntityKind, RecommendError, Result};
pub use models::{Dimension, ItemAverage, ItemMetadata, Rating, ScoredId, SharedPreferenceSet};
pub use persistence::ModelSnapshot;
pub use services::{
    BayesianPrior, FactorizationConfig, LatentFactorModel, Metric, ModelState, NeighborPredictor,
    RankingAggregator, RatingMatrix, RatingStore, Recommender, SimilarityEngine, TrainingReport,
};
