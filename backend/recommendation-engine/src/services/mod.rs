pub mod aggregate;
pub mod factorization;
pub mod neighbors;
pub mod rating_store;
pub mod recommender;
pub mod similarity;

pub use aggregate::{BayesianPrior, RankingAggregator};
pub use factorization::{
    FactorizationConfig, LatentFactorModel, ModelState, RatingMatrix, TrainingReport,
};
pub use neighbors::NeighborPredictor;
pub use rating_store::RatingStore;
pub use recommender::Recommender;
pub use similarity::{Metric, SimilarityEngine};
