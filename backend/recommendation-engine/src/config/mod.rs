use crate::error::{RecommendError, Result};
use crate::services::{BayesianPrior, FactorizationConfig, Metric};
use serde::Deserialize;

/// Environment variable prefix, e.g. `RECOMMENDER_STEPS=2000`
pub const ENV_PREFIX: &str = "RECOMMENDER_";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_ratings_path")]
    pub ratings_path: String,
    #[serde(default = "default_items_path")]
    pub items_path: String,
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// User to print neighbors and recommendations for
    #[serde(default)]
    pub target_user: Option<u32>,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_latent_factors")]
    pub latent_factors: usize,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_prior_count")]
    pub prior_count: f64,
    #[serde(default = "default_prior_mean")]
    pub prior_mean: f64,
}

fn default_ratings_path() -> String {
    "ml-100k/u.data".to_string()
}

fn default_items_path() -> String {
    "ml-100k/u.item".to_string()
}

fn default_model_path() -> String {
    "model.json".to_string()
}

fn default_metric() -> String {
    "euclidean".to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_latent_factors() -> usize {
    2
}

fn default_steps() -> usize {
    5000
}

fn default_alpha() -> f64 {
    0.0002
}

fn default_beta() -> f64 {
    0.02
}

fn default_prior_count() -> f64 {
    59.0
}

fn default_prior_mean() -> f64 {
    3.0
}

impl Config {
    /// Load `.env` (if present) and read `RECOMMENDER_*` variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit key/value pairs, using the same prefix and defaults as `from_env`
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.metric()?;

        if self.latent_factors == 0 {
            return Err(RecommendError::Config("latent_factors must be at least 1".to_string()));
        }
        if self.steps == 0 {
            return Err(RecommendError::Config("steps must be at least 1".to_string()));
        }
        if self.alpha <= 0.0 || !self.alpha.is_finite() {
            return Err(RecommendError::Config(format!("alpha must be positive, got {}", self.alpha)));
        }
        if self.beta < 0.0 || !self.beta.is_finite() {
            return Err(RecommendError::Config(format!("beta must be non-negative, got {}", self.beta)));
        }
        if self.prior_count < 0.0 || self.prior_count.is_nan() {
            return Err(RecommendError::Config(format!(
                "prior_count must be non-negative, got {}",
                self.prior_count
            )));
        }
        Ok(())
    }

    pub fn metric(&self) -> Result<Metric> {
        Metric::from_name(&self.metric)
    }

    pub fn factorization(&self) -> FactorizationConfig {
        FactorizationConfig {
            latent_factors: self.latent_factors,
            steps: self.steps,
            alpha: self.alpha,
            beta: self.beta,
            seed: self.seed,
        }
    }

    pub fn prior(&self) -> BayesianPrior {
        BayesianPrior::new(self.prior_count, self.prior_mean)
    }
}
