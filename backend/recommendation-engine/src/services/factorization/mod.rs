//! Latent Factor Module
//!
//! Learns dense user factors P (users × K) and item factors Q (items × K) by
//! stochastic gradient descent so that `P · Qᵗ` approximates the observed
//! ratings. Cells equal to 0 are unrated and never contribute.
//!
//! # Training sweep
//! For every rated cell (i, j), row-major:
//! 1. `e = R[i,j] - P[i,:] · Q[j,:]`
//! 2. for each k: `P[i,k] += α(2e·Q[j,k] - β·P[i,k])`, then
//!    `Q[j,k] += α(2e·P[i,k] - β·Q[j,k])` with the freshly updated `P[i,k]`
//!
//! Updates are applied in place as the sweep proceeds, never from a snapshot
//! gradient, so the training trajectory depends on this exact order.
//!
//! After each sweep the regularized squared error is recomputed and training
//! stops once it drops below `CONVERGENCE_THRESHOLD`.

pub mod matrix;

pub use matrix::RatingMatrix;

use crate::error::{RecommendError, Result};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Regularized error below which training stops early
pub const CONVERGENCE_THRESHOLD: f64 = 0.001;

/// Hyperparameters for SGD factorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorizationConfig {
    /// Number of latent features (K)
    pub latent_factors: usize,
    /// Maximum number of sweeps
    pub steps: usize,
    /// Learning rate
    pub alpha: f64,
    /// Regularization strength
    pub beta: f64,
    /// Seed for the initial P and Q draw; random when absent
    pub seed: Option<u64>,
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self {
            latent_factors: 2,
            steps: 5000,
            alpha: 0.0002,
            beta: 0.02,
            seed: None,
        }
    }
}

/// Outcome of one training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Sweeps actually run
    pub steps_run: usize,
    /// Regularized squared error after the last sweep
    pub final_error: f64,
    /// Whether the error dropped below `CONVERGENCE_THRESHOLD`
    pub converged: bool,
}

/// Trained factors plus the report of how training went
#[derive(Debug, Clone)]
pub struct Factorization {
    pub p: Array2<f64>,
    pub q: Array2<f64>,
    pub report: TrainingReport,
}

/// Draw P (rows × k) and Q (cols × k) uniformly from [0, 1)
pub fn initialize(rows: usize, cols: usize, k: usize, seed: Option<u64>) -> (Array2<f64>, Array2<f64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let p = Array2::from_shape_fn((rows, k), |_| rng.gen::<f64>());
    let q = Array2::from_shape_fn((cols, k), |_| rng.gen::<f64>());
    (p, q)
}

/// Factor `r` into P and Q
///
/// `p0`/`q0` seed the factors; both are drawn by `initialize` unless both are
/// given. Shapes inconsistent with `r` or `config.latent_factors` fail with
/// `DimensionMismatch`. Non-convergence is not an error: inspect the report.
pub fn factor(
    r: ArrayView2<'_, f64>,
    p0: Option<Array2<f64>>,
    q0: Option<Array2<f64>>,
    config: &FactorizationConfig,
) -> Result<Factorization> {
    let (rows, cols) = r.dim();
    let k = config.latent_factors;

    let (mut p, mut q) = match (p0, q0) {
        (Some(p), Some(q)) => (p, q),
        _ => initialize(rows, cols, k, config.seed),
    };

    if p.dim() != (rows, k) {
        return Err(RecommendError::DimensionMismatch(format!(
            "P is {:?}, expected ({}, {})",
            p.dim(),
            rows,
            k
        )));
    }
    if q.dim() != (cols, k) {
        return Err(RecommendError::DimensionMismatch(format!(
            "Q is {:?}, expected ({}, {})",
            q.dim(),
            cols,
            k
        )));
    }

    let mut report = TrainingReport {
        steps_run: 0,
        final_error: total_error(r, &p, &q, config.beta),
        converged: false,
    };

    for step in 0..config.steps {
        sweep(r, &mut p, &mut q, config.alpha, config.beta);

        let error = total_error(r, &p, &q, config.beta);
        report.steps_run = step + 1;
        report.final_error = error;

        if step % 500 == 0 {
            debug!(step, error, "Factorization progress");
        }

        if error < CONVERGENCE_THRESHOLD {
            report.converged = true;
            break;
        }
    }

    Ok(Factorization { p, q, report })
}

/// One in-place SGD pass over every rated cell
fn sweep(r: ArrayView2<'_, f64>, p: &mut Array2<f64>, q: &mut Array2<f64>, alpha: f64, beta: f64) {
    let k = p.ncols();
    for ((i, j), &rating) in r.indexed_iter() {
        if rating <= 0.0 {
            continue;
        }

        let eij = rating - p.row(i).dot(&q.row(j));
        for f in 0..k {
            let p_if = p[[i, f]] + alpha * (2.0 * eij * q[[j, f]] - beta * p[[i, f]]);
            p[[i, f]] = p_if;
            let q_jf = q[[j, f]] + alpha * (2.0 * eij * p_if - beta * q[[j, f]]);
            q[[j, f]] = q_jf;
        }
    }
}

/// Squared error over rated cells plus `β/2 · (P[i,k]² + Q[j,k]²)` per rated cell and feature
pub fn total_error(r: ArrayView2<'_, f64>, p: &Array2<f64>, q: &Array2<f64>, beta: f64) -> f64 {
    let mut error = 0.0;
    for ((i, j), &rating) in r.indexed_iter() {
        if rating <= 0.0 {
            continue;
        }

        error += (rating - p.row(i).dot(&q.row(j))).powi(2);
        for f in 0..p.ncols() {
            error += (beta / 2.0) * (p[[i, f]].powi(2) + q[[j, f]].powi(2));
        }
    }
    error
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Uninitialized,
    Training,
    Trained,
}

/// Owns P and Q and answers predictions for unrated cells
///
/// Retraining overwrites both factor matrices.
#[derive(Debug, Clone)]
pub struct LatentFactorModel {
    config: FactorizationConfig,
    state: ModelState,
    p: Array2<f64>,
    q: Array2<f64>,
    rated: Array2<bool>,
    report: Option<TrainingReport>,
}

impl LatentFactorModel {
    pub fn new(config: FactorizationConfig) -> Self {
        Self {
            config,
            state: ModelState::Uninitialized,
            p: Array2::zeros((0, 0)),
            q: Array2::zeros((0, 0)),
            rated: Array2::from_elem((0, 0), false),
            report: None,
        }
    }

    /// Rebuild a trained model from stored factors
    pub fn from_factors(
        config: FactorizationConfig,
        r: ArrayView2<'_, f64>,
        p: Array2<f64>,
        q: Array2<f64>,
    ) -> Result<Self> {
        let (rows, cols) = r.dim();
        if p.dim() != (rows, config.latent_factors) || q.dim() != (cols, config.latent_factors) {
            return Err(RecommendError::DimensionMismatch(format!(
                "factors P {:?} and Q {:?} do not fit a {}x{} matrix with K={}",
                p.dim(),
                q.dim(),
                rows,
                cols,
                config.latent_factors
            )));
        }

        Ok(Self {
            config,
            state: ModelState::Trained,
            p,
            q,
            rated: r.mapv(|v| v > 0.0),
            report: None,
        })
    }

    /// Train on `r` from a fresh random initialization
    pub fn fit(&mut self, r: ArrayView2<'_, f64>) -> Result<TrainingReport> {
        self.fit_from(r, None, None)
    }

    /// Train on `r`, optionally starting from given P and Q
    pub fn fit_from(
        &mut self,
        r: ArrayView2<'_, f64>,
        p0: Option<Array2<f64>>,
        q0: Option<Array2<f64>>,
    ) -> Result<TrainingReport> {
        let (rows, cols) = r.dim();
        info!(
            rows,
            cols,
            k = self.config.latent_factors,
            steps = self.config.steps,
            alpha = self.config.alpha,
            beta = self.config.beta,
            "Starting factorization"
        );

        let previous = self.state;
        self.state = ModelState::Training;

        let factorization = match factor(r, p0, q0, &self.config) {
            Ok(f) => f,
            Err(e) => {
                self.state = previous;
                return Err(e);
            }
        };

        let report = factorization.report;
        if report.converged {
            info!(
                steps_run = report.steps_run,
                final_error = report.final_error,
                "Factorization converged"
            );
        } else {
            warn!(
                steps_run = report.steps_run,
                final_error = report.final_error,
                "Factorization stopped before converging"
            );
        }

        self.p = factorization.p;
        self.q = factorization.q;
        self.rated = r.mapv(|v| v > 0.0);
        self.report = Some(report);
        self.state = ModelState::Trained;

        Ok(report)
    }

    /// Predicted rating for an unrated cell
    ///
    /// Returns `None` for a cell that was rated in the training matrix.
    pub fn predict(&self, row: usize, col: usize) -> Result<Option<f64>> {
        if self.state != ModelState::Trained {
            return Err(RecommendError::DimensionMismatch(
                "model has not been trained".to_string(),
            ));
        }

        let rated = self.rated.get((row, col)).ok_or_else(|| {
            RecommendError::DimensionMismatch(format!(
                "cell ({}, {}) outside {:?}",
                row,
                col,
                self.rated.dim()
            ))
        })?;

        if *rated {
            return Ok(None);
        }
        Ok(Some(self.p.row(row).dot(&self.q.row(col))))
    }

    /// Fraction of training cells that held a rating
    pub fn density(&self) -> f64 {
        if self.rated.is_empty() {
            return 0.0;
        }
        let rated = self.rated.iter().filter(|v| **v).count();
        rated as f64 / self.rated.len() as f64
    }

    pub fn sparsity(&self) -> f64 {
        1.0 - self.density()
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn config(&self) -> &FactorizationConfig {
        &self.config
    }

    pub fn report(&self) -> Option<TrainingReport> {
        self.report
    }

    pub fn user_factors(&self) -> &Array2<f64> {
        &self.p
    }

    pub fn item_factors(&self) -> &Array2<f64> {
        &self.q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    /// Rank-1 matrix with values in [1, 5]
    fn rank_one() -> Array2<f64> {
        let u = Array1::from(vec![1.0, 2.0, 1.0, 2.0]);
        let v = Array1::from(vec![1.0, 2.0, 2.5]);
        Array2::from_shape_fn((4, 3), |(i, j)| u[i] * v[j])
    }

    fn fast_config(latent_factors: usize, seed: u64) -> FactorizationConfig {
        FactorizationConfig {
            latent_factors,
            steps: 5000,
            alpha: 0.01,
            beta: 0.0,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_initialize_shapes_and_range() {
        let (p, q) = initialize(4, 3, 2, Some(7));
        assert_eq!(p.dim(), (4, 2));
        assert_eq!(q.dim(), (3, 2));
        assert!(p.iter().chain(q.iter()).all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_initialize_is_reproducible_with_seed() {
        assert_eq!(initialize(5, 4, 3, Some(42)), initialize(5, 4, 3, Some(42)));
        assert_ne!(initialize(5, 4, 3, Some(42)).0, initialize(5, 4, 3, Some(43)).0);
    }

    #[test]
    fn test_single_sweep_matches_sequential_update() {
        let r = array![[4.0]];
        let p0 = array![[0.5]];
        let q0 = array![[0.5]];
        let config = FactorizationConfig {
            latent_factors: 1,
            steps: 1,
            alpha: 0.1,
            beta: 0.02,
            seed: None,
        };

        let result = factor(r.view(), Some(p0), Some(q0), &config).unwrap();

        let e = 4.0 - 0.25;
        let p = 0.5 + 0.1 * (2.0 * e * 0.5 - 0.02 * 0.5);
        // Q update sees the already-updated P
        let q = 0.5 + 0.1 * (2.0 * e * p - 0.02 * 0.5);
        assert!((result.p[[0, 0]] - p).abs() < 1e-12);
        assert!((result.q[[0, 0]] - q).abs() < 1e-12);
        assert_eq!(result.report.steps_run, 1);
    }

    #[test]
    fn test_factor_converges_on_dense_matrix() {
        let r = rank_one();
        let result = factor(r.view(), None, None, &fast_config(2, 11)).unwrap();

        assert!(result.report.converged);
        assert!(result.report.final_error < CONVERGENCE_THRESHOLD);
        assert!(result.report.steps_run < 5000);

        let reconstructed = result.p.dot(&result.q.t());
        for (predicted, actual) in reconstructed.iter().zip(r.iter()) {
            assert!((predicted - actual).abs() < 0.05);
        }
    }

    #[test]
    fn test_factor_default_hyperparameters_reduce_error() {
        let r = rank_one();
        let (p0, q0) = initialize(4, 3, 2, Some(3));
        let config = FactorizationConfig {
            seed: Some(3),
            ..FactorizationConfig::default()
        };
        let initial = total_error(r.view(), &p0, &q0, config.beta);

        let result = factor(r.view(), Some(p0), Some(q0), &config).unwrap();

        assert!(result.report.final_error < initial);
        assert!(result.report.steps_run <= config.steps);
    }

    #[test]
    fn test_factor_empty_matrix_does_not_fail() {
        let r = Array2::<f64>::zeros((3, 2));
        let config = FactorizationConfig {
            steps: 10,
            seed: Some(1),
            ..FactorizationConfig::default()
        };

        let result = factor(r.view(), None, None, &config).unwrap();
        // No rated cells: zero error, converged after the first sweep
        assert!(result.report.converged);
        assert_eq!(result.report.steps_run, 1);
        assert_eq!(result.report.final_error, 0.0);
    }

    #[test]
    fn test_factor_dimension_mismatch() {
        let r = rank_one();
        let (p0, q0) = initialize(3, 3, 2, Some(1));
        assert!(matches!(
            factor(r.view(), Some(p0), Some(q0), &FactorizationConfig::default()),
            Err(RecommendError::DimensionMismatch(_))
        ));

        let (p0, q0) = initialize(4, 3, 3, Some(1));
        assert!(matches!(
            factor(r.view(), Some(p0), Some(q0), &FactorizationConfig::default()),
            Err(RecommendError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_model_state_machine() {
        let mut model = LatentFactorModel::new(fast_config(1, 5));
        assert_eq!(model.state(), ModelState::Uninitialized);
        assert!(model.predict(0, 0).is_err());

        model.fit(rank_one().view()).unwrap();
        assert_eq!(model.state(), ModelState::Trained);
        assert!(model.report().is_some());

        // Retraining overwrites the factors
        let first = model.user_factors().clone();
        model.fit(Array2::from_elem((4, 3), 2.0).view()).unwrap();
        assert_eq!(model.state(), ModelState::Trained);
        assert_ne!(&first, model.user_factors());
    }

    #[test]
    fn test_model_predicts_held_out_cell() {
        let truth = rank_one();
        let mut r = truth.clone();
        r[[3, 2]] = 0.0;

        let mut model = LatentFactorModel::new(fast_config(1, 9));
        let report = model.fit(r.view()).unwrap();
        assert!(report.converged);

        let predicted = model.predict(3, 2).unwrap().expect("held-out cell is unrated");
        assert!((predicted - truth[[3, 2]]).abs() < 1.0);

        // Rated cells are not predicted
        assert_eq!(model.predict(0, 0).unwrap(), None);
        assert!(model.predict(4, 0).is_err());
    }

    #[test]
    fn test_model_density() {
        let mut r = rank_one();
        r[[0, 0]] = 0.0;
        r[[1, 1]] = 0.0;
        r[[2, 2]] = 0.0;

        let mut model = LatentFactorModel::new(fast_config(2, 1));
        assert_eq!(model.density(), 0.0);
        model.fit(r.view()).unwrap();
        assert!((model.density() - 0.75).abs() < 1e-12);
        assert!((model.sparsity() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_from_factors_validates_shapes() {
        let r = rank_one();
        let config = FactorizationConfig::default();
        let (p, q) = initialize(4, 3, 2, Some(2));
        assert!(LatentFactorModel::from_factors(config.clone(), r.view(), p.clone(), q.clone()).is_ok());
        assert!(LatentFactorModel::from_factors(config, r.view(), q, p).is_err());
    }
}
