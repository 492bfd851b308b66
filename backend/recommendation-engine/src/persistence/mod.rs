//! Versioned model snapshots
//!
//! A snapshot holds exactly the user/item id orderings, P, Q and the
//! hyperparameters. Matrices are stored row-major. Only `SNAPSHOT_VERSION`
//! is readable; there is no compatibility with other layouts.

use crate::error::{RecommendError, Result};
use crate::services::{FactorizationConfig, LatentFactorModel, ModelState, RatingMatrix, Recommender};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: u32,
    pub user_ids: Vec<u32>,
    pub item_ids: Vec<u32>,
    pub config: FactorizationConfig,
    pub p: Vec<Vec<f64>>,
    pub q: Vec<Vec<f64>>,
}

impl ModelSnapshot {
    /// Capture a trained recommender
    pub fn from_recommender(recommender: &Recommender) -> Result<Self> {
        let model = recommender.model();
        if model.state() != ModelState::Trained {
            return Err(RecommendError::Serialization(
                "cannot snapshot an untrained model".to_string(),
            ));
        }

        Ok(Self {
            version: SNAPSHOT_VERSION,
            user_ids: recommender.matrix().user_ids().to_vec(),
            item_ids: recommender.matrix().item_ids().to_vec(),
            config: model.config().clone(),
            p: to_rows(model.user_factors()),
            q: to_rows(model.item_factors()),
        })
    }

    /// Rebuild a recommender over `matrix`, which must share the snapshot's id orderings
    pub fn restore(self, matrix: RatingMatrix) -> Result<Recommender> {
        self.check_version()?;

        if matrix.user_ids() != self.user_ids.as_slice() || matrix.item_ids() != self.item_ids.as_slice() {
            return Err(RecommendError::DimensionMismatch(
                "snapshot id orderings differ from the rating matrix".to_string(),
            ));
        }

        let k = self.config.latent_factors;
        let p = from_rows(&self.p, k)?;
        let q = from_rows(&self.q, k)?;
        let model = LatentFactorModel::from_factors(self.config, matrix.values().view(), p, q)?;

        Ok(Recommender::from_parts(matrix, model))
    }

    /// Whether the snapshot was trained with `config`'s hyperparameters
    ///
    /// The seed only picks the starting point, so it is not compared.
    pub fn trained_with(&self, config: &FactorizationConfig) -> bool {
        let trained = &self.config;
        trained.latent_factors == config.latent_factors
            && trained.steps == config.steps
            && trained.alpha == config.alpha
            && trained.beta == config.beta
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;

        info!(
            path = %path.display(),
            users = self.user_ids.len(),
            items = self.item_ids.len(),
            "Model snapshot saved"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        snapshot.check_version()?;

        info!(path = %path.display(), version = snapshot.version, "Model snapshot loaded");
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(RecommendError::Serialization(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }
}

fn to_rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn from_rows(rows: &[Vec<f64>], k: usize) -> Result<Array2<f64>> {
    if let Some(bad) = rows.iter().find(|row| row.len() != k) {
        return Err(RecommendError::DimensionMismatch(format!(
            "factor row has {} columns, expected {}",
            bad.len(),
            k
        )));
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), k), flat)
        .map_err(|e| RecommendError::DimensionMismatch(e.to_string()))
}
