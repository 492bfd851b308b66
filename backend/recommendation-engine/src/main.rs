use anyhow::{Context, Result};
use recommendation_engine::{
    loader, Config, Dimension, ModelSnapshot, NeighborPredictor, RankingAggregator, RatingMatrix,
    RatingStore, Recommender,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("Failed to load config")?;
    let metric = config.metric()?;

    info!(
        ratings = %config.ratings_path,
        items = %config.items_path,
        metric = %metric,
        "Starting recommendation-engine"
    );

    let store = loader::load_store(&config.ratings_path, &config.items_path)
        .context("Failed to load rating data")?;
    let matrix = RatingMatrix::from_store(&store);

    info!(
        density = matrix.density(),
        sparsity = matrix.sparsity(),
        "Rating matrix built"
    );

    print_bayesian_top_rated(&store, &config)?;

    if let Some(user) = config.target_user {
        let predictor = NeighborPredictor::new(&store);

        println!("\nUsers most similar to {} ({}):", user, metric);
        for (critic, similarity) in
            predictor.rank_neighbors(user, metric, Dimension::Users, Some(config.top_n))?
        {
            println!("{:>5}: {:0.3}", critic, similarity);
        }

        println!("\nNeighbor-based predictions for user {}:", user);
        for (item_id, score) in predictor.predict_all(user, metric, Some(config.top_n))? {
            println!("{:0.3}: {}", score, title(&store, item_id));
        }
    }

    let recommender = load_or_build(matrix, &config)?;

    if let Some(user) = config.target_user {
        println!("\nLatent-factor recommendations for user {}:", user);
        for (item_id, score) in recommender.top_recommendations(user, config.top_n)? {
            println!("{:>5}: {:0.3} {}", item_id, score, title(&store, item_id));
        }
    }

    Ok(())
}

fn print_bayesian_top_rated(store: &RatingStore, config: &Config) -> Result<()> {
    let aggregator = RankingAggregator::new(store);

    println!("Top {} items by Bayesian average:", config.top_n);
    for ranked in aggregator.bayesian_top_rated(config.top_n, config.prior())? {
        println!(
            "[{:0.3} average rating ({} reviews)] {}",
            ranked.average,
            ranked.count,
            title(store, ranked.item_id)
        );
    }
    Ok(())
}

/// Restore a saved model matching this data set and these hyperparameters, otherwise train and save a new one
fn load_or_build(matrix: RatingMatrix, config: &Config) -> Result<Recommender> {
    let model_path = Path::new(&config.model_path);

    let factorization = config.factorization();

    if model_path.exists() {
        match ModelSnapshot::load(model_path) {
            Ok(snapshot) if !snapshot.trained_with(&factorization) => {
                warn!(path = %model_path.display(), "Saved model hyperparameters differ, retraining");
            }
            Ok(snapshot) => match snapshot.restore(matrix.clone()) {
                Ok(recommender) => {
                    info!(path = %model_path.display(), "Restored trained model");
                    return Ok(recommender);
                }
                Err(e) => {
                    warn!(error = %e, path = %model_path.display(), "Saved model unusable, retraining");
                }
            },
            Err(e) => {
                warn!(error = %e, path = %model_path.display(), "Saved model unusable, retraining");
            }
        }
    }

    let mut recommender = Recommender::new(matrix, factorization);
    let report = recommender.build()?;
    info!(
        steps_run = report.steps_run,
        final_error = report.final_error,
        converged = report.converged,
        "Training finished"
    );

    ModelSnapshot::from_recommender(&recommender)?
        .save(model_path)
        .with_context(|| format!("Failed to save model to {}", model_path.display()))?;

    Ok(recommender)
}

fn title(store: &RatingStore, item_id: u32) -> String {
    store
        .item(item_id)
        .map(|item| item.title.clone())
        .unwrap_or_else(|| format!("item {}", item_id))
}
