//! Periodic Retraining Background Job
//!
//! Rebuilds every model from the catalog source on a fixed interval so new
//! books and ratings reach recommendations without a restart. A failed cycle
//! leaves the previous models live and is retried on the next tick.

use crate::config::Config;
use crate::error::AppError;
use crate::services::RecommendationEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Default retrain interval (every 24 hours)
const RETRAIN_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct RetrainJobConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for RetrainJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: RETRAIN_INTERVAL,
        }
    }
}

impl From<&Config> for RetrainJobConfig {
    fn from(config: &Config) -> Self {
        Self {
            enabled: config.retrain_interval_seconds > 0,
            interval: Duration::from_secs(config.retrain_interval_seconds),
        }
    }
}

/// Start the retrain loop; returns immediately when disabled
pub async fn start_retrain_job(engine: Arc<RecommendationEngine>, config: RetrainJobConfig) {
    if !config.enabled {
        tracing::info!("Periodic retraining disabled by configuration");
        return;
    }

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Starting periodic retrain job"
    );

    loop {
        sleep(config.interval).await;
        run_retrain_cycle(&engine).await;
    }
}

/// One training run with logging; returns whether new models were published
pub async fn run_retrain_cycle(engine: &RecommendationEngine) -> bool {
    let cycle_start = Instant::now();

    match engine.train().await {
        Ok(stats) => {
            tracing::info!(
                books = stats.total_books,
                ratings = stats.total_ratings,
                users = stats.unique_users,
                sparsity = stats.sparsity,
                duration_ms = cycle_start.elapsed().as_millis() as u64,
                "Retrain cycle completed"
            );
            true
        }
        Err(AppError::TrainingInProgress) => {
            tracing::debug!("Training already in progress, skipping retrain cycle");
            false
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                duration_ms = cycle_start.elapsed().as_millis() as u64,
                "Retrain cycle failed"
            );
            false
        }
    }
}
