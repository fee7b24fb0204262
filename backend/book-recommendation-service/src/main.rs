use anyhow::Context;
use book_recommendation_service::config::Config;
use book_recommendation_service::jobs::{start_retrain_job, RetrainJobConfig};
use book_recommendation_service::services::{JsonFileCatalog, RecommendationEngine};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "book_recommendation_service={0},{0}",
            config.log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config);
    config.validate()?;

    info!(
        catalog = %config.catalog_path,
        ratings = %config.ratings_path,
        model = %config.model_path,
        "Starting book recommendation service"
    );

    let catalog = Arc::new(JsonFileCatalog::new(&config.catalog_path, &config.ratings_path));
    let engine = Arc::new(
        RecommendationEngine::new(catalog, config.engine.clone())
            .with_model_path(&config.model_path),
    );

    // The service stays up untrained; the retrain job tries again later
    match engine.initialize().await {
        Ok(stats) => info!(
            books = stats.total_books,
            books_with_ratings = stats.books_with_ratings,
            users = stats.unique_users,
            "Models ready"
        ),
        Err(e) => warn!(error = %e, "Models unavailable at startup"),
    }

    let retrain_handle = tokio::spawn(start_retrain_job(
        engine.clone(),
        RetrainJobConfig::from(&config),
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = retrain_handle => {
            if let Err(e) = result {
                error!(error = %e, "Retrain task exited unexpectedly");
            } else {
                // Disabled job returns right away; keep serving until shutdown
                tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
                info!("Received shutdown signal");
            }
        }
    }

    info!("Shutting down book recommendation service");
    Ok(())
}
