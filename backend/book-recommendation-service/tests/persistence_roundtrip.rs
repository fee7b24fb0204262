mod common;

use book_recommendation_service::{InMemoryCatalog, MergeMode, RecommendationEngine};
use book_recommendation_service::config::EngineConfig;
use common::{linked_ratings, space_and_cooking};
use std::sync::Arc;

#[tokio::test]
async fn restored_engine_answers_like_the_trained_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("hybrid_models.bin");

    let catalog = Arc::new(InMemoryCatalog::new(space_and_cooking(), linked_ratings()));
    let trained =
        RecommendationEngine::new(catalog, EngineConfig::default()).with_model_path(&path);
    trained.train().await.unwrap();
    assert!(path.exists());

    // An empty catalog makes training fail, so readiness proves the load
    let restored = RecommendationEngine::new(
        Arc::new(InMemoryCatalog::default()),
        EngineConfig::default(),
    )
    .with_model_path(&path);
    let stats = restored.initialize().await.unwrap();

    assert!(restored.is_ready().await);
    assert_eq!(stats, trained.stats().await);

    let seeds = vec!["Star Heroes".to_string()];
    for mode in [MergeMode::Weighted, MergeMode::RoundRobin] {
        let before = trained.recommend_by_seeds(&seeds, 5, mode).await.unwrap();
        let after = restored.recommend_by_seeds(&seeds, 5, mode).await.unwrap();
        assert_eq!(before.recommendations, after.recommendations);
    }
}

#[tokio::test]
async fn corrupt_model_file_triggers_training() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hybrid_models.bin");
    std::fs::write(&path, b"garbage").unwrap();

    let catalog = Arc::new(InMemoryCatalog::new(space_and_cooking(), linked_ratings()));
    let engine = RecommendationEngine::new(catalog, EngineConfig::default()).with_model_path(&path);
    let stats = engine.initialize().await.unwrap();

    assert_eq!(stats.total_books, 3);
    assert!(engine.is_ready().await);
}

#[tokio::test]
async fn missing_model_and_empty_catalog_is_a_training_failure() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RecommendationEngine::new(
        Arc::new(InMemoryCatalog::default()),
        EngineConfig::default(),
    )
    .with_model_path(dir.path().join("absent.bin"));
    assert!(engine.initialize().await.is_err());
    assert!(!engine.is_ready().await);
}
