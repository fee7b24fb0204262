// ============================================
// Hybrid Book Recommendation Engine
// ============================================
//
// Combines:
// 1. Content similarity (TF-IDF over title, author, description, categories)
// 2. Collaborative similarity (truncated SVD over the rating matrix)
//
// Architecture:
//   CatalogSource → ModelState::train (blocking pool) → Arc swap → persist
//                                                          ↓
//   queries ── clone Arc snapshot ── neighbour lookups ── merge ── BookRec

pub mod fold_in;
pub mod hybrid_merger;
pub mod latent_factors;
pub mod model_state;
pub mod neighbors;
pub mod persistence;
pub mod rating_matrix;
mod stop_words;
pub mod text_features;

pub use hybrid_merger::SeedCandidates;
pub use model_state::{BookCatalog, ModelState};
pub use rating_matrix::{IdIndex, RatingMatrix};

use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::models::{BookRec, EngineHealth, MergeMode, ModelStats, SeedRecommendations};
use crate::services::catalog::CatalogSource;
use hybrid_merger::{round_robin_merge, top_rated, weighted_merge, UserPicks};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

pub const MAX_LIMIT: usize = 100;
pub const MAX_SEED_TITLES: usize = 10;
const MIN_RATING_THRESHOLD: f32 = 1.0;
const MAX_RATING_THRESHOLD: f32 = 10.0;

pub fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

fn validate_titles(titles: &[String]) -> Result<()> {
    if titles.is_empty() || titles.len() > MAX_SEED_TITLES {
        return Err(AppError::Validation(format!(
            "between 1 and {MAX_SEED_TITLES} book titles are required, got {}",
            titles.len()
        )));
    }
    Ok(())
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if !(MIN_RATING_THRESHOLD..=MAX_RATING_THRESHOLD).contains(&threshold) {
        return Err(AppError::Validation(format!(
            "min_rating_threshold must be between {MIN_RATING_THRESHOLD} and {MAX_RATING_THRESHOLD}, got {threshold}"
        )));
    }
    Ok(())
}

/// Live engine: one published [`ModelState`] snapshot plus a training guard
pub struct RecommendationEngine {
    state: RwLock<Arc<ModelState>>,
    training: Mutex<()>,
    catalog: Arc<dyn CatalogSource>,
    config: EngineConfig,
    model_path: Option<PathBuf>,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<dyn CatalogSource>, config: EngineConfig) -> Self {
        Self {
            state: RwLock::new(Arc::new(ModelState::empty())),
            training: Mutex::new(()),
            catalog,
            config,
            model_path: None,
        }
    }

    /// Persist every trained snapshot to `path` and restore from it on startup
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Current snapshot; never blocks on training
    pub async fn snapshot(&self) -> Arc<ModelState> {
        self.state.read().await.clone()
    }

    async fn ready_snapshot(&self) -> Result<Arc<ModelState>> {
        let snapshot = self.snapshot().await;
        if !snapshot.is_ready() {
            return Err(AppError::NotReady(
                "Models not loaded. Please retrain first.".to_string(),
            ));
        }
        Ok(snapshot)
    }

    pub async fn is_ready(&self) -> bool {
        self.snapshot().await.is_ready()
    }

    async fn publish(&self, state: ModelState) {
        *self.state.write().await = Arc::new(state);
    }

    /// Restore the persisted snapshot, or train when there is none
    pub async fn initialize(&self) -> Result<ModelStats> {
        if let Some(path) = self.model_path.clone() {
            let restored = tokio::task::spawn_blocking(move || persistence::load(&path))
                .await
                .map_err(|e| AppError::Internal(format!("Model load task panicked: {e}")))?;

            if let Some(state) = restored.filter(ModelState::is_ready) {
                let stats = state.stats.clone();
                self.publish(state).await;
                info!(
                    books = stats.total_books,
                    last_retrain = ?stats.last_retrain,
                    "Restored persisted models"
                );
                return Ok(stats);
            }
        }

        info!("No usable persisted models, training from scratch");
        self.train().await
    }

    /// Rebuild every model from the catalog source and publish the result.
    ///
    /// On failure the previously published snapshot stays live.
    pub async fn train(&self) -> Result<ModelStats> {
        let _guard = self
            .training
            .try_lock()
            .map_err(|_| AppError::TrainingInProgress)?;
        let started = Instant::now();
        info!("Starting model training");

        let books = self
            .catalog
            .load_books()
            .await
            .map_err(|e| AppError::DataSource(e.to_string()))?;
        let ratings = self
            .catalog
            .load_ratings()
            .await
            .map_err(|e| AppError::DataSource(e.to_string()))?;

        let config = self.config.clone();
        let trained =
            tokio::task::spawn_blocking(move || ModelState::train(books, &ratings, &config))
                .await
                .map_err(|e| AppError::Internal(format!("Training task panicked: {e}")))?;

        let state = match trained {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Model training failed");
                return Err(e);
            }
        };

        let stats = state.stats.clone();
        let state = Arc::new(state);
        *self.state.write().await = state.clone();

        info!(
            books = stats.total_books,
            ratings = stats.total_ratings,
            users = stats.unique_users,
            collaborative = state.collaborative_enabled(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Model training completed"
        );

        if let Some(path) = self.model_path.clone() {
            let saved = tokio::task::spawn_blocking(move || persistence::save(&state, &path)).await;
            match saved {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Failed to persist models"),
                Err(e) => warn!(error = %e, "Model save task panicked"),
            }
        }

        Ok(stats)
    }

    fn to_book_recs(state: &ModelState, isbns: Vec<String>) -> Vec<BookRec> {
        isbns
            .into_iter()
            .filter_map(|isbn| {
                state.catalog.get(&isbn).map(|book| BookRec {
                    title: book.title.clone(),
                    isbn,
                })
            })
            .collect()
    }

    /// Hybrid recommendations for one or more seed titles
    pub async fn recommend_by_seeds(
        &self,
        titles: &[String],
        limit: usize,
        mode: MergeMode,
    ) -> Result<SeedRecommendations> {
        validate_limit(limit)?;
        validate_titles(titles)?;
        let state = self.ready_snapshot().await?;

        let mut seeds = Vec::new();
        let mut not_found = Vec::new();
        for title in titles {
            match state.resolve_title(title) {
                Some(book) => seeds.push(book.isbn.clone()),
                None => not_found.push(title.clone()),
            }
        }
        if seeds.is_empty() {
            return Err(AppError::SeedsNotFound(not_found));
        }

        let fetch = match mode {
            MergeMode::Weighted => limit * 2,
            MergeMode::RoundRobin => limit,
        };

        let mut candidates = Vec::with_capacity(seeds.len());
        let mut skipped = 0;
        for isbn in &seeds {
            match state.seed_candidates(isbn, fetch) {
                Ok(found) => candidates.push(found),
                Err(e) => {
                    skipped += 1;
                    warn!(isbn = %isbn, error = %e, "Skipping seed after neighbour lookup failure");
                }
            }
        }

        let in_catalog = |isbn: &str| state.catalog.contains(isbn);
        let merged = match mode {
            MergeMode::Weighted => {
                weighted_merge(&candidates, &self.config.merge, in_catalog, limit)
            }
            MergeMode::RoundRobin => round_robin_merge(&candidates, in_catalog, limit),
        };
        if merged.is_empty() {
            return Err(AppError::NoCandidates(
                "no recommendations could be generated for the provided books".to_string(),
            ));
        }

        let recommendations = Self::to_book_recs(&state, merged);
        info!(
            seeds = seeds.len(),
            not_found = not_found.len(),
            skipped,
            recommendations = recommendations.len(),
            mode = ?mode,
            "Generated seed recommendations"
        );

        Ok(SeedRecommendations {
            recommendations,
            not_found,
            skipped,
        })
    }

    /// Neighbour-user picks, then content fill from the user's top-rated books.
    /// Only top-rated books at or above `min_rating_threshold` seed the fill.
    pub async fn recommend_for_user(
        &self,
        user_id: &str,
        limit: usize,
        min_rating_threshold: f32,
    ) -> Result<Vec<BookRec>> {
        validate_limit(limit)?;
        validate_threshold(min_rating_threshold)?;
        let state = self.ready_snapshot().await?;

        let user_ratings = self
            .catalog
            .user_ratings(user_id)
            .await
            .map_err(|e| AppError::DataSource(e.to_string()))?;
        if user_ratings.is_empty() {
            return Err(AppError::NotFound(format!(
                "No ratings found for user: {user_id}"
            )));
        }

        let mut picks = UserPicks::new(user_ratings.iter().map(|(isbn, _)| isbn), limit);
        let mut skipped = 0usize;

        match state.similar_users(user_id, self.config.similar_users) {
            Ok(Some(neighbors)) => {
                for neighbor in neighbors {
                    if picks.is_full() {
                        break;
                    }
                    match self.catalog.user_ratings(&neighbor).await {
                        Ok(ratings) => {
                            for (isbn, rating) in ratings {
                                if rating >= min_rating_threshold && state.catalog.contains(&isbn) {
                                    picks.offer(&isbn);
                                }
                            }
                        }
                        Err(e) => {
                            skipped += 1;
                            warn!(neighbor = %neighbor, error = %e, "Skipping neighbour ratings");
                        }
                    }
                }
            }
            Ok(None) => debug!(user_id, "User not in collaborative index, using content only"),
            Err(e) => {
                skipped += 1;
                warn!(user_id, error = %e, "Similar user lookup failed");
            }
        }

        let from_neighbors = picks.len();
        if !picks.is_full() {
            for (isbn, rating) in top_rated(&user_ratings, self.config.content_fill_seeds) {
                if picks.is_full() {
                    break;
                }
                if rating < min_rating_threshold {
                    continue;
                }
                match state.content_neighbors(isbn, self.config.content_fill_per_seed) {
                    Ok(neighbors) => {
                        for candidate in neighbors {
                            if state.catalog.contains(&candidate) {
                                picks.offer(&candidate);
                            }
                        }
                    }
                    Err(e) => {
                        skipped += 1;
                        warn!(isbn = %isbn, error = %e, "Skipping content fill seed");
                    }
                }
            }
        }

        if picks.is_empty() {
            return Err(AppError::NoCandidates(format!(
                "no recommendations could be generated for user: {user_id}"
            )));
        }

        info!(
            user_id,
            from_neighbors,
            from_content = picks.len() - from_neighbors,
            skipped,
            "Generated user recommendations"
        );
        Ok(Self::to_book_recs(&state, picks.into_picks()))
    }

    /// Fold-in recommendations for an arbitrary rating map
    pub async fn recommend_cold_start(
        &self,
        ratings: &HashMap<String, f32>,
        limit: usize,
    ) -> Result<Vec<String>> {
        validate_limit(limit)?;
        if ratings.is_empty() {
            return Err(AppError::Validation("at least one rating is required".to_string()));
        }
        let state = self.ready_snapshot().await?;
        state.cold_start(ratings, limit)
    }

    /// Books whose text is most similar to a free-text query
    pub async fn recommend_by_text(&self, query: &str, limit: usize) -> Result<Vec<BookRec>> {
        validate_limit(limit)?;
        if query.trim().is_empty() {
            return Err(AppError::Validation("query text is required".to_string()));
        }
        let state = self.ready_snapshot().await?;
        let isbns = state.similar_to_text(query, limit)?;
        Ok(Self::to_book_recs(&state, isbns))
    }

    pub async fn stats(&self) -> ModelStats {
        self.snapshot().await.stats.clone()
    }

    pub async fn health(&self) -> EngineHealth {
        let state = self.snapshot().await;
        EngineHealth {
            status: if state.is_ready() { "healthy" } else { "not_ready" }.to_string(),
            models_loaded: state.is_ready(),
            collaborative_enabled: state.collaborative_enabled(),
            total_books: state.catalog.len(),
            books_with_ratings: state.stats.books_with_ratings,
            last_retrain: state.stats.last_retrain,
        }
    }
}
