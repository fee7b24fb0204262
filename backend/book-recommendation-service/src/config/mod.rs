use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data suppliers
    pub catalog_path: String,
    pub ratings_path: String,

    // Trained state
    pub model_path: String,

    // Periodic retraining (0 = disabled)
    pub retrain_interval_seconds: u64,

    // Observability
    pub log_level: String,
    pub log_format: String,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Tuning knobs of the hybrid engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_ratings_per_user: usize,
    pub min_ratings_per_book: usize,
    /// Collaborative training is skipped below this many filtered ratings
    pub min_collaborative_ratings: usize,

    pub svd_components: usize,
    pub svd_oversamples: usize,
    pub svd_power_iterations: usize,
    pub random_seed: u64,

    pub content_features: usize,
    pub content_min_df: usize,
    pub content_max_df: f64,

    /// Neighbour users consulted by user-based recommendations
    pub similar_users: usize,
    /// Highest-rated books used to fill user-based results from content
    pub content_fill_seeds: usize,
    pub content_fill_per_seed: usize,

    pub merge: MergeWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_ratings_per_user: 2,
            min_ratings_per_book: 3,
            min_collaborative_ratings: 100,
            svd_components: 50,
            svd_oversamples: 10,
            svd_power_iterations: 4,
            random_seed: 42,
            content_features: 5000,
            content_min_df: 2,
            content_max_df: 0.8,
            similar_users: 10,
            content_fill_seeds: 3,
            content_fill_per_seed: 10,
            merge: MergeWeights::default(),
        }
    }
}

/// Score constants of the weighted multi-seed merge.
///
/// Rank `r` in a collaborative list scores `collaborative_base - collaborative_decay * r`,
/// in a content list `content_base - content_decay * r`. A candidate seen again
/// accumulates `repeat_bonus` times the new contribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeWeights {
    pub collaborative_base: f64,
    pub collaborative_decay: f64,
    pub content_base: f64,
    pub content_decay: f64,
    pub repeat_bonus: f64,
}

impl Default for MergeWeights {
    fn default() -> Self {
        Self {
            collaborative_base: 2.0,
            collaborative_decay: 0.1,
            content_base: 1.0,
            content_decay: 0.05,
            repeat_bonus: 0.5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("catalog_path", "./data/books.json")?
            .set_default("ratings_path", "./data/ratings.json")?
            .set_default("model_path", "./artifacts/hybrid_models.bin")?
            .set_default("retrain_interval_seconds", 86400)? // 24 hours
            .set_default("log_level", "info")?
            .set_default("log_format", "text")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog_path.is_empty() {
            return Err(anyhow!("Catalog path is required"));
        }

        if self.ratings_path.is_empty() {
            return Err(anyhow!("Ratings path is required"));
        }

        if self.model_path.is_empty() {
            return Err(anyhow!("Model path is required"));
        }

        self.engine.validate()
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_ratings_per_user == 0 || self.min_ratings_per_book == 0 {
            return Err(anyhow!("Minimum rating counts must be greater than 0"));
        }

        if self.svd_components == 0 {
            return Err(anyhow!("SVD components must be greater than 0"));
        }

        if self.content_features == 0 {
            return Err(anyhow!("Content features must be greater than 0"));
        }

        if !(self.content_max_df > 0.0 && self.content_max_df <= 1.0) {
            return Err(anyhow!("Content max_df must be in (0, 1]"));
        }

        if self.similar_users == 0 {
            return Err(anyhow!("Similar users must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            catalog_path: "./data/books.json".to_string(),
            ratings_path: "./data/ratings.json".to_string(),
            model_path: "./artifacts/hybrid_models.bin".to_string(),
            retrain_interval_seconds: 86400,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_max_df() {
        let mut config = test_config();
        config.engine.content_max_df = 0.0;
        assert!(config.validate().is_err());

        config.engine.content_max_df = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_paths() {
        let mut config = test_config();
        config.model_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_merge_weights() {
        let weights = MergeWeights::default();
        assert_eq!(weights.collaborative_base, 2.0);
        assert_eq!(weights.collaborative_decay, 0.1);
        assert_eq!(weights.content_base, 1.0);
        assert_eq!(weights.content_decay, 0.05);
        assert_eq!(weights.repeat_bonus, 0.5);
    }
}
