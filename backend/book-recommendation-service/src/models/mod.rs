use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Book record as supplied by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(alias = "isbn10", alias = "ISBN")]
    pub isbn: String,
    pub title: String,
    #[serde(default, alias = "authors")]
    pub author: String,
    #[serde(default, alias = "published_year")]
    pub year: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub average_rating: f32,
    #[serde(default)]
    pub ratings_count: u32,
}

impl Book {
    /// Concatenated text fed to the content model
    pub fn content_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title, self.author, self.description, self.categories
        )
    }
}

/// A single (user, book, rating) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(alias = "User-ID")]
    pub user_id: String,
    #[serde(alias = "isbn10", alias = "ISBN")]
    pub isbn: String,
    #[serde(alias = "Book-Rating")]
    pub rating: f32,
}

impl Rating {
    pub fn new(user_id: impl Into<String>, isbn: impl Into<String>, rating: f32) -> Self {
        Self {
            user_id: user_id.into(),
            isbn: isbn.into(),
            rating,
        }
    }
}

/// Recommended book as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRec {
    pub isbn: String,
    pub title: String,
}

/// How multi-seed candidates are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Score-weighted accumulation across seeds and methods
    Weighted,
    /// Per-seed interleaving, then round-robin across seeds
    RoundRobin,
}

/// Result of a multi-seed recommendation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedRecommendations {
    pub recommendations: Vec<BookRec>,
    /// Seed titles that did not resolve to a catalog book
    pub not_found: Vec<String>,
    /// Seeds whose neighbour lookups failed and were left out
    pub skipped: usize,
}

/// Summary statistics of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub last_retrain: Option<DateTime<Utc>>,
    pub total_ratings: usize,
    pub total_books: usize,
    pub books_with_ratings: usize,
    pub unique_users: usize,
    pub model_size_mb: f64,
    pub sparsity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineHealth {
    pub status: String,
    pub models_loaded: bool,
    pub collaborative_enabled: bool,
    pub total_books: usize,
    pub books_with_ratings: usize,
    pub last_retrain: Option<DateTime<Utc>>,
}
