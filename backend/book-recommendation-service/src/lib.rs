pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

pub use models::{Book, BookRec, MergeMode, ModelStats, Rating, SeedRecommendations};
pub use services::{CatalogSource, InMemoryCatalog, JsonFileCatalog, RecommendationEngine};
