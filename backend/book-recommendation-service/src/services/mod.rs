//! Service layer for book-recommendation-service
//!
//! - catalog: book and rating suppliers
//! - recommendation: hybrid content + collaborative engine

pub mod catalog;
pub mod recommendation;

pub use catalog::{CatalogSource, InMemoryCatalog, JsonFileCatalog};
pub use recommendation::RecommendationEngine;
