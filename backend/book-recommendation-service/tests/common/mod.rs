#![allow(dead_code)]

use book_recommendation_service::config::EngineConfig;
use book_recommendation_service::{Book, InMemoryCatalog, Rating, RecommendationEngine};
use std::sync::Arc;

pub fn book(isbn: &str, title: &str, description: &str) -> Book {
    Book {
        isbn: isbn.to_string(),
        title: title.to_string(),
        author: String::new(),
        year: String::new(),
        description: description.to_string(),
        categories: String::new(),
        average_rating: 0.0,
        ratings_count: 0,
    }
}

/// A and B share "space opera"; C shares nothing with them
pub fn space_and_cooking() -> Vec<Book> {
    vec![
        book("A", "Star Heroes", "space opera heroes"),
        book("B", "Star Villains", "space opera villains"),
        book("C", "Kitchen Basics", "cooking recipes"),
    ]
}

/// Sixty users rate both A and B; nobody rates C
pub fn linked_ratings() -> Vec<Rating> {
    let mut ratings = Vec::new();
    for i in 0..60 {
        let user = format!("u{i}");
        ratings.push(Rating::new(user.clone(), "A", 5.0 + (i % 5) as f32));
        ratings.push(Rating::new(user, "B", 4.0 + (i % 6) as f32));
    }
    ratings
}

pub fn engine_with(catalog: Arc<InMemoryCatalog>) -> RecommendationEngine {
    RecommendationEngine::new(catalog, EngineConfig::default())
}

pub fn isbns(recs: &[book_recommendation_service::BookRec]) -> Vec<&str> {
    recs.iter().map(|r| r.isbn.as_str()).collect()
}
