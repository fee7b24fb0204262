//! Data suppliers for the recommendation engine.
//!
//! The engine never talks to storage directly; it asks a [`CatalogSource`]
//! for the full book list, the full rating list, and a single user's ratings.

use crate::models::{Book, Rating};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Supplier of catalog and rating data
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_books(&self) -> Result<Vec<Book>>;
    async fn load_ratings(&self) -> Result<Vec<Rating>>;
    /// Positive ratings of one user as `(isbn, rating)`, in supplier order
    async fn user_ratings(&self, user_id: &str) -> Result<Vec<(String, f32)>>;
}

/// Reads JSON arrays of books and ratings from disk on every call
pub struct JsonFileCatalog {
    books_path: PathBuf,
    ratings_path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(books_path: impl Into<PathBuf>, ratings_path: impl Into<PathBuf>) -> Self {
        Self {
            books_path: books_path.into(),
            ratings_path: ratings_path.into(),
        }
    }

    async fn read_ratings(&self) -> Result<Vec<Rating>> {
        let bytes = tokio::fs::read(&self.ratings_path)
            .await
            .with_context(|| {
                format!("Failed to read ratings from {}", self.ratings_path.display())
            })?;
        let records: Vec<RatingRecord> =
            serde_json::from_slice(&bytes).context("Failed to parse ratings file")?;

        Ok(records.into_iter().map(Rating::from).collect())
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    async fn load_books(&self) -> Result<Vec<Book>> {
        let bytes = tokio::fs::read(&self.books_path)
            .await
            .with_context(|| format!("Failed to read books from {}", self.books_path.display()))?;
        let records: Vec<BookRecord> =
            serde_json::from_slice(&bytes).context("Failed to parse books file")?;

        let total = records.len();
        let books: Vec<Book> = records.into_iter().filter_map(BookRecord::into_book).collect();

        info!(
            books = books.len(),
            dropped = total - books.len(),
            path = %self.books_path.display(),
            "Loaded books from file"
        );
        Ok(books)
    }

    async fn load_ratings(&self) -> Result<Vec<Rating>> {
        let ratings = self.read_ratings().await?;
        info!(
            ratings = ratings.len(),
            path = %self.ratings_path.display(),
            "Loaded ratings from file"
        );
        Ok(ratings)
    }

    async fn user_ratings(&self, user_id: &str) -> Result<Vec<(String, f32)>> {
        let ratings = self.read_ratings().await?;
        let user: Vec<(String, f32)> = ratings
            .into_iter()
            .filter(|r| r.user_id == user_id && !r.isbn.is_empty() && r.rating > 0.0)
            .map(|r| (r.isbn, r.rating))
            .collect();

        debug!(user_id, ratings = user.len(), "Loaded user ratings");
        Ok(user)
    }
}

/// Catalog held in memory; used by tests and embedding callers
#[derive(Default)]
pub struct InMemoryCatalog {
    books: RwLock<Vec<Book>>,
    ratings: RwLock<Vec<Rating>>,
}

impl InMemoryCatalog {
    pub fn new(books: Vec<Book>, ratings: Vec<Rating>) -> Self {
        Self {
            books: RwLock::new(books),
            ratings: RwLock::new(ratings),
        }
    }

    pub async fn set_books(&self, books: Vec<Book>) {
        *self.books.write().await = books;
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn load_books(&self) -> Result<Vec<Book>> {
        Ok(self.books.read().await.clone())
    }

    async fn load_ratings(&self) -> Result<Vec<Rating>> {
        Ok(self.ratings.read().await.clone())
    }

    async fn user_ratings(&self, user_id: &str) -> Result<Vec<(String, f32)>> {
        Ok(self
            .ratings
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && r.rating > 0.0)
            .map(|r| (r.isbn.clone(), r.rating))
            .collect())
    }
}

// Wire records: dumps store ids as strings or numbers and use several field names.

#[derive(Deserialize)]
struct BookRecord {
    #[serde(default, alias = "isbn10", alias = "ISBN", deserialize_with = "lenient_string")]
    isbn: String,
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default, alias = "authors", deserialize_with = "lenient_string")]
    author: String,
    #[serde(default, alias = "published_year", deserialize_with = "lenient_string")]
    year: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    categories: String,
    #[serde(default)]
    average_rating: Option<f32>,
    #[serde(default)]
    ratings_count: Option<u32>,
}

impl BookRecord {
    /// Records without an ISBN or a title are not catalog books
    fn into_book(self) -> Option<Book> {
        if self.isbn.is_empty() || self.title.is_empty() {
            return None;
        }

        Some(Book {
            isbn: self.isbn,
            title: self.title,
            author: self.author,
            year: self.year,
            description: self.description,
            categories: self.categories,
            average_rating: self.average_rating.unwrap_or(0.0),
            ratings_count: self.ratings_count.unwrap_or(0),
        })
    }
}

#[derive(Deserialize)]
struct RatingRecord {
    #[serde(alias = "User-ID", deserialize_with = "lenient_string")]
    user_id: String,
    #[serde(default, alias = "isbn10", alias = "ISBN", deserialize_with = "lenient_string")]
    isbn: String,
    #[serde(default, alias = "Book-Rating")]
    rating: f32,
}

impl From<RatingRecord> for Rating {
    fn from(record: RatingRecord) -> Self {
        Rating::new(record.user_id, record.isbn, record.rating)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
        Raw::Float(f) => f.to_string(),
        Raw::Null => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_json_catalog_accepts_aliases() {
        let books = write_json(
            r#"[
                {"isbn10": 441013597, "title": "Dune", "authors": "Frank Herbert", "published_year": 1965},
                {"isbn": "0002", "title": "Emma", "description": null},
                {"isbn": "", "title": "No isbn"},
                {"isbn": "0003"}
            ]"#,
        );
        let ratings = write_json("[]");
        let catalog = JsonFileCatalog::new(books.path(), ratings.path());

        let loaded = catalog.load_books().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].isbn, "441013597");
        assert_eq!(loaded[0].author, "Frank Herbert");
        assert_eq!(loaded[0].year, "1965");
        assert_eq!(loaded[1].description, "");
    }

    #[tokio::test]
    async fn test_json_catalog_user_ratings_positive_only() {
        let books = write_json("[]");
        let ratings = write_json(
            r#"[
                {"User-ID": 7, "ISBN": "0001", "Book-Rating": 8},
                {"User-ID": 7, "ISBN": "0002", "Book-Rating": 0},
                {"User-ID": 9, "ISBN": "0003", "Book-Rating": 5},
                {"user_id": "7", "isbn": "0004", "rating": 6.5}
            ]"#,
        );
        let catalog = JsonFileCatalog::new(books.path(), ratings.path());

        let user = catalog.user_ratings("7").await.unwrap();
        assert_eq!(
            user,
            vec![("0001".to_string(), 8.0), ("0004".to_string(), 6.5)]
        );
        assert_eq!(catalog.load_ratings().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_json_catalog_missing_file() {
        let catalog = JsonFileCatalog::new("/nonexistent/books.json", "/nonexistent/ratings.json");
        assert!(catalog.load_books().await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_catalog_user_ratings() {
        let catalog = InMemoryCatalog::new(
            Vec::new(),
            vec![
                Rating::new("u1", "a", 5.0),
                Rating::new("u1", "b", -1.0),
                Rating::new("u2", "c", 3.0),
            ],
        );

        let ratings = catalog.user_ratings("u1").await.unwrap();
        assert_eq!(ratings, vec![("a".to_string(), 5.0)]);
    }
}
