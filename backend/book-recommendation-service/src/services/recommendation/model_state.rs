// ============================================
// Model State Container
// ============================================
//
// One immutable snapshot of everything a query needs:
//   catalog        (always)
//   content model  (TF-IDF vectorizer + sparse index + ISBN ↔ row)
//   collaborative  (singular values + item/user factor indexes + id maps)
//   stats
//
// A snapshot is either untrained (`ModelState::empty`) or fully built by
// `ModelState::train`; it is never mutated after construction.

use super::fold_in::{fold_in, project_to_item_space};
use super::hybrid_merger::SeedCandidates;
use super::latent_factors::{target_rank, truncated_svd, SvdParams};
use super::neighbors::{DenseNeighborIndex, SparseNeighborIndex};
use super::rating_matrix::{IdIndex, RatingMatrix};
use super::text_features::{ContentFeatures, TfidfVectorizer, VectorizerParams};
use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::models::{Book, ModelStats, Rating};
use chrono::Utc;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Catalog keyed by ISBN, with a case-insensitive title lookup.
///
/// A later record with an already-seen ISBN replaces the earlier one in place.
/// Titles resolve to the first book in catalog order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Book>", into = "Vec<Book>")]
pub struct BookCatalog {
    books: Vec<Book>,
    positions: HashMap<String, usize>,
    titles: HashMap<String, usize>,
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

impl BookCatalog {
    pub fn new(records: Vec<Book>) -> Self {
        let mut books: Vec<Book> = Vec::with_capacity(records.len());
        let mut positions = HashMap::with_capacity(records.len());
        for book in records {
            match positions.get(&book.isbn) {
                Some(&pos) => books[pos] = book,
                None => {
                    positions.insert(book.isbn.clone(), books.len());
                    books.push(book);
                }
            }
        }

        let mut titles = HashMap::with_capacity(books.len());
        for (pos, book) in books.iter().enumerate() {
            titles.entry(title_key(&book.title)).or_insert(pos);
        }

        Self {
            books,
            positions,
            titles,
        }
    }

    pub fn get(&self, isbn: &str) -> Option<&Book> {
        self.positions.get(isbn).map(|&pos| &self.books[pos])
    }

    pub fn contains(&self, isbn: &str) -> bool {
        self.positions.contains_key(isbn)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&Book> {
        self.titles.get(&title_key(title)).map(|&pos| &self.books[pos])
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl From<Vec<Book>> for BookCatalog {
    fn from(books: Vec<Book>) -> Self {
        BookCatalog::new(books)
    }
}

impl From<BookCatalog> for Vec<Book> {
    fn from(catalog: BookCatalog) -> Self {
        catalog.books
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentModel {
    pub vectorizer: TfidfVectorizer,
    pub index: SparseNeighborIndex,
    pub ids: IdIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeModel {
    pub singular_values: Array1<f32>,
    /// Rows are item factors (V)
    pub item_index: DenseNeighborIndex,
    /// Rows are user factors (UΣ)
    pub user_index: DenseNeighborIndex,
    pub users: IdIndex,
    pub items: IdIndex,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelState {
    pub catalog: BookCatalog,
    pub content: Option<ContentModel>,
    pub collaborative: Option<CollaborativeModel>,
    pub stats: ModelStats,
}

impl ModelState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a complete snapshot. Any failure aborts the whole run.
    pub fn train(books: Vec<Book>, ratings: &[Rating], config: &EngineConfig) -> Result<Self> {
        if books.is_empty() {
            return Err(AppError::Training("No books found in catalog".to_string()));
        }

        let catalog = BookCatalog::new(books);
        let features = ContentFeatures::build(catalog.books(), VectorizerParams::from(config))?;
        let content = ContentModel {
            index: SparseNeighborIndex::new(features.matrix),
            vectorizer: features.vectorizer,
            ids: features.ids,
        };

        let matrix = RatingMatrix::build(
            ratings,
            config.min_ratings_per_user,
            config.min_ratings_per_book,
        );
        let collaborative = Self::train_collaborative(&matrix, config)?;

        let mut state = Self {
            stats: ModelStats {
                last_retrain: Some(Utc::now()),
                total_ratings: ratings.iter().filter(|r| r.rating > 0.0).count(),
                total_books: catalog.len(),
                books_with_ratings: matrix.items.len(),
                unique_users: matrix.users.len(),
                model_size_mb: 0.0,
                sparsity: matrix.sparsity(),
            },
            catalog,
            content: Some(content),
            collaborative,
        };
        state.stats.model_size_mb = bincode::serialized_size(&state)? as f64 / (1024.0 * 1024.0);

        info!(
            books = state.stats.total_books,
            ratings = state.stats.total_ratings,
            collaborative = state.collaborative.is_some(),
            model_size_mb = state.stats.model_size_mb,
            "Model state trained"
        );
        Ok(state)
    }

    fn train_collaborative(
        matrix: &RatingMatrix,
        config: &EngineConfig,
    ) -> Result<Option<CollaborativeModel>> {
        if matrix.is_empty() || matrix.triples < config.min_collaborative_ratings {
            info!(
                ratings = matrix.triples,
                required = config.min_collaborative_ratings,
                "Not enough ratings for collaborative filtering, running content-only"
            );
            return Ok(None);
        }
        if target_rank(config.svd_components, matrix.matrix.shape()) == 0 {
            info!(
                users = matrix.users.len(),
                items = matrix.items.len(),
                "Rating matrix too small to factorise, running content-only"
            );
            return Ok(None);
        }

        let factors = truncated_svd(&matrix.matrix, &SvdParams::from(config))?;
        debug!(rank = factors.rank(), "Latent factors trained");

        Ok(Some(CollaborativeModel {
            singular_values: factors.singular_values,
            item_index: DenseNeighborIndex::new(factors.item_factors),
            user_index: DenseNeighborIndex::new(factors.user_factors),
            users: matrix.users.clone(),
            items: matrix.items.clone(),
        }))
    }

    pub fn is_ready(&self) -> bool {
        self.content.is_some()
    }

    pub fn collaborative_enabled(&self) -> bool {
        self.collaborative.is_some()
    }

    fn content_model(&self) -> Result<&ContentModel> {
        self.content.as_ref().ok_or_else(|| {
            AppError::NotReady("Models not loaded. Please retrain first.".to_string())
        })
    }

    pub fn resolve_title(&self, title: &str) -> Option<&Book> {
        self.catalog.find_by_title(title)
    }

    /// Up to `n` content neighbours of `isbn`, nearest first, self excluded.
    /// Books without content features have no neighbours.
    pub fn content_neighbors(&self, isbn: &str, n: usize) -> Result<Vec<String>> {
        let content = self.content_model()?;
        let Some(row) = content.ids.position(isbn) else {
            return Ok(Vec::new());
        };
        let neighbors = content.index.nearest_to_row(row, n, true)?;
        Ok(neighbors
            .iter()
            .filter_map(|nb| content.ids.id(nb.index).map(str::to_string))
            .collect())
    }

    /// Up to `n` item-factor neighbours of `isbn`; empty in content-only mode
    pub fn collaborative_neighbors(&self, isbn: &str, n: usize) -> Result<Vec<String>> {
        let Some(collaborative) = &self.collaborative else {
            return Ok(Vec::new());
        };
        let Some(row) = collaborative.items.position(isbn) else {
            return Ok(Vec::new());
        };
        let neighbors = collaborative.item_index.nearest_to_row(row, n, true)?;
        Ok(neighbors
            .iter()
            .filter_map(|nb| collaborative.items.id(nb.index).map(str::to_string))
            .collect())
    }

    pub fn seed_candidates(&self, isbn: &str, n: usize) -> Result<SeedCandidates> {
        Ok(SeedCandidates {
            collaborative: self.collaborative_neighbors(isbn, n)?,
            content: self.content_neighbors(isbn, n)?,
        })
    }

    /// Nearest users of `user_id`, self excluded; `None` when the user is not
    /// in the trained user index.
    pub fn similar_users(&self, user_id: &str, n: usize) -> Result<Option<Vec<String>>> {
        let Some(collaborative) = &self.collaborative else {
            return Ok(None);
        };
        let Some(row) = collaborative.users.position(user_id) else {
            return Ok(None);
        };
        let neighbors = collaborative.user_index.nearest_to_row(row, n, true)?;
        Ok(Some(
            neighbors
                .iter()
                .filter_map(|nb| collaborative.users.id(nb.index).map(str::to_string))
                .collect(),
        ))
    }

    /// Fold an arbitrary rating map into the item space and return the
    /// nearest unrated items. Empty in content-only mode or when none of the
    /// rated books are in the item index.
    pub fn cold_start(&self, ratings: &HashMap<String, f32>, limit: usize) -> Result<Vec<String>> {
        self.content_model()?;
        let Some(collaborative) = &self.collaborative else {
            return Ok(Vec::new());
        };

        let mut vector = Array1::<f32>::zeros(collaborative.items.len());
        let mut known = 0usize;
        for (isbn, &rating) in ratings {
            if let Some(pos) = collaborative.items.position(isbn) {
                vector[pos] = rating;
                known += 1;
            }
        }
        if known == 0 {
            debug!(rated = ratings.len(), "No rated book is in the item index");
            return Ok(Vec::new());
        }

        let sigma = collaborative.singular_values.view();
        let latent = fold_in(collaborative.item_index.vectors(), sigma, vector.view())?;
        let query = project_to_item_space(latent.view(), sigma)?;

        let neighbors = collaborative
            .item_index
            .nearest(query.view(), limit + ratings.len())?;
        Ok(neighbors
            .iter()
            .filter_map(|nb| collaborative.items.id(nb.index))
            .filter(|isbn| !ratings.contains_key(*isbn))
            .take(limit)
            .map(str::to_string)
            .collect())
    }

    /// Books whose content is closest to free text; only non-zero similarity
    pub fn similar_to_text(&self, text: &str, limit: usize) -> Result<Vec<String>> {
        let content = self.content_model()?;
        let query = content.vectorizer.transform(text);
        if query.nnz() == 0 {
            return Ok(Vec::new());
        }

        let neighbors = content.index.nearest(&query, limit)?;
        Ok(neighbors
            .iter()
            .filter(|nb| nb.distance < 1.0 - f32::EPSILON)
            .filter_map(|nb| content.ids.id(nb.index).map(str::to_string))
            .collect())
    }

    /// Latent vector of a trained user
    pub fn user_factors(&self, user_id: &str) -> Option<ArrayView1<'_, f32>> {
        let collaborative = self.collaborative.as_ref()?;
        let row = collaborative.users.position(user_id)?;
        collaborative.user_index.row(row)
    }
}
