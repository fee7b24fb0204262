// ============================================
// Rating Matrix Builder
// ============================================
//
// Positive rating triples → count filter → dense relabelling → CSR matrix
//   rows    = users with ≥ min_ratings_per_user positive ratings
//   columns = books with ≥ min_ratings_per_book positive ratings

use crate::models::Rating;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use tracing::info;

/// Bidirectional id ↔ dense position mapping.
///
/// Only the id list is serialized; the reverse map is rebuilt on load so both
/// directions always agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct IdIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of `id`, assigning the next free one on first sight
    pub fn insert(&mut self, id: &str) -> usize {
        if let Some(&pos) = self.positions.get(id) {
            return pos;
        }
        let pos = self.ids.len();
        self.ids.push(id.to_string());
        self.positions.insert(id.to_string(), pos);
        pos
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl From<Vec<String>> for IdIndex {
    fn from(ids: Vec<String>) -> Self {
        let mut index = IdIndex::new();
        for id in &ids {
            index.insert(id);
        }
        index
    }
}

impl From<IdIndex> for Vec<String> {
    fn from(index: IdIndex) -> Self {
        index.ids
    }
}

/// Filtered user × book rating matrix
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    pub matrix: CsMat<f32>,
    pub users: IdIndex,
    pub items: IdIndex,
    /// Positive triples that survived filtering (duplicates counted separately)
    pub triples: usize,
}

impl RatingMatrix {
    /// Build the matrix from raw triples.
    ///
    /// Ratings ≤ 0 never enter. User and book counts are taken over all
    /// positive triples in one pass; duplicate (user, book) pairs are summed.
    pub fn build(ratings: &[Rating], min_user_ratings: usize, min_book_ratings: usize) -> Self {
        let positive: Vec<&Rating> = ratings
            .iter()
            .filter(|r| r.rating > 0.0 && !r.user_id.is_empty() && !r.isbn.is_empty())
            .collect();

        let mut user_counts: HashMap<&str, usize> = HashMap::new();
        let mut item_counts: HashMap<&str, usize> = HashMap::new();
        for r in &positive {
            *user_counts.entry(r.user_id.as_str()).or_default() += 1;
            *item_counts.entry(r.isbn.as_str()).or_default() += 1;
        }

        let surviving: Vec<&Rating> = positive
            .into_iter()
            .filter(|r| {
                user_counts[r.user_id.as_str()] >= min_user_ratings
                    && item_counts[r.isbn.as_str()] >= min_book_ratings
            })
            .collect();

        let mut users = IdIndex::new();
        let mut items = IdIndex::new();
        let coords: Vec<(usize, usize, f32)> = surviving
            .iter()
            .map(|r| (users.insert(&r.user_id), items.insert(&r.isbn), r.rating))
            .collect();

        let mut tri = TriMat::new((users.len(), items.len()));
        for (row, col, value) in coords {
            tri.add_triplet(row, col, value);
        }
        let matrix = tri.to_csr();

        info!(
            ratings = surviving.len(),
            users = users.len(),
            items = items.len(),
            "Built rating matrix"
        );

        Self {
            matrix,
            users,
            items,
            triples: surviving.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() || self.items.is_empty()
    }

    /// Fraction of empty cells; 1.0 for an empty matrix
    pub fn sparsity(&self) -> f64 {
        let cells = self.users.len() * self.items.len();
        if cells == 0 {
            return 1.0;
        }
        1.0 - self.matrix.nnz() as f64 / cells as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> Vec<Rating> {
        vec![
            Rating::new("u1", "a", 5.0),
            Rating::new("u1", "b", 4.0),
            Rating::new("u2", "a", 3.0),
            Rating::new("u2", "b", 0.0),
            Rating::new("u2", "c", 2.0),
            Rating::new("u3", "a", 1.0),
            Rating::new("u3", "b", 2.0),
            Rating::new("u3", "c", -4.0),
        ]
    }

    #[test]
    fn test_non_positive_ratings_never_enter() {
        let m = RatingMatrix::build(&ratings(), 1, 1);
        assert!(m.matrix.data().iter().all(|&v| v > 0.0));
        assert_eq!(m.triples, 6);
    }

    #[test]
    fn test_filters_by_counts() {
        // a: 3 ratings, b: 2 (the zero is dropped), c: 1
        let m = RatingMatrix::build(&ratings(), 2, 2);
        assert_eq!(m.items.ids(), &["a".to_string(), "b".to_string()]);
        assert_eq!(m.users.ids(), &["u1".to_string(), "u2".to_string(), "u3".to_string()]);
        assert_eq!(m.matrix.shape(), (3, 2));
    }

    #[test]
    fn test_filtering_is_monotone() {
        let strict = RatingMatrix::build(&ratings(), 2, 3);
        let loose = RatingMatrix::build(&ratings(), 1, 1);
        assert!(loose.users.len() >= strict.users.len());
        assert!(loose.items.len() >= strict.items.len());
    }

    #[test]
    fn test_duplicates_are_summed() {
        let m = RatingMatrix::build(
            &[Rating::new("u", "a", 2.0), Rating::new("u", "a", 3.0)],
            1,
            1,
        );
        assert_eq!(m.matrix.nnz(), 1);
        assert_eq!(m.matrix.get(0, 0), Some(&5.0));
    }

    #[test]
    fn test_empty_when_everything_filtered() {
        let m = RatingMatrix::build(&ratings(), 10, 10);
        assert!(m.is_empty());
        assert_eq!(m.sparsity(), 1.0);
    }

    #[test]
    fn test_id_index_rebuilds_reverse_map() {
        let index = IdIndex::from(vec!["x".to_string(), "y".to_string()]);
        let bytes = bincode::serialize(&index).unwrap();
        let restored: IdIndex = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.position("y"), Some(1));
        assert_eq!(restored.id(0), Some("x"));
        assert_eq!(restored, index);
    }
}
