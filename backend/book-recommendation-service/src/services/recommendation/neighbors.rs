// ============================================
// Nearest-Neighbor Indexes
// ============================================
//
// Brute-force cosine distance (1 - cos) over every indexed row.
// Results are ordered by ascending distance, ties by row index.
// A zero-norm vector is at distance 1 from everything.

use crate::error::{AppError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, CsVec, CsVecView};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

fn cosine_distance(dot: f32, a_norm: f32, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 1.0;
    }
    1.0 - dot / (a_norm * b_norm)
}

fn top_n(mut scored: Vec<Neighbor>, n: usize) -> Vec<Neighbor> {
    scored.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.index.cmp(&b.index))
    });
    scored.truncate(n);
    scored
}

/// Ranks `scored` and applies the self-match contract for row queries
fn rank_for_row(scored: Vec<Neighbor>, row: usize, n: usize, exclude_self: bool) -> Vec<Neighbor> {
    let others: Vec<Neighbor> = scored.into_iter().filter(|nb| nb.index != row).collect();
    if exclude_self {
        return top_n(others, n);
    }
    if n == 0 {
        return Vec::new();
    }
    let mut result = vec![Neighbor {
        index: row,
        distance: 0.0,
    }];
    result.extend(top_n(others, n - 1));
    result
}

/// Index over dense latent factor rows (item or user embeddings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNeighborIndex {
    vectors: Array2<f32>,
    norms: Vec<f32>,
}

impl DenseNeighborIndex {
    pub fn new(vectors: Array2<f32>) -> Self {
        let norms = vectors
            .rows()
            .into_iter()
            .map(|row| row.dot(&row).sqrt())
            .collect();
        Self { vectors, norms }
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn vectors(&self) -> ArrayView2<'_, f32> {
        self.vectors.view()
    }

    pub fn row(&self, row: usize) -> Option<ArrayView1<'_, f32>> {
        (row < self.len()).then(|| self.vectors.row(row))
    }

    fn score(&self, query: ArrayView1<'_, f32>) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim() {
            return Err(AppError::Internal(format!(
                "Query has {} dimensions, index has {}",
                query.len(),
                self.dim()
            )));
        }
        let query_norm = query.dot(&query).sqrt();

        Ok(self
            .vectors
            .rows()
            .into_iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(index, (row, &norm))| Neighbor {
                index,
                distance: cosine_distance(row.dot(&query), norm, query_norm),
            })
            .collect())
    }

    /// The `min(n, rows)` rows closest to `query`
    pub fn nearest(&self, query: ArrayView1<'_, f32>, n: usize) -> Result<Vec<Neighbor>> {
        Ok(top_n(self.score(query)?, n))
    }

    /// Neighbours of an indexed row. The row itself comes first at distance 0
    /// unless `exclude_self` is set, in which case it is left out.
    pub fn nearest_to_row(
        &self,
        row: usize,
        n: usize,
        exclude_self: bool,
    ) -> Result<Vec<Neighbor>> {
        let query = self
            .row(row)
            .ok_or_else(|| AppError::Internal(format!("Row {row} out of range")))?;
        let scored = self.score(query)?;
        Ok(rank_for_row(scored, row, n, exclude_self))
    }
}

/// Index over sparse TF-IDF rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseNeighborIndex {
    matrix: CsMat<f32>,
    norms: Vec<f32>,
}

fn sparse_norm(v: CsVecView<'_, f32>) -> f32 {
    v.data().iter().map(|x| x * x).sum::<f32>().sqrt()
}

impl SparseNeighborIndex {
    pub fn new(matrix: CsMat<f32>) -> Self {
        let matrix = if matrix.is_csr() { matrix } else { matrix.to_csr() };
        let norms = matrix.outer_iterator().map(sparse_norm).collect();
        Self { matrix, norms }
    }

    pub fn len(&self) -> usize {
        self.matrix.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.rows() == 0
    }

    pub fn dim(&self) -> usize {
        self.matrix.cols()
    }

    fn score(&self, query: CsVecView<'_, f32>) -> Result<Vec<Neighbor>> {
        if query.dim() != self.dim() {
            return Err(AppError::Internal(format!(
                "Query has {} dimensions, index has {}",
                query.dim(),
                self.dim()
            )));
        }
        let query_norm = sparse_norm(query.view());

        Ok(self
            .matrix
            .outer_iterator()
            .zip(&self.norms)
            .enumerate()
            .map(|(index, (row, &norm))| Neighbor {
                index,
                distance: cosine_distance(row.dot(&query), norm, query_norm),
            })
            .collect())
    }

    pub fn nearest(&self, query: &CsVec<f32>, n: usize) -> Result<Vec<Neighbor>> {
        Ok(top_n(self.score(query.view())?, n))
    }

    pub fn nearest_to_row(
        &self,
        row: usize,
        n: usize,
        exclude_self: bool,
    ) -> Result<Vec<Neighbor>> {
        let query = self
            .matrix
            .outer_view(row)
            .ok_or_else(|| AppError::Internal(format!("Row {row} out of range")))?;
        let scored = self.score(query)?;
        Ok(rank_for_row(scored, row, n, exclude_self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use sprs::TriMat;

    fn dense() -> DenseNeighborIndex {
        DenseNeighborIndex::new(array![[1.0, 0.0], [0.9, 0.1], [0.0, 1.0], [0.0, 0.0]])
    }

    #[test]
    fn test_dense_nearest_orders_by_distance() {
        let index = dense();
        let result = index.nearest(array![1.0, 0.0].view(), 3).unwrap();
        let order: Vec<usize> = result.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(result[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_dense_repeat_query_is_identical() {
        let index = dense();
        let query = array![0.7, 0.3];
        let first = index.nearest(query.view(), 4).unwrap();
        assert_eq!(first, index.nearest(query.view(), 4).unwrap());
        assert_eq!(
            index.nearest_to_row(1, 3, true).unwrap(),
            index.nearest_to_row(1, 3, true).unwrap()
        );
    }

    #[test]
    fn test_zero_norm_has_unit_distance() {
        let index = dense();
        let result = index.nearest(array![1.0, 0.0].view(), 4).unwrap();
        assert_eq!(result[3].index, 3);
        assert_eq!(result[3].distance, 1.0);
    }

    #[test]
    fn test_self_match_and_exclusion() {
        let index = dense();
        let with_self = index.nearest_to_row(2, 2, false).unwrap();
        assert_eq!(with_self[0].index, 2);
        assert_eq!(with_self[0].distance, 0.0);
        assert_eq!(with_self.len(), 2);

        let without_self = index.nearest_to_row(2, 2, true).unwrap();
        assert!(without_self.iter().all(|n| n.index != 2));
        assert_eq!(without_self.len(), 2);
    }

    #[test]
    fn test_limit_larger_than_rows() {
        let index = dense();
        assert_eq!(index.nearest(array![0.5, 0.5].view(), 100).unwrap().len(), 4);
        assert_eq!(index.nearest_to_row(0, 100, true).unwrap().len(), 3);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let index = dense();
        assert!(index.nearest(array![1.0, 0.0, 0.0].view(), 1).is_err());
        assert!(index.nearest_to_row(9, 1, false).is_err());
    }

    #[test]
    fn test_sparse_self_match_and_idempotence() {
        let mut tri = TriMat::new((3, 4));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 1, 1.0);
        tri.add_triplet(1, 2, 1.0);
        tri.add_triplet(2, 3, 1.0);
        let index = SparseNeighborIndex::new(tri.to_csr());

        let first = index.nearest_to_row(0, 3, false).unwrap();
        assert_eq!(first[0].index, 0);
        assert_eq!(first[1].index, 1);
        assert_eq!(first, index.nearest_to_row(0, 3, false).unwrap());

        let query = CsVec::new(4, vec![3], vec![2.0]);
        assert_eq!(index.nearest(&query, 1).unwrap()[0].index, 2);

        let wrong = CsVec::new(5, vec![0], vec![1.0]);
        assert!(index.nearest(&wrong, 1).is_err());
    }
}
