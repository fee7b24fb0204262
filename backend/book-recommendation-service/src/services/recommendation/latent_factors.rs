// ============================================
// Latent Factor Trainer (truncated SVD)
// ============================================
//
// A (users × items) ≈ U Σ Vᵀ
//   user factors = U Σ   (users × rank)
//   item factors = V     (items × rank)
//
// Small matrices get an exact dense SVD; larger ones go through a seeded
// randomized range finder with QR-normalised power iterations first.

use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use nalgebra::{DMatrix, DVector, SVD};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct SvdParams {
    pub components: usize,
    pub oversamples: usize,
    pub power_iterations: usize,
    pub seed: u64,
}

impl From<&EngineConfig> for SvdParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            components: config.svd_components,
            oversamples: config.svd_oversamples,
            power_iterations: config.svd_power_iterations,
            seed: config.random_seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentFactors {
    pub user_factors: Array2<f32>,
    pub item_factors: Array2<f32>,
    /// Descending
    pub singular_values: Array1<f32>,
}

impl LatentFactors {
    pub fn rank(&self) -> usize {
        self.singular_values.len()
    }
}

/// `min(components, min(rows, cols) - 1)`
pub fn target_rank(components: usize, shape: (usize, usize)) -> usize {
    components.min(shape.0.min(shape.1).saturating_sub(1))
}

struct Decomposition {
    u: DMatrix<f64>,
    s: DVector<f64>,
    v_t: DMatrix<f64>,
}

fn decompose(matrix: DMatrix<f64>) -> Result<Decomposition> {
    let svd = SVD::new(matrix, true, true);
    let u = svd
        .u
        .ok_or_else(|| AppError::Training("SVD did not produce U".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| AppError::Training("SVD did not produce Vᵀ".to_string()))?;
    Ok(Decomposition {
        u,
        s: svd.singular_values,
        v_t,
    })
}

fn to_dense(a: &CsMat<f32>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(a.rows(), a.cols());
    for (&value, (row, col)) in a.iter() {
        dense[(row, col)] += f64::from(value);
    }
    dense
}

/// A · B with A sparse (CSR)
fn sparse_mul(a: &CsMat<f32>, b: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(a.rows(), b.ncols());
    for (i, row) in a.outer_iterator().enumerate() {
        for (j, &value) in row.iter() {
            let value = f64::from(value);
            for c in 0..b.ncols() {
                out[(i, c)] += value * b[(j, c)];
            }
        }
    }
    out
}

/// Aᵀ · B with A sparse (CSR)
fn sparse_t_mul(a: &CsMat<f32>, b: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(a.cols(), b.ncols());
    for (i, row) in a.outer_iterator().enumerate() {
        for (j, &value) in row.iter() {
            let value = f64::from(value);
            for c in 0..b.ncols() {
                out[(j, c)] += value * b[(i, c)];
            }
        }
    }
    out
}

fn randomized(a: &CsMat<f32>, sketch: usize, params: &SvdParams) -> Result<Decomposition> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let omega = DMatrix::from_fn(a.cols(), sketch, |_, _| rng.gen_range(-1.0..1.0));

    let mut q = sparse_mul(a, &omega).qr().q();
    for _ in 0..params.power_iterations {
        let z = sparse_t_mul(a, &q).qr().q();
        q = sparse_mul(a, &z).qr().q();
    }

    // B = Qᵀ A, factorised in the small sketch space
    let b = sparse_t_mul(a, &q).transpose();
    let small = decompose(b)?;
    Ok(Decomposition {
        u: &q * small.u,
        s: small.s,
        v_t: small.v_t,
    })
}

/// Factorise `matrix` at `target_rank(params.components, shape)`.
pub fn truncated_svd(matrix: &CsMat<f32>, params: &SvdParams) -> Result<LatentFactors> {
    let (rows, cols) = (matrix.rows(), matrix.cols());
    let rank = target_rank(params.components, (rows, cols));
    if rank == 0 {
        return Err(AppError::Training(format!(
            "Rating matrix {rows}x{cols} is too small to factorise"
        )));
    }

    let sketch = rank + params.oversamples;
    let exact = sketch >= rows.min(cols);
    let decomposition = if exact {
        decompose(to_dense(matrix))?
    } else {
        randomized(matrix, sketch, params)?
    };
    debug!(rows, cols, rank, exact, "Computed truncated SVD");

    let Decomposition { u, s, v_t } = decomposition;

    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[b].total_cmp(&s[a]).then_with(|| a.cmp(&b)));
    order.truncate(rank);

    let mut user_factors = Array2::zeros((rows, rank));
    let mut item_factors = Array2::zeros((cols, rank));
    let mut singular_values = Array1::zeros(rank);

    for (k, &component) in order.iter().enumerate() {
        // Largest-magnitude entry of each right singular vector is made positive
        let pivot = (0..cols)
            .max_by(|&a, &b| {
                v_t[(component, a)]
                    .abs()
                    .total_cmp(&v_t[(component, b)].abs())
                    .then_with(|| b.cmp(&a))
            })
            .unwrap_or(0);
        let sign = if v_t[(component, pivot)] < 0.0 { -1.0 } else { 1.0 };
        let sigma = s[component];

        singular_values[k] = sigma as f32;
        for i in 0..rows {
            user_factors[[i, k]] = (sign * u[(i, component)] * sigma) as f32;
        }
        for j in 0..cols {
            item_factors[[j, k]] = (sign * v_t[(component, j)]) as f32;
        }
    }

    Ok(LatentFactors {
        user_factors,
        item_factors,
        singular_values,
    })
}
