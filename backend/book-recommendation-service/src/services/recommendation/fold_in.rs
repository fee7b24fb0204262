// ============================================
// Fold-In
// ============================================
//
// Places an unseen rating vector r in a trained factor basis:
//   latent = r · V · Σ⁻¹
//   query  = latent ⊙ Σ   (matched against the item-factor index)

use crate::error::{AppError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// `r · V · Σ⁻¹`; components with a zero singular value contribute 0
pub fn fold_in(
    item_factors: ArrayView2<'_, f32>,
    singular_values: ArrayView1<'_, f32>,
    ratings: ArrayView1<'_, f32>,
) -> Result<Array1<f32>> {
    let (items, rank) = item_factors.dim();
    if ratings.len() != items || singular_values.len() != rank {
        return Err(AppError::Internal(format!(
            "Fold-in shape mismatch: ratings {}, factors {}x{}, singular values {}",
            ratings.len(),
            items,
            rank,
            singular_values.len()
        )));
    }

    let mut latent = ratings.dot(&item_factors);
    latent
        .iter_mut()
        .zip(singular_values.iter())
        .for_each(|(x, &sigma)| *x = if sigma == 0.0 { 0.0 } else { *x / sigma });
    Ok(latent)
}

/// `latent ⊙ Σ`
pub fn project_to_item_space(
    latent: ArrayView1<'_, f32>,
    singular_values: ArrayView1<'_, f32>,
) -> Result<Array1<f32>> {
    if latent.len() != singular_values.len() {
        return Err(AppError::Internal(format!(
            "Latent point has {} dimensions, basis has {}",
            latent.len(),
            singular_values.len()
        )));
    }
    Ok(&latent * &singular_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fold_in_divides_by_singular_values() {
        let v = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let sigma = array![2.0, 4.0];
        let r = array![2.0, 0.0, 2.0];

        let latent = fold_in(v.view(), sigma.view(), r.view()).unwrap();
        assert_eq!(latent, array![2.0, 0.5]);

        let projected = project_to_item_space(latent.view(), sigma.view()).unwrap();
        assert_eq!(projected, array![4.0, 2.0]);
    }

    #[test]
    fn test_zero_singular_value_contributes_nothing() {
        let v = array![[1.0, 1.0]];
        let sigma = array![1.0, 0.0];
        let latent = fold_in(v.view(), sigma.view(), array![3.0].view()).unwrap();
        assert_eq!(latent, array![3.0, 0.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let v = array![[1.0, 1.0]];
        let sigma = array![1.0, 1.0];
        assert!(fold_in(v.view(), sigma.view(), array![1.0, 2.0].view()).is_err());
        assert!(project_to_item_space(array![1.0].view(), sigma.view()).is_err());
    }
}
