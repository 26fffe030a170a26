//! Trailing-window moments and covariance inversion.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Slice};

/// Sample mean vector and covariance matrix of a window of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMoments {
    /// Column means
    pub mean: Array1<f64>,
    /// Sample covariance (ddof = 1)
    pub covariance: Array2<f64>,
}

impl WindowMoments {
    /// Estimate moments from a block of rows.
    ///
    /// Returns `None` when the block has fewer than two rows or any value is
    /// not finite.
    pub fn estimate(window: ArrayView2<'_, f64>) -> Option<Self> {
        let n = window.nrows();
        if n < 2 || window.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let mean = window.mean_axis(Axis(0))?;
        let centered = &window - &mean;
        let covariance = centered.t().dot(&centered) / (n - 1) as f64;
        Some(Self { mean, covariance })
    }

    /// Squared Mahalanobis distance of `x` given an inverse covariance.
    ///
    /// Rounding can push the quadratic form of a nearly singular matrix
    /// slightly below zero; the result is clamped at zero.
    pub fn distance_squared(&self, x: ArrayView1<'_, f64>, inverse: &Array2<f64>) -> f64 {
        let diff = &x - &self.mean;
        diff.dot(&inverse.dot(&diff)).max(0.0)
    }
}

/// Invert a square matrix with Gauss-Jordan elimination and partial pivoting.
///
/// Returns `None` when the matrix is not square or is numerically singular,
/// meaning a pivot is at or below `n * EPSILON * max|a_ij|`.
pub fn invert(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    if n == 0 || matrix.ncols() != n {
        return None;
    }

    let scale = matrix.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }
    let tolerance = n as f64 * f64::EPSILON * scale;

    // Augmented [A | I]
    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = matrix[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let pivot_row =
            (col..n).max_by(|a, b| aug[[*a, col]].abs().total_cmp(&aug[[*b, col]].abs()))?;
        if aug[[pivot_row, col]].abs() <= tolerance {
            return None;
        }
        if pivot_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        aug.row_mut(col).mapv_inplace(|v| v / pivot);

        let pivot_values = aug.row(col).to_owned();
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[[row, col]];
            if factor != 0.0 {
                aug.row_mut(row).scaled_add(-factor, &pivot_values);
            }
        }
    }

    Some(aug.slice_axis(Axis(1), Slice::from(n..)).to_owned())
}
