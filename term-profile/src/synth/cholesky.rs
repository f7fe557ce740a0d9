//! Cholesky factorization of small correlation matrices.

use crate::error::{ProfileError, Result};
use crate::profile::types::ColumnCorrelation;

/// Pivots at or below this are treated as non-positive.
const PIVOT_FLOOR: f64 = 1e-10;

/// Builds the correlation matrix over `columns`: unit diagonal, reported
/// coefficients off the diagonal, zero for unreported pairs.
pub fn correlation_matrix(columns: &[String], correlations: &[ColumnCorrelation]) -> Vec<Vec<f64>> {
    let n = columns.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    for c in correlations {
        let a = columns.iter().position(|name| *name == c.column_a);
        let b = columns.iter().position(|name| *name == c.column_b);
        if let (Some(a), Some(b)) = (a, b) {
            if a != b {
                let r = c.coefficient.clamp(-1.0, 1.0);
                matrix[a][b] = r;
                matrix[b][a] = r;
            }
        }
    }
    matrix
}

/// Lower-triangular `L` with `L * L^T == matrix`.
///
/// Fails with [`ProfileError::NonPositiveDefinite`] naming the first leading
/// minor whose pivot is not positive.
pub fn cholesky(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return Err(ProfileError::invalid_data("correlation matrix is not square"));
    }

    let mut lower = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let partial: f64 = (0..j).map(|k| lower[i][k] * lower[j][k]).sum();
            if i == j {
                let pivot = matrix[i][i] - partial;
                if !pivot.is_finite() || pivot <= PIVOT_FLOOR {
                    return Err(ProfileError::NonPositiveDefinite {
                        minor: i + 1,
                        value: pivot,
                    });
                }
                lower[i][i] = pivot.sqrt();
            } else {
                lower[i][j] = (matrix[i][j] - partial) / lower[j][j];
            }
        }
    }
    Ok(lower)
}

/// `L * z` for lower-triangular `L`.
pub fn apply_lower(lower: &[Vec<f64>], z: &[f64]) -> Vec<f64> {
    lower
        .iter()
        .enumerate()
        .map(|(i, row)| (0..=i).map(|k| row[k] * z[k]).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::types::CorrelationStrength;

    fn corr(a: &str, b: &str, r: f64) -> ColumnCorrelation {
        ColumnCorrelation {
            column_a: a.into(),
            column_b: b.into(),
            coefficient: r,
            strength: CorrelationStrength::from_coefficient(r),
        }
    }

    #[test]
    fn test_two_by_two_factor() {
        let lower = cholesky(&[vec![1.0, 0.8], vec![0.8, 1.0]]).unwrap();
        assert!((lower[0][0] - 1.0).abs() < 1e-12);
        assert!((lower[1][0] - 0.8).abs() < 1e-12);
        assert!((lower[1][1] - 0.6).abs() < 1e-12);
        assert_eq!(lower[0][1], 0.0);
    }

    #[test]
    fn test_factor_reconstructs_matrix() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let matrix = correlation_matrix(
            &names,
            &[corr("a", "b", 0.5), corr("c", "b", -0.3), corr("a", "x", 0.9)],
        );
        assert_eq!(matrix[1][2], -0.3);
        assert_eq!(matrix[0][2], 0.0);

        let lower = cholesky(&matrix).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let product: f64 = (0..3).map(|k| lower[i][k] * lower[j][k]).sum();
                assert!((product - matrix[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_inconsistent_correlations_rejected() {
        // a~b and a~c strongly positive but b~c strongly negative.
        let matrix = vec![
            vec![1.0, 0.9, 0.9],
            vec![0.9, 1.0, -0.9],
            vec![0.9, -0.9, 1.0],
        ];
        match cholesky(&matrix) {
            Err(ProfileError::NonPositiveDefinite { minor, value }) => {
                assert_eq!(minor, 3);
                assert!(value <= 0.0);
            }
            other => panic!("expected NonPositiveDefinite, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_lower() {
        let lower = vec![vec![1.0, 0.0], vec![0.8, 0.6]];
        let y = apply_lower(&lower, &[1.0, 2.0]);
        assert_eq!(y[0], 1.0);
        assert!((y[1] - 2.0).abs() < 1e-12);
    }
}
