//! Linear algebra utilities
//!
//! Numerically careful helpers shared by the Gaussian primitive, the
//! observation model and the filter update.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use std::f64::consts::PI;

use super::constants::{PSD_TOLERANCE, SYMMETRY_TOLERANCE};

/// Log density of a scalar Gaussian `N(x; mean, variance)`
///
/// Returns `-inf` for a non-positive variance.
#[inline]
pub fn log_normal_pdf(x: f64, mean: f64, variance: f64) -> f64 {
    if variance <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let diff = x - mean;
    -0.5 * ((2.0 * PI * variance).ln() + diff * diff / variance)
}

/// Compute log multivariate Gaussian PDF
///
/// # Arguments
/// * `x` - Point to evaluate
/// * `mu` - Mean vector
/// * `sigma` - Covariance matrix (must be positive definite)
///
/// # Returns
/// Log probability density, `-inf` for a singular covariance
pub fn log_gaussian_pdf(x: &DVector<f64>, mu: &DVector<f64>, sigma: &DMatrix<f64>) -> f64 {
    let n = x.len() as f64;
    let diff = x - mu;

    match sigma.clone().cholesky() {
        Some(chol) => {
            let inv_sigma_diff = chol.solve(&diff);
            let mahalanobis = diff.dot(&inv_sigma_diff);
            let log_det: f64 = 2.0 * chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();

            -0.5 * (n * (2.0 * PI).ln() + log_det + mahalanobis)
        }
        None => f64::NEG_INFINITY,
    }
}

/// Compute `log(exp(a) + exp(b))` without overflow
#[inline]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let max_val = a.max(b);
    if max_val == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max_val + ((a - max_val).exp() + (b - max_val).exp()).ln()
}

/// Compute log-sum-exp for numerical stability
///
/// Computes log(sum(exp(x))) in a numerically stable way
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() && max_val < 0.0 {
        return f64::NEG_INFINITY;
    }

    let sum: f64 = values.iter().map(|v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Make matrix symmetric
///
/// Ensures a matrix is symmetric by averaging with its transpose
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (matrix + matrix.transpose())
}

/// Check whether a square matrix is symmetric up to a relative tolerance
pub fn is_symmetric(matrix: &DMatrix<f64>) -> bool {
    if !matrix.is_square() {
        return false;
    }
    let scale = matrix.amax().max(1.0);
    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (matrix[(i, j)] - matrix[(j, i)]).abs() > SYMMETRY_TOLERANCE * scale {
                return false;
            }
        }
    }
    true
}

/// Check if matrix is positive definite
pub fn is_positive_definite(matrix: &DMatrix<f64>) -> bool {
    matrix.clone().cholesky().is_some()
}

/// Square root factor `L` with `L·Lᵀ = matrix` for a symmetric PSD matrix
///
/// Uses Cholesky when the matrix is positive definite and falls back to a
/// symmetric eigen-decomposition for semi-definite input (eigenvalues within
/// `PSD_TOLERANCE` below zero are clamped). Returns `None` when the matrix is
/// not square, not symmetric, not finite, or has a clearly negative eigenvalue.
pub fn psd_square_root(matrix: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if !matrix.is_square() || matrix.iter().any(|v| !v.is_finite()) || !is_symmetric(matrix) {
        return None;
    }
    if matrix.nrows() == 0 {
        return Some(DMatrix::zeros(0, 0));
    }

    if let Some(chol) = matrix.clone().cholesky() {
        return Some(chol.l());
    }

    let sym = symmetrize(matrix);
    let scale = sym.amax().max(1.0);
    let eigen = SymmetricEigen::new(sym);
    if eigen.eigenvalues.iter().any(|&l| l < -PSD_TOLERANCE * scale) {
        return None;
    }

    let sqrt_vals = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
    Some(&eigen.eigenvectors * DMatrix::from_diagonal(&sqrt_vals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_normal_pdf_peak() {
        let expected = -0.5 * (2.0 * PI).ln();
        assert!((log_normal_pdf(0.0, 0.0, 1.0) - expected).abs() < 1e-12);
        assert_eq!(log_normal_pdf(1.0, 0.0, 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log_gaussian_pdf_matches_scalar() {
        let x = DVector::from_vec(vec![0.3]);
        let mu = DVector::from_vec(vec![0.1]);
        let sigma = DMatrix::from_element(1, 1, 0.25);
        let lhs = log_gaussian_pdf(&x, &mu, &sigma);
        let rhs = log_normal_pdf(0.3, 0.1, 0.25);
        assert!((lhs - rhs).abs() < 1e-12);
    }

    #[test]
    fn test_log_add_exp() {
        let value = log_add_exp(2.0_f64.ln(), 3.0_f64.ln());
        assert!((value - 5.0_f64.ln()).abs() < 1e-12);
        assert_eq!(
            log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
        assert!((log_add_exp(f64::NEG_INFINITY, 1.5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_log_sum_exp() {
        let values = [1.0_f64.ln(), 2.0_f64.ln(), 3.0_f64.ln()];
        assert!((log_sum_exp(&values) - 6.0_f64.ln()).abs() < 1e-12);
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_psd_square_root_definite() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let l = psd_square_root(&m).unwrap();
        let recon = &l * l.transpose();
        assert!((recon - m).amax() < 1e-12);
    }

    #[test]
    fn test_psd_square_root_semidefinite() {
        // Rank one: [1 1; 1 1]
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let l = psd_square_root(&m).unwrap();
        let recon = &l * l.transpose();
        assert!((recon - m).amax() < 1e-10);
    }

    #[test]
    fn test_psd_square_root_rejects_indefinite() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(psd_square_root(&m).is_none());

        let asym = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        assert!(psd_square_root(&asym).is_none());
    }

    #[test]
    fn test_symmetrize() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]);
        let s = symmetrize(&m);
        assert!(is_symmetric(&s));
        assert!((s[(0, 1)] - 1.0).abs() < 1e-12);
        assert!(is_positive_definite(&DMatrix::identity(3, 3)));
    }
}
