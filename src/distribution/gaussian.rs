//! Gaussian distribution with structured covariance
//!
//! The Gaussian is the belief representation of the filter and the output of
//! every process model. It samples by mapping standard-normal noise through
//! `x = μ + L·ε` with `L·Lᵀ = Σ`.

use nalgebra::DVector;

use crate::common::linalg::{log_gaussian_pdf, log_normal_pdf};
use crate::filter::errors::FilterError;

use super::covariance::Covariance;
use super::traits::{Mappable, Moments};

/// Multivariate Gaussian `N(μ, Σ)`
///
/// The square root of the covariance is computed once whenever the covariance
/// is replaced, so repeated mapping is a matrix-vector product.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    mean: DVector<f64>,
    covariance: Covariance,
    square_root: Covariance,
}

impl Gaussian {
    /// Create a Gaussian, validating dimensions and semi-definiteness
    pub fn new(mean: DVector<f64>, covariance: Covariance) -> Result<Self, FilterError> {
        if covariance.dimension() != mean.len() {
            return Err(FilterError::dimension_mismatch(
                mean.len(),
                covariance.dimension(),
                "covariance dimension",
            ));
        }
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::NumericalInstability {
                description: "Gaussian mean contains non-finite values".to_string(),
            });
        }
        let square_root = covariance.square_root()?;
        Ok(Self {
            mean,
            covariance,
            square_root,
        })
    }

    /// Standard normal `N(0, I)` of the given dimension
    pub fn standard(dim: usize) -> Self {
        Self {
            mean: DVector::zeros(dim),
            covariance: Covariance::identity(dim),
            square_root: Covariance::identity(dim),
        }
    }

    /// Replace the mean
    pub fn set_mean(&mut self, mean: DVector<f64>) -> Result<(), FilterError> {
        if mean.len() != self.mean.len() {
            return Err(FilterError::dimension_mismatch(
                self.mean.len(),
                mean.len(),
                "mean dimension",
            ));
        }
        self.mean = mean;
        Ok(())
    }

    /// Replace the covariance
    ///
    /// On error the Gaussian is left unchanged.
    pub fn set_covariance(&mut self, covariance: Covariance) -> Result<(), FilterError> {
        if covariance.dimension() != self.mean.len() {
            return Err(FilterError::dimension_mismatch(
                self.mean.len(),
                covariance.dimension(),
                "covariance dimension",
            ));
        }
        self.square_root = covariance.square_root()?;
        self.covariance = covariance;
        Ok(())
    }

    /// Square root factor `L` of the covariance
    pub fn square_root(&self) -> &Covariance {
        &self.square_root
    }

    /// Marginal over the contiguous coordinates `[start, start + len)`
    ///
    /// The marginal covariance is returned dense.
    pub fn marginal(&self, start: usize, len: usize) -> Result<Gaussian, FilterError> {
        let block = self.covariance.dense_block(start, len)?;
        Gaussian::new(
            self.mean.rows(start, len).into_owned(),
            Covariance::Dense(block),
        )
    }

    /// Log density at `x`
    pub fn log_density(&self, x: &DVector<f64>) -> Result<f64, FilterError> {
        if x.len() != self.mean.len() {
            return Err(FilterError::dimension_mismatch(
                self.mean.len(),
                x.len(),
                "density argument",
            ));
        }
        Ok(match &self.covariance {
            Covariance::Diagonal(d) => x
                .iter()
                .zip(self.mean.iter())
                .zip(d.iter())
                .map(|((xi, mi), vi)| log_normal_pdf(*xi, *mi, *vi))
                .sum(),
            other => log_gaussian_pdf(x, &self.mean, &other.to_dense()),
        })
    }
}

impl Moments for Gaussian {
    fn dimension(&self) -> usize {
        self.mean.len()
    }

    fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    fn covariance(&self) -> &Covariance {
        &self.covariance
    }
}

impl Mappable for Gaussian {
    type Variable = DVector<f64>;

    fn randoms_size(&self) -> usize {
        self.mean.len()
    }

    fn map_standard_normal(&self, randoms: &DVector<f64>) -> Result<DVector<f64>, FilterError> {
        if randoms.len() != self.randoms_size() {
            return Err(FilterError::dimension_mismatch(
                self.randoms_size(),
                randoms.len(),
                "standard normal noise",
            ));
        }
        Ok(&self.mean + self.square_root.mul_vector(randoms)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::traits::Sampleable;
    use nalgebra::DMatrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dense_gaussian() -> Gaussian {
        Gaussian::new(
            DVector::from_vec(vec![1.0, -2.0]),
            Covariance::Dense(DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0])),
        )
        .unwrap()
    }

    #[test]
    fn test_map_is_deterministic() {
        let g = dense_gaussian();
        let noise = DVector::from_vec(vec![0.3, -1.2]);
        assert_eq!(
            g.map_standard_normal(&noise).unwrap(),
            g.map_standard_normal(&noise).unwrap()
        );
    }

    #[test]
    fn test_map_zero_noise_is_mean() {
        let g = dense_gaussian();
        let x = g.map_standard_normal(&DVector::zeros(2)).unwrap();
        assert_eq!(&x, g.mean());
    }

    #[test]
    fn test_map_is_affine() {
        let g = dense_gaussian();
        let a = DVector::from_vec(vec![1.0, 0.5]);
        let b = DVector::from_vec(vec![-0.2, 2.0]);
        let fa = g.map_standard_normal(&a).unwrap() - g.mean();
        let fb = g.map_standard_normal(&b).unwrap() - g.mean();
        let fab = g.map_standard_normal(&(&a + &b)).unwrap() - g.mean();
        assert!((fab - (fa + fb)).amax() < 1e-12);
    }

    #[test]
    fn test_map_wrong_noise_dimension() {
        let g = dense_gaussian();
        let err = g.map_standard_normal(&DVector::zeros(3)).unwrap_err();
        assert!(matches!(
            err,
            FilterError::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_sample_statistics() {
        let g = dense_gaussian();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let mut sum = DVector::zeros(2);
        let mut outer = DMatrix::zeros(2, 2);
        for _ in 0..n {
            let x = g.sample(&mut rng).unwrap();
            let d = &x - g.mean();
            sum += &x;
            outer += &d * d.transpose();
        }
        let mean = sum / n as f64;
        let cov = outer / n as f64;
        assert!((mean - g.mean()).amax() < 0.1);
        assert!((cov - g.covariance().to_dense()).amax() < 0.2);
    }

    #[test]
    fn test_set_covariance_rejects_indefinite() {
        let mut g = dense_gaussian();
        let before = g.clone();
        let bad = Covariance::Dense(DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 3.0, 1.0]));
        assert!(matches!(
            g.set_covariance(bad),
            Err(FilterError::InvalidCovariance { .. })
        ));
        assert_eq!(g, before);
    }

    #[test]
    fn test_set_covariance_updates_square_root() {
        let mut g = Gaussian::standard(2);
        g.set_covariance(Covariance::isotropic(2, 9.0)).unwrap();
        let x = g
            .map_standard_normal(&DVector::from_vec(vec![1.0, 0.0]))
            .unwrap();
        assert!((x[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_new_dimension_mismatch() {
        let err = Gaussian::new(DVector::zeros(3), Covariance::identity(2)).unwrap_err();
        assert!(matches!(err, FilterError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_marginal_and_density() {
        let g = Gaussian::new(
            DVector::from_vec(vec![0.0, 1.0, 2.0]),
            Covariance::BlockDiagonal(vec![
                Covariance::Dense(DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0])),
                Covariance::Diagonal(DVector::from_vec(vec![0.5])),
            ]),
        )
        .unwrap();
        let m = g.marginal(2, 1).unwrap();
        assert_eq!(m.mean()[0], 2.0);
        assert_eq!(m.covariance().to_dense()[(0, 0)], 0.5);

        let at_mean = m.log_density(&DVector::from_vec(vec![2.0])).unwrap();
        assert!((at_mean - log_normal_pdf(2.0, 2.0, 0.5)).abs() < 1e-12);
    }
}
