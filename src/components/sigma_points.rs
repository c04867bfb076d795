//! Scaled unscented transform
//!
//! Sigma points are generated through the [`Mappable`] capability of the
//! Gaussian: `χ₀ = map(0)`, `χᵢ = map(+γ eᵢ)`, `χᵢ₊ₙ = map(-γ eᵢ)` with
//! `γ = √(n + λ)` and `λ = α²(n + κ) - n`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::distribution::{Gaussian, Mappable, Moments};
use crate::filter::errors::FilterError;

/// Parameters of the scaled unscented transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnscentedParams {
    /// Spread of the sigma points around the mean
    pub alpha: f64,
    /// Prior knowledge of the distribution (2 is optimal for Gaussians)
    pub beta: f64,
    /// Secondary scaling parameter
    pub kappa: f64,
}

impl Default for UnscentedParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 2.0,
            kappa: 0.0,
        }
    }
}

impl UnscentedParams {
    /// Create new parameters
    pub fn new(alpha: f64, beta: f64, kappa: f64) -> Self {
        Self { alpha, beta, kappa }
    }

    /// λ = α²(n + κ) - n
    #[inline]
    pub fn lambda(&self, n: usize) -> f64 {
        let n = n as f64;
        self.alpha * self.alpha * (n + self.kappa) - n
    }

    /// γ = √(n + λ), the sigma point scale
    pub fn gamma(&self, n: usize) -> Result<f64, FilterError> {
        let spread = n as f64 + self.lambda(n);
        if spread <= 0.0 || !spread.is_finite() {
            return Err(FilterError::configuration(format!(
                "unscented parameters give non-positive spread n + λ = {} for n = {}",
                spread, n
            )));
        }
        Ok(spread.sqrt())
    }

    /// Mean and covariance weights for the `2n + 1` sigma points
    pub fn weights(&self, n: usize) -> Result<(Vec<f64>, Vec<f64>), FilterError> {
        let gamma = self.gamma(n)?;
        let spread = gamma * gamma;
        let lambda = self.lambda(n);

        let count = 2 * n + 1;
        let w_i = 1.0 / (2.0 * spread);
        let mut weights_mean = vec![w_i; count];
        let mut weights_cov = vec![w_i; count];
        weights_mean[0] = lambda / spread;
        weights_cov[0] = lambda / spread + (1.0 - self.alpha * self.alpha + self.beta);

        Ok((weights_mean, weights_cov))
    }

    /// Reject parameters that cannot produce sigma points
    pub fn validate(&self) -> Result<(), FilterError> {
        if !(self.alpha > 0.0) || !self.alpha.is_finite() {
            return Err(FilterError::configuration("unscented alpha must be positive"));
        }
        if !self.beta.is_finite() || !self.kappa.is_finite() {
            return Err(FilterError::configuration(
                "unscented beta and kappa must be finite",
            ));
        }
        Ok(())
    }
}

/// Sigma points of a Gaussian with their weights
#[derive(Debug, Clone)]
pub struct SigmaPoints {
    /// The sigma points `[χ₀, χ₁, ..., χ₂ₙ]`; `χ₀` is the mean
    pub points: Vec<DVector<f64>>,
    /// Weights for mean reconstruction
    pub weights_mean: Vec<f64>,
    /// Weights for covariance reconstruction
    pub weights_cov: Vec<f64>,
}

impl SigmaPoints {
    /// Generate the `2n + 1` symmetric sigma points of a Gaussian
    pub fn from_gaussian(gaussian: &Gaussian, params: &UnscentedParams) -> Result<Self, FilterError> {
        let n = gaussian.dimension();
        let gamma = params.gamma(n)?;
        let (weights_mean, weights_cov) = params.weights(n)?;

        let mut points = Vec::with_capacity(2 * n + 1);
        points.push(gaussian.map_standard_normal(&DVector::zeros(n))?);
        for sign in [1.0, -1.0] {
            for i in 0..n {
                let mut noise = DVector::zeros(n);
                noise[i] = sign * gamma;
                points.push(gaussian.map_standard_normal(&noise)?);
            }
        }

        Ok(Self {
            points,
            weights_mean,
            weights_cov,
        })
    }

    /// Number of sigma points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no sigma points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Weighted mean of per-point values
    pub fn weighted_mean(&self, values: &[DVector<f64>]) -> DVector<f64> {
        let dim = values.first().map(|v| v.len()).unwrap_or(0);
        values
            .iter()
            .zip(self.weights_mean.iter())
            .fold(DVector::zeros(dim), |acc, (v, w)| acc + v * *w)
    }

    /// Weighted covariance of per-point values around `mean`
    pub fn weighted_covariance(&self, values: &[DVector<f64>], mean: &DVector<f64>) -> DMatrix<f64> {
        let dim = mean.len();
        values
            .iter()
            .zip(self.weights_cov.iter())
            .fold(DMatrix::zeros(dim, dim), |acc, (v, w)| {
                let d = v - mean;
                acc + (&d * d.transpose()) * *w
            })
    }

    /// Weighted cross-covariance between the sigma points and per-point values
    pub fn cross_covariance(
        &self,
        point_mean: &DVector<f64>,
        values: &[DVector<f64>],
        value_mean: &DVector<f64>,
    ) -> DMatrix<f64> {
        self.points
            .iter()
            .zip(values.iter())
            .zip(self.weights_cov.iter())
            .fold(
                DMatrix::zeros(point_mean.len(), value_mean.len()),
                |acc, ((x, v), w)| acc + ((x - point_mean) * (v - value_mean).transpose()) * *w,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Covariance;

    fn test_gaussian() -> Gaussian {
        Gaussian::new(
            DVector::from_vec(vec![1.0, 2.0, -1.0]),
            Covariance::Dense(DMatrix::from_row_slice(
                3,
                3,
                &[2.0, 0.3, 0.0, 0.3, 1.0, 0.1, 0.0, 0.1, 0.5],
            )),
        )
        .unwrap()
    }

    #[test]
    fn test_weights_sum_to_one() {
        for params in [
            UnscentedParams::default(),
            UnscentedParams::new(1e-3, 2.0, 0.0),
            UnscentedParams::new(0.5, 2.0, 1.0),
        ] {
            let (wm, _) = params.weights(4).unwrap();
            let total: f64 = wm.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sigma_points_recover_moments() {
        let g = test_gaussian();
        let sigma = SigmaPoints::from_gaussian(&g, &UnscentedParams::default()).unwrap();
        assert_eq!(sigma.len(), 7);
        assert_eq!(&sigma.points[0], g.mean());

        let mean = sigma.weighted_mean(&sigma.points);
        assert!((&mean - g.mean()).amax() < 1e-12);

        let cov = sigma.weighted_covariance(&sigma.points, &mean);
        // weights_cov[0] multiplies a zero deviation, so the default params reproduce Σ
        assert!((cov - g.covariance().to_dense()).amax() < 1e-10);
    }

    #[test]
    fn test_cross_covariance_of_identity_map() {
        let g = test_gaussian();
        let sigma = SigmaPoints::from_gaussian(&g, &UnscentedParams::default()).unwrap();
        let mean = sigma.weighted_mean(&sigma.points);
        let cross = sigma.cross_covariance(&mean, &sigma.points, &mean);
        assert!((cross - g.covariance().to_dense()).amax() < 1e-10);
    }

    #[test]
    fn test_invalid_spread() {
        let params = UnscentedParams::new(1.0, 2.0, -5.0);
        assert!(matches!(
            params.gamma(3),
            Err(FilterError::Configuration { .. })
        ));
        assert!(UnscentedParams::new(0.0, 2.0, 0.0).validate().is_err());
    }
}
