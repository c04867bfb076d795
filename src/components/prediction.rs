//! Belief prediction through a process model
//!
//! Implements the Chapman-Kolmogorov prediction for a Gaussian belief with the
//! unscented transform:
//! - `μ' = Σ wᵢ E[x' | χᵢ]`
//! - `Σ' = Σ wᵢ (E[x' | χᵢ] - μ')(·)ᵀ + Σ wᵢ Cov[x' | χᵢ]`

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::symmetrize;
use crate::distribution::{Covariance, Gaussian, Moments};
use crate::filter::errors::FilterError;
use crate::models::process::ProcessModel;

use super::sigma_points::{SigmaPoints, UnscentedParams};

/// Predict a Gaussian belief forward by `delta_time`
///
/// Exact for process models whose conditional mean is linear in the state and
/// whose conditional covariance does not depend on it.
pub fn unscented_propagate<P: ProcessModel + ?Sized>(
    model: &P,
    delta_time: f64,
    belief: &Gaussian,
    control: Option<&DVector<f64>>,
    params: &UnscentedParams,
) -> Result<Gaussian, FilterError> {
    let n = model.state_dimension();
    if belief.dimension() != n {
        return Err(FilterError::dimension_mismatch(
            n,
            belief.dimension(),
            "belief dimension for prediction",
        ));
    }

    let sigma = SigmaPoints::from_gaussian(belief, params)?;
    let conditionals = sigma
        .points
        .iter()
        .map(|x| model.conditionals(delta_time, x, control))
        .collect::<Result<Vec<_>, _>>()?;

    let means: Vec<DVector<f64>> = conditionals.iter().map(|c| c.mean().clone()).collect();
    let mean = sigma.weighted_mean(&means);

    let expected_noise = conditionals
        .iter()
        .zip(sigma.weights_mean.iter())
        .fold(DMatrix::zeros(n, n), |acc, (c, w)| {
            acc + c.covariance().to_dense() * *w
        });
    let spread = sigma.weighted_covariance(&means, &mean);

    Gaussian::new(mean, Covariance::Dense(symmetrize(&(spread + expected_noise))))
}
