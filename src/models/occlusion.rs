//! Per-pixel occlusion latent dynamics
//!
//! Each pixel carries a scalar latent `b` whose sigmoid is the probability
//! that the pixel is occluded or an outlier. Between frames the latent
//! relaxes towards the neutral prior logit `b₀` and diffuses:
//!
//! `b' = b₀ + e^{-ρΔt}(b - b₀) + w`, `Var[w] = σ_b²(1 - e^{-2ρΔt})/(2ρ)`

use nalgebra::DVector;

use crate::components::sigma_points::UnscentedParams;
use crate::distribution::{Covariance, Gaussian, Moments};
use crate::filter::errors::FilterError;

use super::observation::logit;
use super::process::{check_transition_inputs, damped_coefficients, ProcessModel};

/// Mean-reverting diffusion of the per-pixel occlusion latents
#[derive(Debug, Clone, PartialEq)]
pub struct OcclusionProcessModel {
    pixel_count: usize,
    prior_logit: f64,
    reversion_rate: f64,
    diffusion_sigma: f64,
}

impl OcclusionProcessModel {
    /// Create the latent dynamics for `pixel_count` pixels
    ///
    /// `prior_probability` is the neutral occlusion probability the latents
    /// relax towards.
    pub fn new(
        pixel_count: usize,
        prior_probability: f64,
        reversion_rate: f64,
        diffusion_sigma: f64,
    ) -> Result<Self, FilterError> {
        if !(prior_probability > 0.0 && prior_probability < 1.0) {
            return Err(FilterError::configuration(format!(
                "prior occlusion probability must lie in (0, 1), got {}",
                prior_probability
            )));
        }
        if !(reversion_rate >= 0.0) || !reversion_rate.is_finite() {
            return Err(FilterError::configuration(
                "occlusion reversion rate must be non-negative",
            ));
        }
        if !(diffusion_sigma >= 0.0) || !diffusion_sigma.is_finite() {
            return Err(FilterError::configuration(
                "occlusion diffusion sigma must be non-negative",
            ));
        }
        Ok(Self {
            pixel_count,
            prior_logit: logit(prior_probability),
            reversion_rate,
            diffusion_sigma,
        })
    }

    /// Number of pixels (latents)
    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Neutral latent value `b₀`
    pub fn prior_logit(&self) -> f64 {
        self.prior_logit
    }

    /// `(decay, added variance)` of the latent transition over `delta_time`
    pub fn transition_coefficients(&self, delta_time: f64) -> (f64, f64) {
        let (decay, _, unit_variance) = damped_coefficients(self.reversion_rate, delta_time);
        (
            decay,
            self.diffusion_sigma * self.diffusion_sigma * unit_variance,
        )
    }

    /// Exact moment propagation of independent latents
    pub fn propagate_moments(
        &self,
        delta_time: f64,
        means: &DVector<f64>,
        variances: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>), FilterError> {
        if means.len() != self.pixel_count || variances.len() != self.pixel_count {
            return Err(FilterError::dimension_mismatch(
                self.pixel_count,
                means.len().max(variances.len()),
                "occlusion latent moments",
            ));
        }
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(FilterError::configuration(format!(
                "delta_time must be finite and non-negative, got {}",
                delta_time
            )));
        }
        let (decay, added) = self.transition_coefficients(delta_time);
        let b0 = self.prior_logit;
        let new_means = means.map(|m| b0 + decay * (m - b0));
        let new_variances = variances.map(|v| decay * decay * v + added);
        Ok((new_means, new_variances))
    }
}

impl ProcessModel for OcclusionProcessModel {
    fn state_dimension(&self) -> usize {
        self.pixel_count
    }

    fn control_size(&self) -> usize {
        0
    }

    fn noise_dimension(&self) -> usize {
        self.pixel_count
    }

    fn conditionals_with_control(
        &self,
        delta_time: f64,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Gaussian, FilterError> {
        check_transition_inputs(self, delta_time, state, control)?;
        let (decay, added) = self.transition_coefficients(delta_time);
        let b0 = self.prior_logit;
        Gaussian::new(
            state.map(|b| b0 + decay * (b - b0)),
            Covariance::isotropic(self.pixel_count, added),
        )
    }

    /// Exact propagation; a diagonal belief stays diagonal
    fn propagate(
        &self,
        delta_time: f64,
        belief: &Gaussian,
        control: Option<&DVector<f64>>,
        _params: &UnscentedParams,
    ) -> Result<Gaussian, FilterError> {
        if belief.dimension() != self.pixel_count {
            return Err(FilterError::dimension_mismatch(
                self.pixel_count,
                belief.dimension(),
                "occlusion belief",
            ));
        }
        if let Some(u) = control {
            if !u.is_empty() {
                return Err(FilterError::dimension_mismatch(0, u.len(), "control vector"));
            }
        }
        match belief.covariance() {
            Covariance::Diagonal(variances) => {
                let (means, variances) =
                    self.propagate_moments(delta_time, belief.mean(), variances)?;
                Gaussian::new(means, Covariance::Diagonal(variances))
            }
            other => {
                let (decay, added) = self.transition_coefficients(delta_time);
                let dense = other.to_dense() * (decay * decay)
                    + nalgebra::DMatrix::identity(self.pixel_count, self.pixel_count) * added;
                let (means, _) = self.propagate_moments(
                    delta_time,
                    belief.mean(),
                    &DVector::zeros(self.pixel_count),
                )?;
                Gaussian::new(means, Covariance::Dense(dense))
            }
        }
    }
}
