//! Robust, occlusion-aware depth observation model
//!
//! For pixel `i` with occlusion latent `bᵢ`, `pᵢ = σ(bᵢ)` is the probability
//! that the measurement does not come from the rendered surface. The measured
//! depth is then modelled as the mixture
//!
//! `(1 - pᵢ)·N(y; ŷ, σ²) + pᵢ·U(y; [d_min, d_max])`
//!
//! Pixels without a rendered surface contribute a fixed penalty, and pixels
//! whose measurement lies outside the sensor range are missing data.

use serde::{Deserialize, Serialize};

use crate::common::linalg::{log_add_exp, log_normal_pdf};
use crate::filter::errors::FilterError;
use crate::render::DepthImage;

/// Logistic sigmoid `1 / (1 + e^{-b})`
#[inline]
pub fn sigmoid(b: f64) -> f64 {
    if b >= 0.0 {
        1.0 / (1.0 + (-b).exp())
    } else {
        let e = b.exp();
        e / (1.0 + e)
    }
}

/// `ln σ(b)` without underflow for large negative `b`
#[inline]
pub fn log_sigmoid(b: f64) -> f64 {
    if b >= 0.0 {
        -(-b).exp().ln_1p()
    } else {
        b - b.exp().ln_1p()
    }
}

/// Inverse of [`sigmoid`]
#[inline]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Per-pixel robust likelihood
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustPixelModel {
    /// Standard deviation of the depth sensor noise [m]
    pub sensor_sigma: f64,
    /// Lower end of the valid measurement range [m]
    pub min_depth: f64,
    /// Upper end of the valid measurement range [m]
    pub max_depth: f64,
    /// Log-likelihood of a pixel whose ray hits no rendered surface
    pub no_surface_log_likelihood: f64,
}

impl RobustPixelModel {
    /// Create a pixel model; the no-surface penalty defaults to the outlier log-density
    pub fn new(sensor_sigma: f64, min_depth: f64, max_depth: f64) -> Result<Self, FilterError> {
        if !(sensor_sigma > 0.0) || !sensor_sigma.is_finite() {
            return Err(FilterError::configuration("sensor sigma must be positive"));
        }
        if !(min_depth >= 0.0) || !(max_depth > min_depth) || !max_depth.is_finite() {
            return Err(FilterError::configuration(format!(
                "invalid depth range [{}, {}]",
                min_depth, max_depth
            )));
        }
        Ok(Self {
            sensor_sigma,
            min_depth,
            max_depth,
            no_surface_log_likelihood: -(max_depth - min_depth).ln(),
        })
    }

    /// Override the fixed penalty for pixels without a rendered surface
    pub fn with_no_surface_log_likelihood(mut self, value: f64) -> Self {
        self.no_surface_log_likelihood = value;
        self
    }

    /// Sensor noise variance `σ²`
    #[inline]
    pub fn sensor_variance(&self) -> f64 {
        self.sensor_sigma * self.sensor_sigma
    }

    /// Log-density of the uniform outlier distribution over the sensor range
    #[inline]
    pub fn outlier_log_density(&self) -> f64 {
        -(self.max_depth - self.min_depth).ln()
    }

    /// Whether a measured depth is usable evidence
    #[inline]
    pub fn is_valid_measurement(&self, measured: f64) -> bool {
        measured.is_finite() && measured >= self.min_depth && measured <= self.max_depth
    }

    /// Occlusion probability `σ(b)`
    #[inline]
    pub fn occlusion_probability(&self, latent: f64) -> f64 {
        sigmoid(latent)
    }

    /// Log-likelihood of one pixel under the sensor noise model
    pub fn pixel_log_likelihood(&self, measured: f64, rendered: Option<f64>, latent: f64) -> f64 {
        self.pixel_log_likelihood_with_variance(measured, rendered, latent, self.sensor_variance())
    }

    /// Log-likelihood of one pixel with an explicit inlier variance
    ///
    /// The filter passes `σ² + spread of the rendered depth` here so that pose
    /// uncertainty widens the inlier component.
    pub fn pixel_log_likelihood_with_variance(
        &self,
        measured: f64,
        rendered: Option<f64>,
        latent: f64,
        variance: f64,
    ) -> f64 {
        match rendered {
            None => self.no_surface_log_likelihood,
            Some(depth) => {
                let (inlier, outlier) = self.component_log_weights(measured, depth, latent, variance);
                log_add_exp(inlier, outlier)
            }
        }
    }

    /// Posterior probability that the measurement comes from the rendered surface
    pub fn inlier_responsibility(
        &self,
        measured: f64,
        rendered: f64,
        variance: f64,
        latent: f64,
    ) -> f64 {
        let (inlier, outlier) = self.component_log_weights(measured, rendered, latent, variance);
        (inlier - log_add_exp(inlier, outlier)).exp()
    }

    /// Log of the two mixture terms `(ln[(1-p)N], ln[p·U])`
    #[inline]
    fn component_log_weights(
        &self,
        measured: f64,
        rendered: f64,
        latent: f64,
        variance: f64,
    ) -> (f64, f64) {
        (
            log_sigmoid(-latent) + log_normal_pdf(measured, rendered, variance),
            log_sigmoid(latent) + self.outlier_log_density(),
        )
    }
}

/// Frame-level likelihood summary
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameLikelihood {
    /// Sum of per-pixel log-likelihoods over contributing pixels
    pub log_likelihood: f64,
    /// Pixels with a valid measurement (they contribute to the sum)
    pub valid_pixels: usize,
    /// Valid pixels whose rendered ray hit no surface
    pub no_surface_pixels: usize,
}

/// Image-level observation model
///
/// Stateless apart from its parameters; the latents are passed in from the
/// filter's augmented state.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthObservationModel {
    pixel_model: RobustPixelModel,
    pixel_count: usize,
}

impl DepthObservationModel {
    /// Create an observation model over `pixel_count` pixels
    pub fn new(pixel_model: RobustPixelModel, pixel_count: usize) -> Self {
        Self {
            pixel_model,
            pixel_count,
        }
    }

    /// Per-pixel model
    pub fn pixel_model(&self) -> &RobustPixelModel {
        &self.pixel_model
    }

    /// Number of pixels in an observation
    pub fn observation_dimension(&self) -> usize {
        self.pixel_count
    }

    /// Reject observations of the wrong size
    pub fn check_observation(&self, measured: &[f64]) -> Result<(), FilterError> {
        if measured.len() != self.pixel_count {
            return Err(FilterError::dimension_mismatch(
                self.pixel_count,
                measured.len(),
                "observation pixel count",
            ));
        }
        Ok(())
    }

    fn check_inputs(
        &self,
        measured: &[f64],
        rendered: &DepthImage,
        latents: &[f64],
    ) -> Result<(), FilterError> {
        self.check_observation(measured)?;
        if rendered.pixel_count() != self.pixel_count {
            return Err(FilterError::dimension_mismatch(
                self.pixel_count,
                rendered.pixel_count(),
                "rendered depth buffer",
            ));
        }
        if latents.len() != self.pixel_count {
            return Err(FilterError::dimension_mismatch(
                self.pixel_count,
                latents.len(),
                "occlusion latents",
            ));
        }
        Ok(())
    }

    /// Per-pixel log-likelihoods; `None` for missing measurements
    pub fn pixel_log_likelihoods(
        &self,
        measured: &[f64],
        rendered: &DepthImage,
        latents: &[f64],
    ) -> Result<Vec<Option<f64>>, FilterError> {
        self.check_inputs(measured, rendered, latents)?;
        Ok(measured
            .iter()
            .zip(latents.iter())
            .enumerate()
            .map(|(i, (&y, &b))| {
                self.pixel_model
                    .is_valid_measurement(y)
                    .then(|| self.pixel_model.pixel_log_likelihood(y, rendered.depth(i), b))
            })
            .collect())
    }

    /// Sum of per-pixel log-likelihoods, skipping missing measurements
    pub fn frame_log_likelihood(
        &self,
        measured: &[f64],
        rendered: &DepthImage,
        latents: &[f64],
    ) -> Result<FrameLikelihood, FilterError> {
        self.check_inputs(measured, rendered, latents)?;

        let mut summary = FrameLikelihood::default();
        for (i, (&y, &b)) in measured.iter().zip(latents.iter()).enumerate() {
            if !self.pixel_model.is_valid_measurement(y) {
                continue;
            }
            let rendered_depth = rendered.depth(i);
            if rendered_depth.is_none() {
                summary.no_surface_pixels += 1;
            }
            summary.valid_pixels += 1;
            summary.log_likelihood += self.pixel_model.pixel_log_likelihood(y, rendered_depth, b);
        }
        Ok(summary)
    }
}
