//! Measurement update of the augmented belief
//!
//! One frame is folded into the belief in three steps:
//!
//! 1. The pose block is expanded into sigma points and every sigma pose is
//!    rendered. Per pixel this gives the predicted depth, its spread under
//!    pose uncertainty, and its cross-covariance with the pose.
//! 2. Each occlusion latent with usable evidence is updated on its own by
//!    moment matching `N(b; m, v)·L(b)` with a 5-point Gauss–Hermite rule.
//! 3. The pose is corrected with the statistically linearized observation
//!    `hᵢ = P⁻¹cᵢ` in information form. Every pixel enters with the effective
//!    noise `σ²/wᵢ`, where `wᵢ` is its inlier responsibility under the
//!    updated latents, so likely outliers carry almost no information.
//!
//! The information form `P⁺ = (P⁻¹ + Σ hᵢhᵢᵀ/Rᵢ)⁻¹` is evaluated as
//! `P⁺ = P(P + C)⁻¹P` with `C = Σ cᵢcᵢᵀ/Rᵢ`, which avoids inverting `P`.

use nalgebra::{DMatrix, DVector};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::common::constants::{
    GAUSS_HERMITE_NODES, GAUSS_HERMITE_WEIGHTS, MAX_LATENT_MAGNITUDE, MIN_INLIER_RESPONSIBILITY,
    PSD_TOLERANCE,
};
use crate::common::linalg::{log_sum_exp, symmetrize};
use crate::distribution::{Covariance, Gaussian, Moments};
use crate::filter::errors::FilterError;
use crate::models::observation::{DepthObservationModel, FrameLikelihood, RobustPixelModel};
use crate::render::{CameraModel, DepthImage, Renderer};

use super::sigma_points::{SigmaPoints, UnscentedParams};

/// Rendered depth of one pixel under pose uncertainty
#[derive(Debug, Clone, PartialEq)]
pub struct PixelPrediction {
    /// Predicted depth ŷ
    pub depth: f64,
    /// Variance of the rendered depth across sigma poses
    pub spread: f64,
    /// Cross-covariance between pose and rendered depth
    ///
    /// `None` when some sigma pose renders no surface at this pixel; such a
    /// pixel cannot be linearized and does not correct the pose.
    pub cross_covariance: Option<DVector<f64>>,
}

/// Per-pixel predictions from the renders of all sigma poses
///
/// `rendered[k]` must be the render of `sigma.points[k]`. Pixels without a
/// surface at the mean pose (sigma point 0) get `None`.
pub fn predict_pixels(sigma: &SigmaPoints, rendered: &[DepthImage]) -> Vec<Option<PixelPrediction>> {
    let pixel_count = rendered.first().map(|r| r.pixel_count()).unwrap_or(0);
    let mean_pose = &sigma.points[0];
    let deviations: Vec<DVector<f64>> = sigma.points.iter().map(|x| x - mean_pose).collect();

    (0..pixel_count)
        .map(|i| {
            let at_mean = rendered[0].depth(i)?;
            let depths: Option<Vec<f64>> = rendered.iter().map(|r| r.depth(i)).collect();
            let Some(depths) = depths else {
                return Some(PixelPrediction {
                    depth: at_mean,
                    spread: 0.0,
                    cross_covariance: None,
                });
            };

            let depth: f64 = depths
                .iter()
                .zip(sigma.weights_mean.iter())
                .map(|(d, w)| w * d)
                .sum();
            let spread: f64 = depths
                .iter()
                .zip(sigma.weights_cov.iter())
                .map(|(d, w)| w * (d - depth) * (d - depth))
                .sum();
            let cross = depths
                .iter()
                .zip(deviations.iter())
                .zip(sigma.weights_cov.iter())
                .fold(DVector::zeros(mean_pose.len()), |acc, ((d, dx), w)| {
                    acc + dx * (w * (d - depth))
                });

            Some(PixelPrediction {
                depth,
                spread: spread.max(0.0),
                cross_covariance: Some(cross),
            })
        })
        .collect()
}

/// Moment-matched posterior `(mean, variance)` of one occlusion latent
pub fn update_latent(
    model: &RobustPixelModel,
    measured: f64,
    prediction: &PixelPrediction,
    prior_mean: f64,
    prior_variance: f64,
) -> (f64, f64) {
    let variance = model.sensor_variance() + prediction.spread;
    let sd = prior_variance.max(0.0).sqrt();

    let mut nodes = [0.0; 5];
    let mut log_weights = [0.0; 5];
    for (k, (x, w)) in GAUSS_HERMITE_NODES
        .iter()
        .zip(GAUSS_HERMITE_WEIGHTS.iter())
        .enumerate()
    {
        let b = prior_mean + sd * x;
        nodes[k] = b;
        log_weights[k] = w.ln()
            + model.pixel_log_likelihood_with_variance(measured, Some(prediction.depth), b, variance);
    }

    let norm = log_sum_exp(&log_weights);
    let weights = log_weights.map(|l| (l - norm).exp());
    let mean: f64 = nodes.iter().zip(weights.iter()).map(|(b, w)| w * b).sum();
    let var: f64 = nodes
        .iter()
        .zip(weights.iter())
        .map(|(b, w)| w * (b - mean) * (b - mean))
        .sum();

    (
        mean.clamp(-MAX_LATENT_MAGNITUDE, MAX_LATENT_MAGNITUDE),
        var.max(0.0),
    )
}

/// Every per-pixel input must have one entry per measured pixel
fn check_pixel_lengths(measured: &[f64], lengths: &[(usize, &str)]) -> Result<(), FilterError> {
    for &(len, context) in lengths {
        if len != measured.len() {
            return Err(FilterError::dimension_mismatch(measured.len(), len, context));
        }
    }
    Ok(())
}

/// Update all latents; returns `(means, variances, updated pixel count)`
///
/// Latents of pixels with an invalid measurement or no surface at the mean
/// pose keep their prior moments.
pub fn update_latents(
    model: &RobustPixelModel,
    measured: &[f64],
    predictions: &[Option<PixelPrediction>],
    means: &DVector<f64>,
    variances: &DVector<f64>,
) -> Result<(DVector<f64>, DVector<f64>, usize), FilterError> {
    check_pixel_lengths(
        measured,
        &[
            (predictions.len(), "pixel predictions"),
            (means.len(), "latent means"),
            (variances.len(), "latent variances"),
        ],
    )?;

    let posterior = |i: usize| -> (f64, f64, bool) {
        match &predictions[i] {
            Some(prediction) if model.is_valid_measurement(measured[i]) => {
                let (m, v) = update_latent(model, measured[i], prediction, means[i], variances[i]);
                (m, v, true)
            }
            _ => (means[i], variances[i], false),
        }
    };

    #[cfg(feature = "rayon")]
    let results: Vec<(f64, f64, bool)> = (0..measured.len()).into_par_iter().map(posterior).collect();
    #[cfg(not(feature = "rayon"))]
    let results: Vec<(f64, f64, bool)> = (0..measured.len()).map(posterior).collect();

    let updated = results.iter().filter(|r| r.2).count();
    let new_means = DVector::from_iterator(results.len(), results.iter().map(|r| r.0));
    let new_variances = DVector::from_iterator(results.len(), results.iter().map(|r| r.1));
    Ok((new_means, new_variances, updated))
}

/// `A⁻¹` for a symmetric positive semi-definite `A`
fn invert_psd(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>, FilterError> {
    if let Some(chol) = matrix.clone().cholesky() {
        return Ok(chol.inverse());
    }
    let eps = PSD_TOLERANCE * matrix.amax().max(1.0);
    matrix
        .clone()
        .pseudo_inverse(eps)
        .map_err(|e| FilterError::NumericalInstability {
            description: format!("pose information matrix not invertible: {}", e),
        })
}

/// Information-form pose correction; returns the posterior and the pixel count used
pub fn correct_pose(
    pose: &Gaussian,
    model: &RobustPixelModel,
    measured: &[f64],
    predictions: &[Option<PixelPrediction>],
    latent_means: &DVector<f64>,
) -> Result<(Gaussian, usize), FilterError> {
    check_pixel_lengths(
        measured,
        &[
            (predictions.len(), "pixel predictions"),
            (latent_means.len(), "latent means"),
        ],
    )?;
    let p = pose.dimension();
    let mut information = DMatrix::zeros(p, p);
    let mut innovation = DVector::zeros(p);
    let mut used = 0;

    for (i, prediction) in predictions.iter().enumerate() {
        let (prediction, cross) = match prediction {
            Some(pred) => match &pred.cross_covariance {
                Some(c) => (pred, c),
                None => continue,
            },
            None => continue,
        };
        if cross.len() != p {
            return Err(FilterError::dimension_mismatch(p, cross.len(), "pixel cross-covariance"));
        }
        let y = measured[i];
        if !model.is_valid_measurement(y) {
            continue;
        }

        let variance = model.sensor_variance() + prediction.spread;
        let w = model
            .inlier_responsibility(y, prediction.depth, variance, latent_means[i])
            .max(MIN_INLIER_RESPONSIBILITY);
        let noise = model.sensor_variance() / w;

        information += cross * cross.transpose() * (1.0 / noise);
        innovation += cross * ((y - prediction.depth) / noise);
        used += 1;
    }

    if used == 0 {
        return Ok((pose.clone(), 0));
    }

    let prior = pose.covariance().to_dense();
    let system_inverse = invert_psd(&(&prior + &information))?;
    let covariance = symmetrize(&(&prior * &system_inverse * &prior));
    let mean = pose.mean() + &prior * (&system_inverse * innovation);

    if mean.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::NumericalInstability {
            description: "pose correction produced a non-finite mean".to_string(),
        });
    }

    Ok((Gaussian::new(mean, Covariance::Dense(covariance))?, used))
}

/// Result of folding one frame into the belief
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Posterior over `[pose; latents]`
    pub belief: Gaussian,
    /// Frame likelihood at the predicted mean pose and latents
    pub frame: FrameLikelihood,
    /// Latents that received evidence
    pub latent_pixels: usize,
    /// Pixels that corrected the pose
    pub pose_pixels: usize,
}

/// Fold one observed depth frame into an augmented belief
///
/// The input belief is never modified; the caller replaces its belief with
/// [`UpdateOutcome::belief`] on success.
pub fn robust_update<R: Renderer + ?Sized>(
    belief: &Gaussian,
    pose_dimension: usize,
    renderer: &R,
    camera: &CameraModel,
    observation: &DepthObservationModel,
    measured: &[f64],
    params: &UnscentedParams,
) -> Result<UpdateOutcome, FilterError> {
    observation.check_observation(measured)?;
    let n = observation.observation_dimension();
    if belief.dimension() != pose_dimension + n {
        return Err(FilterError::dimension_mismatch(
            pose_dimension + n,
            belief.dimension(),
            "augmented belief",
        ));
    }

    // STEP 1: render the sigma poses
    let pose_belief = belief.marginal(0, pose_dimension)?;
    let sigma = SigmaPoints::from_gaussian(&pose_belief, params)?;
    let rendered = renderer.render_batch(&sigma.points, camera)?;
    if rendered.len() != sigma.len() {
        return Err(FilterError::dimension_mismatch(
            sigma.len(),
            rendered.len(),
            "rendered image count",
        ));
    }
    for image in &rendered {
        image.check_size(camera)?;
    }
    let predictions = predict_pixels(&sigma, &rendered);

    // STEP 2: occlusion latents
    let latent_means = belief.mean().rows(pose_dimension, n).into_owned();
    let latent_variances = belief
        .covariance()
        .diagonal()
        .rows(pose_dimension, n)
        .into_owned();
    let frame = observation.frame_log_likelihood(measured, &rendered[0], latent_means.as_slice())?;
    let (means, variances, latent_pixels) = update_latents(
        observation.pixel_model(),
        measured,
        &predictions,
        &latent_means,
        &latent_variances,
    )?;

    // STEP 3: pose
    let (pose_posterior, pose_pixels) = correct_pose(
        &pose_belief,
        observation.pixel_model(),
        measured,
        &predictions,
        &means,
    )?;

    let mut mean = DVector::zeros(pose_dimension + n);
    mean.rows_mut(0, pose_dimension).copy_from(pose_posterior.mean());
    mean.rows_mut(pose_dimension, n).copy_from(&means);
    let belief = Gaussian::new(
        mean,
        Covariance::BlockDiagonal(vec![
            pose_posterior.covariance().clone(),
            Covariance::Diagonal(variances),
        ]),
    )?;

    Ok(UpdateOutcome {
        belief,
        frame,
        latent_pixels,
        pose_pixels,
    })
}
