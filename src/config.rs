//! Tracker configuration
//!
//! [`TrackerConfig`] carries every user-tunable parameter of the tracker. It is
//! read once at initialization, typically from JSON, and turned into the
//! process and observation models by the builder methods.

use serde::{Deserialize, Serialize};

use crate::components::sigma_points::UnscentedParams;
use crate::filter::errors::FilterError;
use crate::models::observation::{DepthObservationModel, RobustPixelModel};
use crate::models::occlusion::OcclusionProcessModel;
use crate::models::process::{DampedWienerProcess, DynProcessModel, IntegratedDampedWienerProcess};
use crate::render::CameraModel;

/// Pose dynamics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoseProcessConfig {
    /// [`DampedWienerProcess`] over the pose coordinates
    DampedWiener {
        /// Number of pose coordinates
        dimension: usize,
        /// Damping rate γ [1/s]
        damping: f64,
        /// Diffusion σ per coordinate
        sigma: f64,
    },
    /// [`IntegratedDampedWienerProcess`] over pose and pose velocity
    IntegratedDampedWiener {
        /// Number of pose coordinates; the state also holds their velocities
        degrees_of_freedom: usize,
        /// Velocity damping rate γ [1/s]
        damping: f64,
        /// Acceleration noise σ
        sigma: f64,
    },
}

impl Default for PoseProcessConfig {
    fn default() -> Self {
        PoseProcessConfig::DampedWiener {
            dimension: 6,
            damping: 0.0,
            sigma: 0.05,
        }
    }
}

impl PoseProcessConfig {
    /// Dimension of the pose state
    pub fn state_dimension(&self) -> usize {
        match *self {
            PoseProcessConfig::DampedWiener { dimension, .. } => dimension,
            PoseProcessConfig::IntegratedDampedWiener {
                degrees_of_freedom, ..
            } => 2 * degrees_of_freedom,
        }
    }

    /// Build the configured process model
    pub fn build(&self) -> Result<DynProcessModel, FilterError> {
        Ok(match *self {
            PoseProcessConfig::DampedWiener {
                dimension,
                damping,
                sigma,
            } => Box::new(DampedWienerProcess::new(dimension, damping, sigma)?),
            PoseProcessConfig::IntegratedDampedWiener {
                degrees_of_freedom,
                damping,
                sigma,
            } => Box::new(IntegratedDampedWienerProcess::new(
                degrees_of_freedom,
                damping,
                sigma,
            )?),
        })
    }
}

/// Depth sensor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationConfig {
    /// Sensor noise standard deviation [m]
    pub sensor_sigma: f64,
    /// Lower end of the valid measurement range [m]
    pub min_depth: f64,
    /// Upper end of the valid measurement range [m]
    pub max_depth: f64,
    /// Penalty for pixels without a rendered surface; defaults to the outlier log-density
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_surface_log_likelihood: Option<f64>,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            sensor_sigma: 0.01,
            min_depth: 0.0,
            max_depth: 5.0,
            no_surface_log_likelihood: None,
        }
    }
}

/// Occlusion latent parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcclusionConfig {
    /// Occlusion probability of a fresh latent
    pub initial_probability: f64,
    /// Variance of a fresh latent
    pub initial_variance: f64,
    /// Neutral probability the latents relax towards between frames
    pub prior_probability: f64,
    /// Relaxation rate [1/s]
    pub reversion_rate: f64,
    /// Diffusion of the latents [1/√s]
    pub diffusion_sigma: f64,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            initial_probability: 0.1,
            initial_variance: 1.0,
            prior_probability: 0.1,
            reversion_rate: 0.0,
            diffusion_sigma: 1.0,
        }
    }
}

/// Complete tracker configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Image size and intrinsics; fixes the number of latents
    pub camera: CameraModel,
    /// Pose dynamics, used by [`RobustDepthFilter::from_config`](crate::filter::RobustDepthFilter::from_config)
    pub process: PoseProcessConfig,
    /// Depth sensor model
    pub observation: ObservationConfig,
    /// Occlusion latent initialization and dynamics
    pub occlusion: OcclusionConfig,
    /// Sigma-point spread
    pub unscented: UnscentedParams,
}

impl TrackerConfig {
    /// Parse and validate a JSON configuration; missing sections take their defaults
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Compact JSON
    pub fn to_json(&self) -> Result<String, FilterError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, FilterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of pixels (and occlusion latents)
    pub fn pixel_count(&self) -> usize {
        self.camera.pixel_count()
    }

    /// Dimension of the augmented state
    pub fn state_dimension(&self) -> usize {
        self.process.state_dimension() + self.pixel_count()
    }

    /// Check every section; builds each model once and discards it
    pub fn validate(&self) -> Result<(), FilterError> {
        self.camera.validate()?;
        self.unscented.validate()?;
        if self.process.state_dimension() == 0 {
            return Err(FilterError::configuration("pose dimension must be positive"));
        }
        self.process.build()?;
        self.pixel_model()?;
        self.occlusion_model()?;
        let initial = self.occlusion.initial_probability;
        if !(initial > 0.0 && initial < 1.0) {
            return Err(FilterError::configuration(format!(
                "initial occlusion probability must lie in (0, 1), got {}",
                initial
            )));
        }
        if !(self.occlusion.initial_variance >= 0.0) || !self.occlusion.initial_variance.is_finite()
        {
            return Err(FilterError::configuration(
                "initial latent variance must be non-negative",
            ));
        }
        Ok(())
    }

    /// Per-pixel observation model
    pub fn pixel_model(&self) -> Result<RobustPixelModel, FilterError> {
        let o = &self.observation;
        let model = RobustPixelModel::new(o.sensor_sigma, o.min_depth, o.max_depth)?;
        Ok(match o.no_surface_log_likelihood {
            Some(value) if value.is_finite() => model.with_no_surface_log_likelihood(value),
            Some(value) => {
                return Err(FilterError::configuration(format!(
                    "no-surface log-likelihood must be finite, got {}",
                    value
                )))
            }
            None => model,
        })
    }

    /// Image-level observation model
    pub fn observation_model(&self) -> Result<DepthObservationModel, FilterError> {
        Ok(DepthObservationModel::new(
            self.pixel_model()?,
            self.pixel_count(),
        ))
    }

    /// Occlusion latent dynamics
    pub fn occlusion_model(&self) -> Result<OcclusionProcessModel, FilterError> {
        let o = &self.occlusion;
        OcclusionProcessModel::new(
            self.pixel_count(),
            o.prior_probability,
            o.reversion_rate,
            o.diffusion_sigma,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::process::ProcessModel;

    #[test]
    fn test_default_is_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pixel_count(), 64 * 48);
        assert_eq!(config.state_dimension(), 6 + 64 * 48);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = TrackerConfig::default();
        config.process = PoseProcessConfig::IntegratedDampedWiener {
            degrees_of_freedom: 3,
            damping: 0.5,
            sigma: 1.0,
        };
        config.observation.no_surface_log_likelihood = Some(-4.0);
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"kind\": \"integrated_damped_wiener\""));
        let parsed = TrackerConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "observation": { "sensor_sigma": 0.02, "min_depth": 0.3, "max_depth": 4.0 } }"#;
        let config = TrackerConfig::from_json(json).unwrap();
        assert_eq!(config.observation.sensor_sigma, 0.02);
        assert_eq!(config.observation.no_surface_log_likelihood, None);
        assert_eq!(config.camera, CameraModel::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = TrackerConfig::default();
        config.observation.max_depth = -1.0;
        assert!(matches!(config.validate(), Err(FilterError::Configuration { .. })));

        let mut config = TrackerConfig::default();
        config.occlusion.initial_probability = 1.0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.unscented.alpha = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            TrackerConfig::from_json("{ not json"),
            Err(FilterError::Configuration { .. })
        ));
    }

    #[test]
    fn test_builders() {
        let config = TrackerConfig::default();
        let process = config.process.build().unwrap();
        assert_eq!(process.state_dimension(), 6);
        assert_eq!(config.observation_model().unwrap().observation_dimension(), 3072);
        assert_eq!(config.occlusion_model().unwrap().pixel_count(), 3072);
    }
}
