/*!
# Robust depth filters

Recursive Bayesian pose estimation from depth images.

The filter compares a rendered depth image of each hypothesized pose with
the sensor frame, pixel by pixel, through a robust likelihood. Every pixel
carries an occlusion latent `b` whose sigmoid is the probability that the
pixel shows something other than the tracked object, so occluders and
sensor artefacts are learned and down-weighted over time.

## Modules

- [`filter`] - the [`RobustDepthFilter`] and its [`Filter`] trait
- [`models`] - process models and the robust observation model
- [`render`] - renderer collaborator contract, camera and depth images
- [`distribution`] - Gaussian belief and distribution capabilities
- [`components`] - unscented transform, prediction and update
- [`config`] - serde configuration
- [`reporter`] - cycle observability
- [`common`] - low-level numerics

## Example

```rust
use nalgebra::DVector;
use robust_depth_filters_rs::{
    CameraModel, Covariance, DampedWienerProcess, DepthImage, Filter, FilterError, Renderer,
    RobustDepthFilter, TrackerConfig,
};

/// Fronto-parallel wall at depth `pose[0]`
struct Wall;

impl Renderer for Wall {
    fn render(&self, pose: &DVector<f64>, camera: &CameraModel) -> Result<DepthImage, FilterError> {
        Ok(DepthImage::filled(camera.width, camera.height, pose[0]))
    }
}

let mut config = TrackerConfig::default();
config.camera = CameraModel::new(8, 6, 8.0, 8.0, 3.5, 2.5);

let pose_model = DampedWienerProcess::brownian(1, 0.05).unwrap();
let mut filter = RobustDepthFilter::new(pose_model, Wall, &config).unwrap();
filter
    .initialize(DVector::from_element(1, 1.0), Covariance::isotropic(1, 0.01))
    .unwrap();

let frame = vec![1.02; config.camera.pixel_count()];
filter.predict(0.033, None).unwrap();
filter.update(&frame).unwrap();
let pose = filter.pose_belief().unwrap();
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Predict/update filter over pose and occlusion latents
pub mod filter;

/// Process and observation models
pub mod models;

/// Renderer contract, camera model and depth images
pub mod render;

/// Gaussian belief and distribution capability traits
pub mod distribution;

/// Shared algorithms: unscented transform, prediction, update
pub mod components;

/// Serde configuration of the tracker
pub mod config;

/// Observability hooks for filter cycles
pub mod reporter;

/// Low-level utilities (linear algebra, constants)
pub mod common;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Distributions
pub use distribution::{Covariance, Gaussian, Mappable, Moments, Sampleable};

// Models
pub use models::{
    AugmentedProcessModel, DampedWienerProcess, DepthObservationModel, DynProcessModel,
    FrameLikelihood, IntegratedDampedWienerProcess, OcclusionProcessModel, ProcessModel,
    RobustPixelModel,
};

// Rendering
pub use render::{CameraModel, DepthImage, Renderer, NO_SURFACE};

// Filter
pub use filter::{Filter, FilterError, FilterStatus, RobustDepthFilter, UpdateSummary};

// Configuration
pub use components::UnscentedParams;
pub use config::TrackerConfig;

// Reporters
pub use reporter::{CompositeReporter, CycleReporter, DebugReporter, LoggingReporter, NoOpReporter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
