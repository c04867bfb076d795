//! Robust depth-image pose filter
//!
//! The filter owns a Gaussian belief over the augmented state
//! `[pose; b₁..bₙ]`, one occlusion latent per pixel, and runs the
//! predict/update recursion:
//!
//! - `predict`: unscented propagation of the pose, exact scalar propagation
//!   of each latent
//! - `update`: render the sigma poses, update the latents from per-pixel
//!   evidence, then correct the pose with outlier-weighted pixels
//!
//! Both steps build a new belief and swap it in only when every sub-step
//! succeeded.

use nalgebra::DVector;
use serde::Serialize;

use crate::components::sigma_points::UnscentedParams;
use crate::components::update::robust_update;
use crate::config::TrackerConfig;
use crate::distribution::{Covariance, Gaussian, Moments};
use crate::models::augmented::AugmentedProcessModel;
use crate::models::observation::{logit, sigmoid, DepthObservationModel, FrameLikelihood};
use crate::models::process::{DynProcessModel, ProcessModel};
use crate::render::{CameraModel, Renderer};
use crate::reporter::{CycleReporter, NoOpReporter};

use super::errors::FilterError;
use super::traits::Filter;

/// Lifecycle of the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterStatus {
    /// No belief yet; only initialization is allowed
    Uninitialized,
    /// Belief present; predict and update are allowed
    Ready,
}

/// Diagnostics of one successful update
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UpdateSummary {
    /// Frame likelihood at the predicted mean pose and latents
    pub frame: FrameLikelihood,
    /// Latents that received evidence
    pub latent_pixels: usize,
    /// Pixels that corrected the pose
    pub pose_pixels: usize,
    /// Average of `σ(b)` over all pixels after the update
    pub mean_occlusion_probability: f64,
}

/// Pose filter with per-pixel occlusion latents
///
/// # Type Parameters
/// - `P` - pose process model
/// - `R` - renderer collaborator
/// - `Rep` - cycle reporter, [`NoOpReporter`] by default
pub struct RobustDepthFilter<P, R, Rep = NoOpReporter> {
    process: AugmentedProcessModel<P>,
    observation: DepthObservationModel,
    renderer: R,
    camera: CameraModel,
    params: UnscentedParams,
    initial_latent_mean: f64,
    initial_latent_variance: f64,
    belief: Option<Gaussian>,
    last_frame: Option<FrameLikelihood>,
    reporter: Rep,
}

impl<R: Renderer> RobustDepthFilter<DynProcessModel, R> {
    /// Create a filter whose pose model is built from `config.process`
    pub fn from_config(config: &TrackerConfig, renderer: R) -> Result<Self, FilterError> {
        let pose = config.process.build()?;
        Self::new(pose, renderer, config)
    }
}

impl<P: ProcessModel, R: Renderer> RobustDepthFilter<P, R> {
    /// Create an uninitialized filter
    ///
    /// Camera, observation, occlusion and unscented parameters come from
    /// `config`; its `process` section is ignored in favour of `pose_model`.
    pub fn new(pose_model: P, renderer: R, config: &TrackerConfig) -> Result<Self, FilterError> {
        config.validate()?;
        if pose_model.state_dimension() == 0 {
            return Err(FilterError::configuration("pose dimension must be positive"));
        }
        let process = AugmentedProcessModel::new(pose_model, config.occlusion_model()?);

        log::debug!(
            "Created filter: pose dimension {}, {} pixels",
            process.pose_dimension(),
            process.pixel_count()
        );

        Ok(Self {
            process,
            observation: config.observation_model()?,
            renderer,
            camera: config.camera,
            params: config.unscented,
            initial_latent_mean: logit(config.occlusion.initial_probability),
            initial_latent_variance: config.occlusion.initial_variance,
            belief: None,
            last_frame: None,
            reporter: NoOpReporter,
        })
    }
}

impl<P: ProcessModel, R: Renderer, Rep: CycleReporter> RobustDepthFilter<P, R, Rep> {
    /// Replace the reporter
    pub fn with_reporter<Rep2: CycleReporter>(self, reporter: Rep2) -> RobustDepthFilter<P, R, Rep2> {
        RobustDepthFilter {
            process: self.process,
            observation: self.observation,
            renderer: self.renderer,
            camera: self.camera,
            params: self.params,
            initial_latent_mean: self.initial_latent_mean,
            initial_latent_variance: self.initial_latent_variance,
            belief: self.belief,
            last_frame: self.last_frame,
            reporter,
        }
    }

    /// Start from a pose belief with neutral occlusion latents
    pub fn initialize(
        &mut self,
        pose_mean: DVector<f64>,
        pose_covariance: Covariance,
    ) -> Result<(), FilterError> {
        let p = self.process.pose_dimension();
        let n = self.process.pixel_count();
        if pose_mean.len() != p {
            let err = FilterError::dimension_mismatch(p, pose_mean.len(), "initial pose mean");
            return self.report("initialize", Err(err));
        }
        let latents = DVector::from_element(n, self.initial_latent_mean);
        let result = Gaussian::new(
            self.process.join_state(&pose_mean, &latents),
            Covariance::BlockDiagonal(vec![
                pose_covariance,
                Covariance::isotropic(n, self.initial_latent_variance),
            ]),
        );
        let belief = self.report("initialize", result)?;
        self.install(belief);
        Ok(())
    }

    /// Replace the whole augmented belief
    pub fn set_belief(&mut self, belief: Gaussian) -> Result<(), FilterError> {
        if belief.dimension() != self.process.state_dimension() {
            let err = FilterError::dimension_mismatch(
                self.process.state_dimension(),
                belief.dimension(),
                "augmented belief",
            );
            return self.report("set_belief", Err(err));
        }
        self.install(belief);
        Ok(())
    }

    fn install(&mut self, belief: Gaussian) {
        self.reporter.on_initialize(&belief);
        self.belief = Some(belief);
        self.last_frame = None;
    }

    fn report<T>(
        &mut self,
        operation: &str,
        result: Result<T, FilterError>,
    ) -> Result<T, FilterError> {
        if let Err(e) = &result {
            log::debug!("{} rejected: {}", operation, e);
            self.reporter.on_failure(operation, e);
        }
        result
    }

    /// Current lifecycle state
    pub fn status(&self) -> FilterStatus {
        match self.belief {
            Some(_) => FilterStatus::Ready,
            None => FilterStatus::Uninitialized,
        }
    }

    /// Marginal belief over the pose
    pub fn pose_belief(&self) -> Result<Gaussian, FilterError> {
        let belief = self.belief.as_ref().ok_or(FilterError::NotReady)?;
        belief.marginal(0, self.process.pose_dimension())
    }

    /// `σ(b)` at the latent means, one per pixel
    pub fn occlusion_probabilities(&self) -> Result<DVector<f64>, FilterError> {
        let belief = self.belief.as_ref().ok_or(FilterError::NotReady)?;
        let p = self.process.pose_dimension();
        Ok(belief
            .mean()
            .rows(p, self.process.pixel_count())
            .map(sigmoid))
    }

    /// Frame likelihood computed by the last successful update
    pub fn last_frame_likelihood(&self) -> Option<FrameLikelihood> {
        self.last_frame
    }

    /// Camera the filter renders with
    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Process model over the augmented state
    pub fn process_model(&self) -> &AugmentedProcessModel<P> {
        &self.process
    }

    /// Image-level observation model
    pub fn observation_model(&self) -> &DepthObservationModel {
        &self.observation
    }

    /// Get a reference to the renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Get a reference to the reporter.
    pub fn reporter(&self) -> &Rep {
        &self.reporter
    }

    /// Get a mutable reference to the reporter.
    pub fn reporter_mut(&mut self) -> &mut Rep {
        &mut self.reporter
    }
}

impl<P: ProcessModel, R: Renderer, Rep: CycleReporter> Filter for RobustDepthFilter<P, R, Rep> {
    type Belief = Gaussian;
    type Control = DVector<f64>;
    type Observation = [f64];

    fn predict(
        &mut self,
        delta_time: f64,
        control: Option<&DVector<f64>>,
    ) -> Result<(), FilterError> {
        let result = match &self.belief {
            None => Err(FilterError::NotReady),
            Some(belief) => self
                .process
                .propagate(delta_time, belief, control, &self.params),
        };
        let predicted = self.report("predict", result)?;

        log::trace!("Predicted {:.4}s ahead", delta_time);
        self.reporter.on_prediction(delta_time, &predicted);
        self.belief = Some(predicted);
        Ok(())
    }

    fn update(&mut self, observation: &[f64]) -> Result<(), FilterError> {
        // STEP 1: validate before touching the renderer
        let checked = match &self.belief {
            None => Err(FilterError::NotReady),
            Some(_) => self.observation.check_observation(observation),
        };
        self.report("update", checked)?;

        // STEP 2: render, update latents, correct the pose
        let result = match &self.belief {
            None => Err(FilterError::NotReady),
            Some(belief) => robust_update(
                belief,
                self.process.pose_dimension(),
                &self.renderer,
                &self.camera,
                &self.observation,
                observation,
                &self.params,
            ),
        };
        let outcome = self.report("update", result)?;

        // STEP 3: swap in the posterior
        let occlusion = outcome
            .belief
            .mean()
            .rows(self.process.pose_dimension(), self.process.pixel_count())
            .map(sigmoid);
        let summary = UpdateSummary {
            frame: outcome.frame,
            latent_pixels: outcome.latent_pixels,
            pose_pixels: outcome.pose_pixels,
            mean_occlusion_probability: if occlusion.is_empty() {
                0.0
            } else {
                occlusion.mean()
            },
        };
        log::debug!(
            "Update: log-likelihood {:.3}, {}/{} latents, {} pose pixels",
            summary.frame.log_likelihood,
            summary.latent_pixels,
            self.process.pixel_count(),
            summary.pose_pixels
        );

        self.reporter.on_update(&summary, &outcome.belief);
        self.last_frame = Some(outcome.frame);
        self.belief = Some(outcome.belief);
        Ok(())
    }

    fn belief(&self) -> Result<&Gaussian, FilterError> {
        self.belief.as_ref().ok_or(FilterError::NotReady)
    }

    fn reset(&mut self) {
        self.belief = None;
        self.last_frame = None;
        self.reporter.on_reset();
    }

    fn x_dim(&self) -> usize {
        self.process.state_dimension()
    }

    fn z_dim(&self) -> usize {
        self.observation.observation_dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::process::DampedWienerProcess;
    use crate::render::DepthImage;
    use crate::reporter::DebugReporter;

    /// Fronto-parallel wall at depth `pose[0]`
    struct Wall;

    impl Renderer for Wall {
        fn render(&self, pose: &DVector<f64>, camera: &CameraModel) -> Result<DepthImage, FilterError> {
            Ok(DepthImage::filled(camera.width, camera.height, pose[0]))
        }
    }

    fn config() -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.camera = CameraModel::new(4, 2, 4.0, 4.0, 1.5, 0.5);
        config
    }

    fn filter() -> RobustDepthFilter<DampedWienerProcess, Wall> {
        let pose = DampedWienerProcess::brownian(1, 0.1).unwrap();
        RobustDepthFilter::new(pose, Wall, &config()).unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut f = filter();
        assert_eq!(f.status(), FilterStatus::Uninitialized);
        assert_eq!(f.belief().unwrap_err(), FilterError::NotReady);
        assert_eq!(f.x_dim(), 9);
        assert_eq!(f.z_dim(), 8);

        f.initialize(DVector::from_element(1, 1.0), Covariance::isotropic(1, 0.01))
            .unwrap();
        assert_eq!(f.status(), FilterStatus::Ready);
        let probs = f.occlusion_probabilities().unwrap();
        assert!(probs.iter().all(|p| (p - 0.1).abs() < 1e-12));

        f.reset();
        assert_eq!(f.status(), FilterStatus::Uninitialized);
        assert!(f.pose_belief().is_err());
    }

    #[test]
    fn test_not_ready() {
        let mut f = filter();
        assert_eq!(f.predict(0.1, None).unwrap_err(), FilterError::NotReady);
        assert_eq!(f.update(&[1.0; 8]).unwrap_err(), FilterError::NotReady);
    }

    #[test]
    fn test_update_moves_pose_towards_wall() {
        let mut f = filter();
        f.initialize(DVector::from_element(1, 1.0), Covariance::isotropic(1, 0.01))
            .unwrap();
        f.predict(0.1, None).unwrap();
        let prior_var = f.pose_belief().unwrap().covariance().to_dense()[(0, 0)];
        f.update(&[1.05; 8]).unwrap();
        let pose = f.pose_belief().unwrap();
        assert!(pose.mean()[0] > 1.0 && pose.mean()[0] <= 1.05);
        assert!(pose.covariance().to_dense()[(0, 0)] < prior_var);
        let frame = f.last_frame_likelihood().unwrap();
        assert_eq!(frame.valid_pixels, 8);
    }

    #[test]
    fn test_dimension_mismatch_keeps_belief() {
        let mut f = filter().with_reporter(DebugReporter::new());
        f.initialize(DVector::from_element(1, 1.0), Covariance::isotropic(1, 0.01))
            .unwrap();
        let before = f.belief().unwrap().clone();
        let err = f.update(&[1.0; 5]).unwrap_err();
        assert!(matches!(err, FilterError::DimensionMismatch { expected: 8, actual: 5, .. }));
        assert_eq!(f.belief().unwrap(), &before);
        assert_eq!(f.reporter().failure_events().len(), 1);
        assert_eq!(f.reporter().initialization_events().len(), 1);
    }

    #[test]
    fn test_set_belief_checks_dimension() {
        let mut f = filter();
        assert!(f.set_belief(Gaussian::standard(3)).is_err());
        assert_eq!(f.status(), FilterStatus::Uninitialized);
        f.set_belief(Gaussian::standard(9)).unwrap();
        assert_eq!(f.status(), FilterStatus::Ready);
    }

    #[test]
    fn test_filter_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<RobustDepthFilter<DampedWienerProcess, Box<dyn Renderer + Send>, DebugReporter>>();
        assert_send::<RobustDepthFilter<DynProcessModel, Box<dyn Renderer + Send>>>();
    }
}
