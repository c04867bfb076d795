//! Augmented state dynamics: pose followed by per-pixel occlusion latents

use nalgebra::DVector;

use crate::components::sigma_points::UnscentedParams;
use crate::distribution::{Covariance, Gaussian, Moments};
use crate::filter::errors::FilterError;

use super::occlusion::OcclusionProcessModel;
use super::process::{check_transition_inputs, ProcessModel};

/// Process model over `[pose; b₁..bₙ]`
///
/// The pose evolves under `P` and receives the control input; the latents
/// evolve independently under [`OcclusionProcessModel`].
#[derive(Debug, Clone)]
pub struct AugmentedProcessModel<P> {
    pose: P,
    occlusion: OcclusionProcessModel,
}

impl<P: ProcessModel> AugmentedProcessModel<P> {
    /// Combine a pose model with latent dynamics over every pixel
    pub fn new(pose: P, occlusion: OcclusionProcessModel) -> Self {
        Self { pose, occlusion }
    }

    /// Pose process model
    pub fn pose_model(&self) -> &P {
        &self.pose
    }

    /// Occlusion latent dynamics
    pub fn occlusion_model(&self) -> &OcclusionProcessModel {
        &self.occlusion
    }

    /// Dimension of the pose block
    pub fn pose_dimension(&self) -> usize {
        self.pose.state_dimension()
    }

    /// Number of occlusion latents
    pub fn pixel_count(&self) -> usize {
        self.occlusion.pixel_count()
    }

    /// Split an augmented vector into its pose and latent parts
    pub fn split_state(
        &self,
        state: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>), FilterError> {
        if state.len() != self.state_dimension() {
            return Err(FilterError::dimension_mismatch(
                self.state_dimension(),
                state.len(),
                "augmented state",
            ));
        }
        let p = self.pose_dimension();
        Ok((
            state.rows(0, p).into_owned(),
            state.rows(p, self.pixel_count()).into_owned(),
        ))
    }

    /// Join a pose and latents into an augmented vector
    pub fn join_state(&self, pose: &DVector<f64>, latents: &DVector<f64>) -> DVector<f64> {
        let mut state = DVector::zeros(pose.len() + latents.len());
        state.rows_mut(0, pose.len()).copy_from(pose);
        state.rows_mut(pose.len(), latents.len()).copy_from(latents);
        state
    }
}

impl<P: ProcessModel> ProcessModel for AugmentedProcessModel<P> {
    fn state_dimension(&self) -> usize {
        self.pose.state_dimension() + self.occlusion.pixel_count()
    }

    fn control_size(&self) -> usize {
        self.pose.control_size()
    }

    fn noise_dimension(&self) -> usize {
        self.pose.noise_dimension() + self.occlusion.noise_dimension()
    }

    fn conditionals_with_control(
        &self,
        delta_time: f64,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Gaussian, FilterError> {
        check_transition_inputs(self, delta_time, state, control)?;
        let (pose, latents) = self.split_state(state)?;

        let pose_next = self
            .pose
            .conditionals_with_control(delta_time, &pose, control)?;
        let latents_next = self.occlusion.conditionals(delta_time, &latents, None)?;

        Gaussian::new(
            self.join_state(pose_next.mean(), latents_next.mean()),
            Covariance::BlockDiagonal(vec![
                pose_next.covariance().clone(),
                latents_next.covariance().clone(),
            ]),
        )
    }

    /// Factorized propagation
    ///
    /// The pose marginal goes through the pose model's own propagation, each
    /// latent through its exact scalar moments. Correlations between the pose
    /// and the latents are not carried over.
    fn propagate(
        &self,
        delta_time: f64,
        belief: &Gaussian,
        control: Option<&DVector<f64>>,
        params: &UnscentedParams,
    ) -> Result<Gaussian, FilterError> {
        if belief.dimension() != self.state_dimension() {
            return Err(FilterError::dimension_mismatch(
                self.state_dimension(),
                belief.dimension(),
                "belief dimension for prediction",
            ));
        }
        let p = self.pose_dimension();
        let n = self.pixel_count();

        let pose_belief = belief.marginal(0, p)?;
        let pose_next = self
            .pose
            .propagate(delta_time, &pose_belief, control, params)?;

        let latent_means = belief.mean().rows(p, n).into_owned();
        let latent_variances = belief.covariance().diagonal().rows(p, n).into_owned();
        let (means, variances) =
            self.occlusion
                .propagate_moments(delta_time, &latent_means, &latent_variances)?;

        Gaussian::new(
            self.join_state(pose_next.mean(), &means),
            Covariance::BlockDiagonal(vec![
                pose_next.covariance().clone(),
                Covariance::Diagonal(variances),
            ]),
        )
    }
}
