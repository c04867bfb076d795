//! Core filter trait

use super::errors::FilterError;

/// Recursive Bayesian filter driven by `predict` / `update` calls
///
/// Every method that can fail leaves the belief exactly as it was before the
/// call.
pub trait Filter {
    /// Belief representation
    type Belief;

    /// Control input accepted by `predict`
    type Control;

    /// One frame of sensor data
    type Observation: ?Sized;

    /// Propagate the belief forward by `delta_time`
    ///
    /// `None` behaves like an all-zero control.
    fn predict(
        &mut self,
        delta_time: f64,
        control: Option<&Self::Control>,
    ) -> Result<(), FilterError>;

    /// Fold one observation into the belief
    fn update(&mut self, observation: &Self::Observation) -> Result<(), FilterError>;

    /// Current belief; [`FilterError::NotReady`] before initialization
    fn belief(&self) -> Result<&Self::Belief, FilterError>;

    /// Drop the belief and return to the uninitialized state
    fn reset(&mut self);

    /// Get state dimension
    fn x_dim(&self) -> usize;

    /// Get measurement dimension
    fn z_dim(&self) -> usize;
}
