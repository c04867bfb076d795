//! Stationary process models
//!
//! A process model maps `(Δt, state, control)` to the Gaussian distribution of
//! the next state. Models are stationary: the conditional depends on the
//! elapsed time only, never on absolute time.

use nalgebra::{DMatrix, DVector};

use crate::components::prediction::unscented_propagate;
use crate::components::sigma_points::UnscentedParams;
use crate::distribution::{Covariance, Gaussian};
use crate::filter::errors::FilterError;

/// Below this value of `γ·Δt` the damping is treated as zero
const DAMPING_EPSILON: f64 = 1e-4;

/// State transition model
pub trait ProcessModel {
    /// Dimension of the state
    fn state_dimension(&self) -> usize;

    /// Dimension of the control input
    fn control_size(&self) -> usize;

    /// Dimension of the standard-normal noise driving the transition
    fn noise_dimension(&self) -> usize;

    /// Conditional distribution of the next state for an explicit control
    ///
    /// # Errors
    /// - [`FilterError::DimensionMismatch`] for a wrongly sized state or control
    /// - [`FilterError::Configuration`] for a negative or non-finite `delta_time`
    fn conditionals_with_control(
        &self,
        delta_time: f64,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Gaussian, FilterError>;

    /// Conditional distribution of the next state
    ///
    /// `None` behaves exactly like an all-zero control of size
    /// [`control_size`](ProcessModel::control_size).
    fn conditionals(
        &self,
        delta_time: f64,
        state: &DVector<f64>,
        control: Option<&DVector<f64>>,
    ) -> Result<Gaussian, FilterError> {
        match control {
            Some(u) => self.conditionals_with_control(delta_time, state, u),
            None => self.conditionals_with_control(
                delta_time,
                state,
                &DVector::zeros(self.control_size()),
            ),
        }
    }

    /// Push a Gaussian belief through the transition
    ///
    /// The default uses the unscented transform of
    /// [`conditionals`](ProcessModel::conditionals).
    fn propagate(
        &self,
        delta_time: f64,
        belief: &Gaussian,
        control: Option<&DVector<f64>>,
        params: &UnscentedParams,
    ) -> Result<Gaussian, FilterError> {
        unscented_propagate(self, delta_time, belief, control, params)
    }
}

/// Pose model chosen at runtime, e.g. from a [`TrackerConfig`](crate::config::TrackerConfig)
pub type DynProcessModel = Box<dyn ProcessModel + Send + Sync>;

impl<P: ProcessModel + ?Sized> ProcessModel for Box<P> {
    fn state_dimension(&self) -> usize {
        (**self).state_dimension()
    }

    fn control_size(&self) -> usize {
        (**self).control_size()
    }

    fn noise_dimension(&self) -> usize {
        (**self).noise_dimension()
    }

    fn conditionals_with_control(
        &self,
        delta_time: f64,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Gaussian, FilterError> {
        (**self).conditionals_with_control(delta_time, state, control)
    }

    fn propagate(
        &self,
        delta_time: f64,
        belief: &Gaussian,
        control: Option<&DVector<f64>>,
        params: &UnscentedParams,
    ) -> Result<Gaussian, FilterError> {
        (**self).propagate(delta_time, belief, control, params)
    }
}

/// Check the common preconditions of a transition
pub fn check_transition_inputs<P: ProcessModel + ?Sized>(
    model: &P,
    delta_time: f64,
    state: &DVector<f64>,
    control: &DVector<f64>,
) -> Result<(), FilterError> {
    if !delta_time.is_finite() || delta_time < 0.0 {
        return Err(FilterError::configuration(format!(
            "delta_time must be finite and non-negative, got {}",
            delta_time
        )));
    }
    if state.len() != model.state_dimension() {
        return Err(FilterError::dimension_mismatch(
            model.state_dimension(),
            state.len(),
            "state vector",
        ));
    }
    if control.len() != model.control_size() {
        return Err(FilterError::dimension_mismatch(
            model.control_size(),
            control.len(),
            "control vector",
        ));
    }
    Ok(())
}

/// Coefficients of a damped Wiener process over `Δt`
///
/// Returns `(e^{-γΔt}, (1 - e^{-γΔt})/γ, (1 - e^{-2γΔt})/(2γ))`, i.e. the
/// state decay, the control gain and the unit-diffusion variance.
pub(crate) fn damped_coefficients(damping: f64, delta_time: f64) -> (f64, f64, f64) {
    if damping * delta_time < DAMPING_EPSILON {
        return (1.0, delta_time, delta_time);
    }
    let decay = (-damping * delta_time).exp();
    let gain = -(-damping * delta_time).exp_m1() / damping;
    let variance = -(-2.0 * damping * delta_time).exp_m1() / (2.0 * damping);
    (decay, gain, variance)
}

/// Damped Wiener process (Ornstein–Uhlenbeck around zero, driven by control)
///
/// `x' = e^{-γΔt} x + (1 - e^{-γΔt})/γ · u + w`, with independent noise of
/// variance `σ²(1 - e^{-2γΔt})/(2γ)` per dimension. With `γ = 0` this is
/// Brownian motion with drift: `x' = x + Δt·u`, variance `σ²Δt`.
#[derive(Debug, Clone, PartialEq)]
pub struct DampedWienerProcess {
    dimension: usize,
    damping: f64,
    sigma: f64,
}

impl DampedWienerProcess {
    /// Create a damped Wiener process
    pub fn new(dimension: usize, damping: f64, sigma: f64) -> Result<Self, FilterError> {
        if !(damping >= 0.0) || !damping.is_finite() {
            return Err(FilterError::configuration("damping must be non-negative"));
        }
        if !(sigma >= 0.0) || !sigma.is_finite() {
            return Err(FilterError::configuration(
                "diffusion sigma must be non-negative",
            ));
        }
        Ok(Self {
            dimension,
            damping,
            sigma,
        })
    }

    /// Undamped Brownian motion
    pub fn brownian(dimension: usize, sigma: f64) -> Result<Self, FilterError> {
        Self::new(dimension, 0.0, sigma)
    }

    /// Damping rate γ
    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Diffusion σ
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl ProcessModel for DampedWienerProcess {
    fn state_dimension(&self) -> usize {
        self.dimension
    }

    fn control_size(&self) -> usize {
        self.dimension
    }

    fn noise_dimension(&self) -> usize {
        self.dimension
    }

    fn conditionals_with_control(
        &self,
        delta_time: f64,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Gaussian, FilterError> {
        check_transition_inputs(self, delta_time, state, control)?;
        let (decay, gain, unit_variance) = damped_coefficients(self.damping, delta_time);

        let mean = state * decay + control * gain;
        let variance = self.sigma * self.sigma * unit_variance;
        Gaussian::new(mean, Covariance::isotropic(self.dimension, variance))
    }
}

/// Integrated damped Wiener process
///
/// State layout `[p₁..p_k, v₁..v_k]`. Each velocity follows a damped Wiener
/// process driven by the acceleration control; each position integrates its
/// velocity. The covariance is the exact discretization of the continuous
/// model, coupling each position with its own velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedDampedWienerProcess {
    degrees_of_freedom: usize,
    damping: f64,
    sigma: f64,
}

impl IntegratedDampedWienerProcess {
    /// Create an integrated damped Wiener process over `degrees_of_freedom` positions
    pub fn new(degrees_of_freedom: usize, damping: f64, sigma: f64) -> Result<Self, FilterError> {
        if !(damping >= 0.0) || !damping.is_finite() {
            return Err(FilterError::configuration("damping must be non-negative"));
        }
        if !(sigma >= 0.0) || !sigma.is_finite() {
            return Err(FilterError::configuration(
                "acceleration sigma must be non-negative",
            ));
        }
        Ok(Self {
            degrees_of_freedom,
            damping,
            sigma,
        })
    }

    /// Number of position coordinates
    pub fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom
    }

    /// Per-DOF `(position gain on velocity, position gain on control, var_p, cov_pv, var_v)`
    fn coefficients(&self, dt: f64) -> (f64, f64, f64, f64, f64) {
        let q = self.sigma * self.sigma;
        let g = self.damping;
        if g * dt < DAMPING_EPSILON {
            let dt2 = dt * dt;
            return (dt, dt2 / 2.0, q * dt2 * dt / 3.0, q * dt2 / 2.0, q * dt);
        }
        let (_, gain, unit_var) = damped_coefficients(g, dt);
        let control_gain = (dt - gain) / g;
        let var_p = q / (g * g) * (dt - 2.0 * gain + unit_var);
        let cov_pv = q / g * (gain - unit_var);
        let var_v = q * unit_var;
        (gain, control_gain, var_p, cov_pv, var_v)
    }
}

impl ProcessModel for IntegratedDampedWienerProcess {
    fn state_dimension(&self) -> usize {
        2 * self.degrees_of_freedom
    }

    fn control_size(&self) -> usize {
        self.degrees_of_freedom
    }

    fn noise_dimension(&self) -> usize {
        2 * self.degrees_of_freedom
    }

    fn conditionals_with_control(
        &self,
        delta_time: f64,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Gaussian, FilterError> {
        check_transition_inputs(self, delta_time, state, control)?;
        let k = self.degrees_of_freedom;
        let (decay, velocity_gain, _) = damped_coefficients(self.damping, delta_time);
        let (pos_vel_gain, pos_ctrl_gain, var_p, cov_pv, var_v) = self.coefficients(delta_time);

        let mut mean = DVector::zeros(2 * k);
        let mut cov = DMatrix::zeros(2 * k, 2 * k);
        for i in 0..k {
            let p = state[i];
            let v = state[k + i];
            let u = control[i];
            mean[i] = p + pos_vel_gain * v + pos_ctrl_gain * u;
            mean[k + i] = decay * v + velocity_gain * u;

            cov[(i, i)] = var_p;
            cov[(i, k + i)] = cov_pv;
            cov[(k + i, i)] = cov_pv;
            cov[(k + i, k + i)] = var_v;
        }

        Gaussian::new(mean, Covariance::Dense(cov))
    }
}
