//! Observability for filter cycles.
//!
//! This module provides the [`CycleReporter`] trait for debugging and research
//! instrumentation. Reporters receive callbacks at key points of the
//! predict/update cycle without polluting the core algorithm logic.
//!
//! The default [`NoOpReporter`] has empty callbacks that compile away.
//!
//! # Example
//!
//! ```
//! use robust_depth_filters_rs::reporter::{CycleReporter, DebugReporter};
//! use robust_depth_filters_rs::distribution::Gaussian;
//!
//! let mut reporter = DebugReporter::new();
//! reporter.on_prediction(0.1, &Gaussian::standard(2));
//! assert_eq!(reporter.prediction_events().len(), 1);
//! ```

use crate::distribution::{Gaussian, Moments};
use crate::filter::errors::FilterError;
use crate::filter::tracker::UpdateSummary;

// ============================================================================
// CycleReporter Trait
// ============================================================================

/// Observability trait for filter cycles.
///
/// All methods have default empty implementations, so you only need to
/// override the events you care about.
///
/// Reporters use `&mut self` for callbacks. A filter that must be `Send`
/// needs a `Send` reporter.
pub trait CycleReporter {
    /// Called after the belief is initialized or replaced wholesale.
    fn on_initialize(&mut self, _belief: &Gaussian) {}

    /// Called after a successful prediction.
    fn on_prediction(&mut self, _delta_time: f64, _belief: &Gaussian) {}

    /// Called after a successful update with the new belief.
    fn on_update(&mut self, _summary: &UpdateSummary, _belief: &Gaussian) {}

    /// Called when an operation fails; the belief is unchanged.
    fn on_failure(&mut self, _operation: &str, _error: &FilterError) {}

    /// Called when the filter returns to the uninitialized state.
    fn on_reset(&mut self) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    /// Create a new no-op reporter.
    pub fn new() -> Self {
        Self
    }
}

impl CycleReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures all events for debugging.
///
/// Beliefs are cloned on every event. Over the augmented state this is one
/// mean and one variance per pixel per event, so keep runs short.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    initializations: Vec<Gaussian>,
    predictions: Vec<(f64, Gaussian)>,
    updates: Vec<(UpdateSummary, Gaussian)>,
    failures: Vec<(String, FilterError)>,
    resets: usize,
}

impl DebugReporter {
    /// Create a new debug reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.initializations.clear();
        self.predictions.clear();
        self.updates.clear();
        self.failures.clear();
        self.resets = 0;
    }

    /// Belief installed by each initialization
    pub fn initialization_events(&self) -> &[Gaussian] {
        &self.initializations
    }

    /// `(delta_time, predicted belief)` per prediction
    pub fn prediction_events(&self) -> &[(f64, Gaussian)] {
        &self.predictions
    }

    /// `(summary, posterior belief)` per update
    pub fn update_events(&self) -> &[(UpdateSummary, Gaussian)] {
        &self.updates
    }

    /// `(operation, error)` per failed call
    pub fn failure_events(&self) -> &[(String, FilterError)] {
        &self.failures
    }

    /// Number of resets
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Total number of captured events across all types.
    pub fn total_events(&self) -> usize {
        self.initializations.len()
            + self.predictions.len()
            + self.updates.len()
            + self.failures.len()
            + self.resets
    }
}

impl CycleReporter for DebugReporter {
    fn on_initialize(&mut self, belief: &Gaussian) {
        self.initializations.push(belief.clone());
    }

    fn on_prediction(&mut self, delta_time: f64, belief: &Gaussian) {
        self.predictions.push((delta_time, belief.clone()));
    }

    fn on_update(&mut self, summary: &UpdateSummary, belief: &Gaussian) {
        self.updates.push((*summary, belief.clone()));
    }

    fn on_failure(&mut self, operation: &str, error: &FilterError) {
        self.failures.push((operation.to_string(), error.clone()));
    }

    fn on_reset(&mut self) {
        self.resets += 1;
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that emits events through the `log` crate.
///
/// - `on_update`, `on_failure`: INFO / WARN
/// - `on_initialize`, `on_prediction`, `on_reset`: DEBUG
/// - per-coordinate pose details (verbose only): TRACE
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    pose_dimension: usize,
    verbose: bool,
}

impl LoggingReporter {
    /// Logging reporter that summarizes the first `pose_dimension` coordinates
    pub fn new(pose_dimension: usize) -> Self {
        Self {
            pose_dimension,
            verbose: false,
        }
    }

    /// Also log every pose coordinate with its variance.
    pub fn verbose(pose_dimension: usize) -> Self {
        Self {
            pose_dimension,
            verbose: true,
        }
    }

    fn log_pose(&self, belief: &Gaussian) {
        if !self.verbose {
            return;
        }
        let variances = belief.covariance().diagonal();
        let mean = belief.mean();
        for i in 0..self.pose_dimension.min(mean.len()) {
            log::trace!("  pose[{}] = {:.6} (var {:.3e})", i, mean[i], variances[i]);
        }
    }
}

impl CycleReporter for LoggingReporter {
    fn on_initialize(&mut self, belief: &Gaussian) {
        log::debug!("Belief initialized: dimension {}", belief.dimension());
        self.log_pose(belief);
    }

    fn on_prediction(&mut self, delta_time: f64, belief: &Gaussian) {
        log::debug!("Prediction complete: dt = {:.4}s", delta_time);
        self.log_pose(belief);
    }

    fn on_update(&mut self, summary: &UpdateSummary, belief: &Gaussian) {
        log::info!(
            "Update complete: log-likelihood {:.3}, {} valid pixels ({} without surface), {} pose pixels, mean occlusion {:.3}",
            summary.frame.log_likelihood,
            summary.frame.valid_pixels,
            summary.frame.no_surface_pixels,
            summary.pose_pixels,
            summary.mean_occlusion_probability
        );
        self.log_pose(belief);
    }

    fn on_failure(&mut self, operation: &str, error: &FilterError) {
        log::warn!("{} failed: {}", operation, error);
    }

    fn on_reset(&mut self) {
        log::debug!("Filter reset");
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards events to two child reporters.
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: CycleReporter, B: CycleReporter> {
    first: A,
    second: B,
}

impl<A: CycleReporter, B: CycleReporter> CompositeReporter<A, B> {
    /// Create a composite forwarding to `first`, then `second`.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Get a reference to the first reporter.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Get a mutable reference to the first reporter.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Get a reference to the second reporter.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Get a mutable reference to the second reporter.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }

    /// Consume and return both reporters.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: CycleReporter, B: CycleReporter> CycleReporter for CompositeReporter<A, B> {
    fn on_initialize(&mut self, belief: &Gaussian) {
        self.first.on_initialize(belief);
        self.second.on_initialize(belief);
    }

    fn on_prediction(&mut self, delta_time: f64, belief: &Gaussian) {
        self.first.on_prediction(delta_time, belief);
        self.second.on_prediction(delta_time, belief);
    }

    fn on_update(&mut self, summary: &UpdateSummary, belief: &Gaussian) {
        self.first.on_update(summary, belief);
        self.second.on_update(summary, belief);
    }

    fn on_failure(&mut self, operation: &str, error: &FilterError) {
        self.first.on_failure(operation, error);
        self.second.on_failure(operation, error);
    }

    fn on_reset(&mut self) {
        self.first.on_reset();
        self.second.on_reset();
    }
}

// ============================================================================
// Tests
// ============================================================================
