//! Core algorithmic components
//!
//! Shared building blocks of the filter:
//!
//! - [`sigma_points`] - Scaled unscented transform
//! - [`prediction`] - Belief prediction (Chapman-Kolmogorov)
//! - [`update`] - Robust measurement update of pose and occlusion latents

pub mod prediction;
pub mod sigma_points;
pub mod update;

pub use prediction::unscented_propagate;
pub use sigma_points::{SigmaPoints, UnscentedParams};
pub use update::{robust_update, PixelPrediction, UpdateOutcome};
