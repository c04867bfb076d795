//! Filter implementation
//!
//! - [`Filter`] - predict/update trait
//! - [`RobustDepthFilter`] - pose filter with per-pixel occlusion latents
//! - [`FilterError`] - errors shared by the whole crate

pub mod errors;
pub mod tracker;
pub mod traits;

pub use errors::FilterError;
pub use tracker::{FilterStatus, RobustDepthFilter, UpdateSummary};
pub use traits::Filter;
