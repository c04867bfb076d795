//! Probability distributions and their capabilities
//!
//! - [`Moments`], [`Mappable`], [`Sampleable`] - capability traits
//! - [`Covariance`] - dense / diagonal / block-diagonal covariance
//! - [`Gaussian`] - the belief and conditional distribution type

pub mod covariance;
pub mod gaussian;
pub mod traits;

pub use covariance::Covariance;
pub use gaussian::Gaussian;
pub use traits::{Mappable, Moments, Sampleable};
