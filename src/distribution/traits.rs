//! Distribution capability traits
//!
//! A distribution advertises what it can do through small, independent
//! capabilities rather than a class hierarchy:
//!
//! - [`Moments`] - exposes mean and covariance
//! - [`Mappable`] - deterministic map from standard-normal noise to the variable
//! - [`Sampleable`] - draws random instances
//!
//! Every [`Mappable`] is [`Sampleable`]: sampling draws `randoms_size()`
//! independent standard normals and maps them.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::filter::errors::FilterError;

use super::covariance::Covariance;

/// First and second moments of a distribution over `ℝⁿ`
pub trait Moments {
    /// Dimension of the variable
    fn dimension(&self) -> usize;

    /// Mean vector
    fn mean(&self) -> &DVector<f64>;

    /// Covariance matrix
    fn covariance(&self) -> &Covariance;
}

/// Deterministic map from a standard-normal noise vector to the variable space
///
/// Calling [`map_standard_normal`](Mappable::map_standard_normal) twice with the
/// same noise must return the same value. Sigma-point propagation relies on it.
pub trait Mappable {
    /// Type of the random variable
    type Variable;

    /// Dimension of the noise vector consumed by the map
    fn randoms_size(&self) -> usize;

    /// Map a standard-normal noise vector into the variable space
    ///
    /// # Errors
    /// [`FilterError::DimensionMismatch`] when `randoms.len() != randoms_size()`
    fn map_standard_normal(&self, randoms: &DVector<f64>) -> Result<Self::Variable, FilterError>;
}

/// Draws independent random instances of a variable
pub trait Sampleable {
    /// Type of the random variable
    type Variable;

    /// Draw one instance
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Self::Variable, FilterError>;
}

impl<M: Mappable> Sampleable for M {
    type Variable = M::Variable;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Self::Variable, FilterError> {
        let randoms = DVector::from_fn(self.randoms_size(), |_, _| -> f64 {
            StandardNormal.sample(&mut *rng)
        });
        self.map_standard_normal(&randoms)
    }
}
