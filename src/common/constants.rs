//! Numerical constants used throughout the filter
//!
//! These are kept separate from [`TrackerConfig`](crate::config::TrackerConfig),
//! which carries the user-tunable model parameters.

/// Relative tolerance for treating a matrix as symmetric
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Relative tolerance for negative eigenvalues in a semi-definite covariance
///
/// Eigenvalues above `-PSD_TOLERANCE * max|Σ|` are clamped to zero when a
/// square root is taken.
pub const PSD_TOLERANCE: f64 = 1e-9;

/// Lower bound on a pixel's inlier responsibility
///
/// The effective measurement variance of a pixel is `σ² / w`; flooring `w`
/// keeps the information contribution of likely outliers finite and tiny.
pub const MIN_INLIER_RESPONSIBILITY: f64 = 1e-6;

/// Bound on the magnitude of an occlusion latent
///
/// `σ(±40)` is 1 or 0 to double precision, so larger values carry no information.
pub const MAX_LATENT_MAGNITUDE: f64 = 40.0;

/// Nodes of the 5-point Gauss–Hermite rule for a standard normal weight
///
/// Roots of the probabilists' Hermite polynomial `He₅(x) = x⁵ - 10x³ + 15x`.
pub const GAUSS_HERMITE_NODES: [f64; 5] = [
    -2.856_970_013_872_805,
    -1.355_626_179_974_266,
    0.0,
    1.355_626_179_974_266,
    2.856_970_013_872_805,
];

/// Weights of the 5-point Gauss–Hermite rule (sum to one)
pub const GAUSS_HERMITE_WEIGHTS: [f64; 5] = [
    0.011_257_411_327_721,
    0.222_075_922_005_613,
    0.533_333_333_333_333,
    0.222_075_922_005_613,
    0.011_257_411_327_721,
];
