//! Low-level numerical utilities shared by the models and the filter.

pub mod constants;
pub mod linalg;
