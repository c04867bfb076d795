//! Process and observation models
//!
//! - [`process`] - the [`ProcessModel`] trait and pose dynamics
//! - [`occlusion`] - per-pixel occlusion latent dynamics
//! - [`augmented`] - pose and latents combined into one state
//! - [`observation`] - robust per-pixel depth likelihood

pub mod augmented;
pub mod observation;
pub mod occlusion;
pub mod process;

pub use augmented::AugmentedProcessModel;
pub use observation::{
    logit, sigmoid, DepthObservationModel, FrameLikelihood, RobustPixelModel,
};
pub use occlusion::OcclusionProcessModel;
pub use process::{
    DampedWienerProcess, DynProcessModel, IntegratedDampedWienerProcess, ProcessModel,
};
