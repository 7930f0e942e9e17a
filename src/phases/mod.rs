//! One step function per engine phase.
//!
//! Each step performs the phase's collaborator work and applies exactly one
//! command to the state machine. Collaborator failures become a `StepFailed`
//! command with a readable message; only state machine violations are
//! returned as errors.

pub mod generating;
pub mod imaging;
pub mod publishing;
pub mod revising;

pub use generating::run_generation_phase;
pub use imaging::run_image_phase;
pub use publishing::run_publish_phase;
pub use revising::run_revision_phase;

use crate::agents::Publisher;
use crate::image_chain::ImageProviderChain;
use crate::strategy::ContentGenerationStrategy;

/// Collaborators available to the phase steps for one engine run.
pub struct PhaseContext<'a> {
    pub strategy: &'a dyn ContentGenerationStrategy,
    pub images: &'a ImageProviderChain,
    pub publisher: &'a dyn Publisher,
}
