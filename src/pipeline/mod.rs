//! Text-to-image generation and icon orchestration.

mod diffusion;
mod generator;
mod icon;
mod scheduler;
mod text;
mod vae;

pub use diffusion::StableDiffusion;
pub use generator::{GenerationRequest, Generator};
pub use icon::{GenerationConfig, IconGenerator, IconRequest, ModelState};
pub use scheduler::{DdimScheduler, MAX_INFERENCE_STEPS};
