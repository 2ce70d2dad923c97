//! # iconforge
//!
//! Generate square chatbot icons with Stable Diffusion 1.5 and round their
//! corners with an alpha mask.
//!
//! The crate is split into the option tables users pick from
//! ([`options`]), the corner-rounding post-processor ([`image`]), and the
//! orchestration around a text-to-image [`Generator`] ([`pipeline`]).
//!
//! ## Example
//!
//! ```no_run
//! use iconforge::{IconGenerator, ModelCache, StableDiffusion};
//!
//! # fn main() -> iconforge::Result<()> {
//! let cache = ModelCache::new()?;
//! let mut icons = IconGenerator::from_load(StableDiffusion::load(&cache));
//!
//! let icon = icons.generate_icon("Cartoon Mascot", "Medium (256x256)", "Slight Rounding")?;
//! iconforge::image::save_icon(&icon, "icon.png", 95)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod options;
pub mod pipeline;

pub use error::{Error, Result};
pub use model::ModelCache;
pub use options::{CornerStyle, IconSize, PromptTemplate};
pub use pipeline::{
    GenerationConfig, GenerationRequest, Generator, IconGenerator, IconRequest, StableDiffusion,
};
