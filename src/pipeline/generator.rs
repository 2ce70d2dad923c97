//! The seam between icon orchestration and the text-to-image backend.

use image::DynamicImage;

use crate::error::Result;

/// Parameters for a single text-to-image call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub num_steps: u32,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
    /// Random seed for reproducibility. None for random.
    pub seed: Option<u64>,
}

/// A text-to-image backend.
///
/// Implementations may return an image of a different resolution than the
/// one requested; callers resize as needed.
pub trait Generator {
    /// Produce one image for the request.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn generate(&mut self, request: &GenerationRequest) -> Result<DynamicImage>;

    /// Whether the backend is able to serve requests at all.
    fn is_available(&self) -> bool {
        true
    }
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&mut self, request: &GenerationRequest) -> Result<DynamicImage> {
        (**self).generate(request)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}
