//! Bitmap post-processing, conversion and saving utilities.

mod convert;
mod corners;
mod save;

pub use convert::tensor_to_image;
pub use corners::{effective_radius, round_corners, rounded_corner_mask};
pub use save::save_icon;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

/// Image tensor in NCHW format (batch, channels, height, width).
/// Values are normalized to [-1, 1] range, as produced by the VAE decoder.
pub type ImageTensor = Array4<f32>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Resize an image to an exact square, leaving it alone if it already is
/// `edge x edge`.
#[must_use]
pub fn resize_to_edge(image: DynamicImage, edge: u32) -> DynamicImage {
    if image.dimensions() == (edge, edge) {
        return image;
    }

    tracing::debug!(
        "Resizing {}x{} output to {edge}x{edge}",
        image.width(),
        image.height()
    );
    image.resize_exact(edge, edge, FilterType::Lanczos3)
}
