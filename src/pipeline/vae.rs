//! VAE decoding from latent space back to pixels.

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::ImageTensor;

/// Latent tensor type (1, 4, H/8, W/8).
pub type LatentTensor = Array4<f32>;

/// Number of latent channels.
pub const LATENT_CHANNELS: usize = 4;

/// Spatial downsampling factor between pixels and latents.
pub const VAE_SCALE_FACTOR: u32 = 8;

/// VAE scaling factor (from Stable Diffusion).
const VAE_SCALE: f32 = 0.18215;

/// Decode latents back to image space using the VAE decoder.
///
/// # Arguments
///
/// * `decoder` - ONNX session for the VAE decoder
/// * `latent` - Latent tensor in NCHW format (1, 4, H/8, W/8)
///
/// # Returns
///
/// Image tensor in NCHW format with values in [-1, 1].
///
/// # Errors
///
/// Returns an error if inference fails.
pub fn decode(decoder: &mut Session, latent: &LatentTensor) -> Result<ImageTensor> {
    // Unscale latents
    let unscaled = latent / VAE_SCALE;

    let input_value = Tensor::from_array(unscaled).map_err(|source| Error::Inference { source })?;

    let outputs = decoder
        .run(ort::inputs![input_value])
        .map_err(|source| Error::Inference { source })?;

    let output = outputs
        .values()
        .next()
        .ok_or_else(|| Error::ShapeMismatch {
            expected: "sample output".to_string(),
            actual: "no output".to_string(),
        })?;

    extract_array4(&output)
}

/// Extract a 4D array from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub(super) fn extract_array4(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    if dims.len() != 4 {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}

/// Latent height and width for an image size, rounding each pixel
/// dimension up to a multiple of [`VAE_SCALE_FACTOR`].
#[must_use]
pub fn latent_dims(width: u32, height: u32) -> (usize, usize) {
    let to_latent = |pixels: u32| pixels.max(1).div_ceil(VAE_SCALE_FACTOR) as usize;
    (to_latent(height), to_latent(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latent_dims() {
        assert_eq!(latent_dims(512, 512), (64, 64));
        assert_eq!(latent_dims(256, 128), (16, 32));
        assert_eq!(latent_dims(100, 100), (13, 13));
        assert_eq!(latent_dims(0, 1), (1, 1));
    }
}
