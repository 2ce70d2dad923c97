//! Conversion from decoder tensors to bitmaps.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{Error, Result};

use super::{ImageTensor, RGB_CHANNELS};

/// Convert a normalized NCHW tensor to an RGB image.
///
/// Only the first image of the batch is converted. Values are mapped from
/// [-1, 1] to [0, 255] with clamping.
///
/// # Errors
///
/// Returns an error if the tensor is empty or does not have 3 channels.
#[allow(clippy::cast_possible_truncation)]
pub fn tensor_to_image(tensor: &ImageTensor) -> Result<RgbImage> {
    let (batch, channels, height, width) = tensor.dim();

    if batch == 0 || channels != RGB_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("(1, {RGB_CHANNELS}, H, W)"),
            actual: format!("{:?}", tensor.shape()),
        });
    }

    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(Error::InvalidDimensions {
                width: u32::try_from(width).unwrap_or(u32::MAX),
                height: u32::try_from(height).unwrap_or(u32::MAX),
            })
        }
    };

    let img = ImageBuffer::from_fn(w, h, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            denormalize(tensor[[0, 0, y, x]]),
            denormalize(tensor[[0, 1, y, x]]),
            denormalize(tensor[[0, 2, y, x]]),
        ])
    });

    Ok(img)
}

/// Denormalize a value from [-1, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    let scaled = (value + 1.0) * 127.5;
    scaled.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_denormalize() {
        assert_eq!(denormalize(-1.0), 0);
        assert_eq!(denormalize(0.0), 128);
        assert_eq!(denormalize(1.0), 255);
    }

    #[test]
    fn test_denormalize_clamp() {
        assert_eq!(denormalize(-2.0), 0);
        assert_eq!(denormalize(2.0), 255);
        assert_eq!(denormalize(f32::NAN), 0);
    }

    #[test]
    fn test_tensor_to_image_layout() {
        let mut tensor = Array4::<f32>::from_elem((1, 3, 2, 3), -1.0);
        // red at (x=2, y=1)
        tensor[[0, 0, 1, 2]] = 1.0;

        let img = tensor_to_image(&tensor).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_tensor_channel_mismatch() {
        let tensor = Array4::<f32>::zeros((1, 4, 8, 8));
        assert!(matches!(
            tensor_to_image(&tensor),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
