//! Rounded-corner alpha masking.

use image::{DynamicImage, GenericImageView, GrayImage, Luma, RgbaImage};

use crate::error::{Error, Result};

/// Clamp a requested radius so the rounded rectangle stays valid.
///
/// The radius never exceeds half of the shorter image edge.
#[must_use]
pub const fn effective_radius(width: u32, height: u32, radius: u32) -> u32 {
    let limit = if width < height { width } else { height } / 2;
    if radius > limit {
        limit
    } else {
        radius
    }
}

/// Build a single-channel coverage mask for a rounded rectangle spanning the
/// whole `width x height` area.
///
/// 255 is fully inside, 0 fully outside. Pixels crossed by a corner arc get
/// an intermediate value proportional to how far their centre lies inside.
///
/// # Errors
///
/// Returns [`Error::InvalidDimensions`] for a zero-area mask.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rounded_corner_mask(width: u32, height: u32, radius: u32) -> Result<GrayImage> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }

    let mut mask = GrayImage::from_pixel(width, height, Luma([u8::MAX]));

    let r = effective_radius(width, height, radius);
    if r == 0 {
        return Ok(mask);
    }

    let rf = r as f32;
    let (wf, hf) = (width as f32, height as f32);

    // Arc centres in continuous coordinates, paired with the pixel range of
    // their corner square.
    let corners = [
        ((rf, rf), (0, 0)),
        ((wf - rf, rf), (width - r, 0)),
        ((rf, hf - rf), (0, height - r)),
        ((wf - rf, hf - rf), (width - r, height - r)),
    ];

    for ((cx, cy), (x0, y0)) in corners {
        for y in y0..y0 + r {
            for x in x0..x0 + r {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let distance = dx.hypot(dy);
                let coverage = (rf - distance + 0.5).clamp(0.0, 1.0);
                mask.put_pixel(x, y, Luma([(coverage * 255.0).round() as u8]));
            }
        }
    }

    Ok(mask)
}

/// Round the corners of an image by masking its alpha channel.
///
/// A radius of zero returns the image unchanged, without adding an alpha
/// channel. Any other radius yields an RGBA image whose alpha is the
/// intersection of the source alpha and the rounded-rectangle mask. Radii
/// above half the shorter edge are clamped.
///
/// # Errors
///
/// Returns [`Error::InvalidDimensions`] if the image has zero area.
pub fn round_corners(image: &DynamicImage, radius: u32) -> Result<DynamicImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }

    if radius == 0 {
        return Ok(image.clone());
    }

    let mask = rounded_corner_mask(width, height, radius)?;
    let mut rounded: RgbaImage = image.to_rgba8();

    for (pixel, coverage) in rounded.pixels_mut().zip(mask.pixels()) {
        let alpha = u16::from(pixel[3]) * u16::from(coverage[0]) / 255;
        // alpha <= 255 since both factors are
        pixel[3] = u8::try_from(alpha).unwrap_or(u8::MAX);
    }

    Ok(DynamicImage::ImageRgba8(rounded))
}
