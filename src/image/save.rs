//! Image saving utilities.

use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

/// Save a finished icon to disk.
///
/// A `.jpg`/`.jpeg` extension writes JPEG with the given quality, dropping
/// the alpha channel. Every other path, including one without an extension,
/// is written as PNG.
///
/// # Errors
///
/// Returns an error if the image cannot be encoded or written.
pub fn save_icon<P: AsRef<Path>>(icon: &DynamicImage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            if icon.color().has_alpha() {
                tracing::warn!("JPEG cannot store transparency, rounded corners will be lost");
            }
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            DynamicImage::ImageRgb8(icon.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            icon
                .save_with_format(path, ImageFormat::Png)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
    }

    tracing::info!("Saved icon to {}", path.display());
    Ok(())
}
