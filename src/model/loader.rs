//! Model downloading and loading utilities.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use ort::session::Session;
use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Files needed by the text-to-image pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// CLIP tokenizer definition.
    Tokenizer,
    /// CLIP text encoder - turns token ids into conditioning embeddings.
    TextEncoder,
    /// `UNet` - predicts noise at each denoising step.
    Unet,
    /// VAE Decoder - decodes latents to images.
    VaeDecoder,
}

impl ModelType {
    /// Every file the pipeline needs, in loading order.
    pub const ALL: [Self; 4] = [Self::Tokenizer, Self::TextEncoder, Self::Unet, Self::VaeDecoder];

    /// Get the filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Tokenizer => "tokenizer.json",
            Self::TextEncoder => "text_encoder.onnx",
            Self::Unet => "unet.onnx",
            Self::VaeDecoder => "vae_decoder.onnx",
        }
    }

    /// Get the download URL for this model type.
    /// ONNX exports of Stable Diffusion 1.5 plus the matching CLIP tokenizer.
    #[must_use]
    pub const fn url(&self) -> &'static str {
        match self {
            Self::Tokenizer => {
                "https://huggingface.co/openai/clip-vit-large-patch14/resolve/main/tokenizer.json"
            }
            Self::TextEncoder => {
                "https://huggingface.co/modularai/stable-diffusion-1.5-onnx/resolve/main/text_encoder/model.onnx"
            }
            Self::Unet => {
                "https://huggingface.co/modularai/stable-diffusion-1.5-onnx/resolve/main/unet/model.onnx"
            }
            Self::VaeDecoder => {
                "https://huggingface.co/modularai/stable-diffusion-1.5-onnx/resolve/main/vae_decoder/model.onnx"
            }
        }
    }

    /// Get the approximate size in bytes for progress indication.
    #[must_use]
    pub const fn approx_size(&self) -> u64 {
        match self {
            Self::Tokenizer => 2_200_000,        // ~2.2 MB
            Self::TextEncoder => 492_000_000,    // ~492 MB
            Self::Unet => 1_300_000,             // ~1.3 MB (graph only, weights are separate)
            Self::VaeDecoder => 100_000_000,     // ~100 MB
        }
    }

    /// Get the external data file URL if this model has one.
    #[must_use]
    pub const fn data_url(&self) -> Option<&'static str> {
        match self {
            Self::Tokenizer | Self::TextEncoder | Self::VaeDecoder => None,
            Self::Unet => Some(
                "https://huggingface.co/modularai/stable-diffusion-1.5-onnx/resolve/main/unet/model.onnx_data",
            ),
        }
    }

    /// Get the data filename for models with external data.
    /// Must match the name referenced inside the ONNX graph.
    #[must_use]
    pub const fn data_filename(&self) -> Option<&'static str> {
        match self {
            Self::Tokenizer | Self::TextEncoder | Self::VaeDecoder => None,
            Self::Unet => Some("model.onnx_data"),
        }
    }

    /// Get the approximate size of the data file in bytes.
    #[must_use]
    pub const fn data_approx_size(&self) -> u64 {
        match self {
            Self::Tokenizer | Self::TextEncoder | Self::VaeDecoder => 0,
            Self::Unet => 3_440_000_000, // ~3.4 GB
        }
    }
}

/// Manages the model cache directory and downloads.
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a model cache in the platform cache directory.
    ///
    /// - Windows: `%LOCALAPPDATA%\iconforge\models`
    /// - Linux: `~/.cache/iconforge/models`
    /// - macOS: `~/Library/Caches/iconforge/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new() -> Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_dir(base.join("iconforge").join("models"))
    }

    /// Create a model cache rooted at a custom directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();

        fs::create_dir_all(&cache_dir).map_err(|source| Error::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self { cache_dir })
    }

    /// Directory holding the cached files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path to a model file, downloading if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or accessed.
    pub fn get_model_path(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.cache_dir.join(model_type.filename());

        if !path.exists() {
            stream_to_file(
                model_type.url(),
                &path,
                model_type.filename(),
                model_type.approx_size(),
            )?;
        }

        if let (Some(data_url), Some(data_filename)) =
            (model_type.data_url(), model_type.data_filename())
        {
            let data_path = self.cache_dir.join(data_filename);
            if !data_path.exists() {
                stream_to_file(
                    data_url,
                    &data_path,
                    data_filename,
                    model_type.data_approx_size(),
                )?;
            }
        }

        Ok(path)
    }

    /// Load an ONNX model session.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load_session(&self, model_type: ModelType) -> Result<Session> {
        let path = self.get_model_path(model_type)?;

        Session::builder()
            .map_err(|source| Error::ModelLoad {
                name: model_type.filename().to_string(),
                source,
            })?
            .commit_from_file(&path)
            .map_err(|source| Error::ModelLoad {
                name: model_type.filename().to_string(),
                source,
            })
    }

    /// Load the CLIP tokenizer.
    ///
    /// The tokenizer is small, so a fresh download is parsed in memory and
    /// only cached once it is known to be valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer file cannot be fetched or parsed.
    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        let model_type = ModelType::Tokenizer;
        let path = self.cache_dir.join(model_type.filename());

        if path.exists() {
            return Tokenizer::from_file(&path)
                .map_err(|e| Error::Tokenizer(format!("{}: {e}", path.display())));
        }

        let bytes = fetch_bytes(model_type.url(), model_type.filename())?;
        let tokenizer = Tokenizer::from_bytes(&bytes)
            .map_err(|e| Error::Tokenizer(format!("downloaded {}: {e}", model_type.filename())))?;

        write_atomic(&path, &bytes)?;
        tracing::info!("Cached tokenizer at {}", path.display());

        Ok(tokenizer)
    }
}

fn request(url: &str, name: &str) -> Result<reqwest::blocking::Response> {
    tracing::info!("Downloading {name} from {url}");

    reqwest::blocking::Client::new()
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })
}

/// Fetch a small file fully into memory.
fn fetch_bytes(url: &str, name: &str) -> Result<Vec<u8>> {
    let bytes = request(url, name)?
        .bytes()
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })?;

    Ok(bytes.to_vec())
}

/// Stream a large download into `path` with a progress bar.
///
/// Data lands in a `.part` file that is renamed once complete, so an
/// interrupted download is never mistaken for a cached model.
fn stream_to_file(url: &str, path: &Path, name: &str, approx_size: u64) -> Result<()> {
    let mut response = request(url, name)?;

    let pb = ProgressBar::new(response.content_length().unwrap_or(approx_size));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(name.to_string());

    let part_path = path.with_extension("part");
    let file = fs::File::create(&part_path)?;
    let mut writer = pb.wrap_write(BufWriter::new(file));

    std::io::copy(&mut response, &mut writer)?;
    writer.flush()?;
    drop(writer);

    pb.finish_with_message(format!("{name} done"));
    fs::rename(&part_path, path)?;

    Ok(())
}

/// Write a whole file, replacing `path` only after the write succeeded.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let part_path = path.with_extension("part");
    fs::write(&part_path, contents)?;
    fs::rename(&part_path, path)?;
    Ok(())
}
