//! Custom error types for iconforge.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the iconforge library.
#[derive(Error, Debug)]
pub enum Error {
    /// A label was not found in one of the option tables.
    #[error("unknown {table} option: {label:?}")]
    UnknownOption { table: &'static str, label: String },

    /// The generative model failed to initialize.
    #[error("image model is unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// The generative model raised an error during a request.
    #[error("icon generation failed: {source}")]
    GenerationFailed {
        #[source]
        source: Box<Error>,
    },

    /// An image with zero area was handed to the post-processor.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to download a model.
    #[error("failed to download model {name}: {source}")]
    ModelDownload {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Tokenizer loading or encoding failed.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Failed to create cache directory.
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl Error {
    /// Wrap a collaborator error so callers can tell a failed inference
    /// apart from a bad request.
    pub(crate) fn generation_failed(source: Self) -> Self {
        Self::GenerationFailed {
            source: Box::new(source),
        }
    }
}

/// Result type alias for iconforge operations.
pub type Result<T> = std::result::Result<T, Error>;
