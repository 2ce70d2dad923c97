//! Prompt tokenization and CLIP text encoding.

use ndarray::{Array2, Array3};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Text embeddings (1, 77, 768) used to condition the `UNet`.
pub type TextEmbeddings = Array3<f32>;

/// Context length of the CLIP text encoder.
pub const MAX_TOKENS: usize = 77;

/// CLIP end-of-text token, also used as padding by Stable Diffusion 1.5.
const END_OF_TEXT: u32 = 49_407;

/// Tokenize a prompt into a fixed-length `(1, 77)` id tensor.
///
/// # Errors
///
/// Returns an error if the tokenizer fails.
pub fn tokenize(tokenizer: &Tokenizer, prompt: &str) -> Result<Array2<i32>> {
    let encoding = tokenizer
        .encode(prompt, true)
        .map_err(|e| Error::Tokenizer(e.to_string()))?;

    let ids = fit_to_context(encoding.get_ids());
    if encoding.get_ids().len() > MAX_TOKENS {
        tracing::warn!(
            "Prompt is {} tokens long, truncating to {MAX_TOKENS}",
            encoding.get_ids().len()
        );
    }

    Array2::from_shape_vec((1, MAX_TOKENS), ids).map_err(|_| Error::ShapeMismatch {
        expected: format!("(1, {MAX_TOKENS})"),
        actual: "reshape failed".to_string(),
    })
}

/// Truncate or pad token ids to exactly [`MAX_TOKENS`], keeping the
/// end-of-text token last when truncating.
#[allow(clippy::cast_possible_wrap)]
fn fit_to_context(ids: &[u32]) -> Vec<i32> {
    let mut fitted: Vec<u32> = ids.iter().copied().take(MAX_TOKENS).collect();
    if ids.len() > MAX_TOKENS {
        fitted[MAX_TOKENS - 1] = END_OF_TEXT;
    }
    fitted.resize(MAX_TOKENS, END_OF_TEXT);

    // Safe: CLIP vocabulary ids are below 2^31
    fitted.into_iter().map(|id| id as i32).collect()
}

/// Run the text encoder on token ids.
///
/// # Errors
///
/// Returns an error if inference fails.
pub fn encode(encoder: &mut Session, ids: Array2<i32>) -> Result<TextEmbeddings> {
    let input_value = Tensor::from_array(ids).map_err(|source| Error::Inference { source })?;

    let outputs = encoder
        .run(ort::inputs![input_value])
        .map_err(|source| Error::Inference { source })?;

    // First output is last_hidden_state
    let output = outputs
        .values()
        .next()
        .ok_or_else(|| Error::ShapeMismatch {
            expected: "last_hidden_state output".to_string(),
            actual: "no output".to_string(),
        })?;

    extract_array3(&output)
}

/// Extract a 3D array from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_array3(value: &ort::value::ValueRef<'_>) -> Result<Array3<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    if dims.len() != 3 {
        return Err(Error::ShapeMismatch {
            expected: "3D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array3::from_shape_vec((dims[0], dims[1], dims[2]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}
