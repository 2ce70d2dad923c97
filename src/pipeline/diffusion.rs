//! Stable Diffusion 1.5 text-to-image backend running on ONNX Runtime.

use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::value::Tensor;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tokenizers::Tokenizer;

use crate::error::{Error, Result};
use crate::image::tensor_to_image;
use crate::model::{ModelCache, ModelType};

use super::generator::{GenerationRequest, Generator};
use super::scheduler::DdimScheduler;
use super::text::{self, TextEmbeddings};
use super::vae::{self, LatentTensor, LATENT_CHANNELS};

/// Classifier-free guidance only kicks in above this scale.
const MIN_GUIDANCE_SCALE: f32 = 1.0;

/// Text-to-image pipeline backed by Stable Diffusion 1.5 ONNX exports.
pub struct StableDiffusion {
    tokenizer: Tokenizer,
    text_encoder: Session,
    unet: Session,
    vae_decoder: Session,
}

impl StableDiffusion {
    /// Load every model the pipeline needs.
    ///
    /// This will download models if they are not already cached.
    ///
    /// # Errors
    ///
    /// Returns an error if any model cannot be fetched or loaded.
    pub fn load(cache: &ModelCache) -> Result<Self> {
        tracing::info!("Loading models from {}", cache.dir().display());

        tracing::info!("Loading tokenizer...");
        let tokenizer = cache.load_tokenizer()?;

        tracing::info!("Loading text encoder...");
        let text_encoder = cache.load_session(ModelType::TextEncoder)?;

        tracing::info!("Loading `UNet`...");
        let unet = cache.load_session(ModelType::Unet)?;

        tracing::info!("Loading VAE decoder...");
        let vae_decoder = cache.load_session(ModelType::VaeDecoder)?;

        tracing::info!("Pipeline initialized successfully");

        Ok(Self {
            tokenizer,
            text_encoder,
            unet,
            vae_decoder,
        })
    }

    fn encode_prompt(&mut self, prompt: &str) -> Result<TextEmbeddings> {
        let ids = text::tokenize(&self.tokenizer, prompt)?;
        text::encode(&mut self.text_encoder, ids)
    }

    /// Run the denoising loop from pure noise.
    fn denoise(
        &mut self,
        request: &GenerationRequest,
        text_embeddings: &TextEmbeddings,
        uncond_embeddings: Option<&TextEmbeddings>,
    ) -> Result<LatentTensor> {
        let scheduler = DdimScheduler::new(request.num_steps)?;
        let (latent_height, latent_width) = vae::latent_dims(request.width, request.height);

        let mut rng = request
            .seed
            .map_or_else(rand::rngs::StdRng::from_os_rng, rand::rngs::StdRng::seed_from_u64);

        let mut latents: LatentTensor =
            Array4::from_shape_fn((1, LATENT_CHANNELS, latent_height, latent_width), |_| {
                rng.sample::<f32, _>(StandardNormal)
            }) * scheduler.init_noise_sigma();

        let pb = ProgressBar::new(scheduler.timesteps().len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Denoising [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );

        for &timestep in scheduler.timesteps() {
            let noise_text = self.predict_noise(&latents, timestep, text_embeddings)?;

            let noise_pred = match uncond_embeddings {
                Some(uncond) => {
                    let noise_uncond = self.predict_noise(&latents, timestep, uncond)?;
                    &noise_uncond + &((noise_text - &noise_uncond) * request.guidance_scale)
                }
                None => noise_text,
            };

            latents = scheduler.step(&noise_pred, timestep, &latents);
            pb.inc(1);
        }

        pb.finish_with_message("Denoising complete");
        Ok(latents)
    }

    /// Predict noise using the `UNet`.
    #[allow(clippy::cast_possible_wrap)]
    fn predict_noise(
        &mut self,
        latents: &LatentTensor,
        timestep: usize,
        hidden_states: &TextEmbeddings,
    ) -> Result<LatentTensor> {
        let sample_value =
            Tensor::from_array(latents.clone()).map_err(|source| Error::Inference { source })?;

        // Safe: timesteps are below 1000
        let timestep_arr = Array1::from_vec(vec![timestep as i64]);
        let timestep_value =
            Tensor::from_array(timestep_arr).map_err(|source| Error::Inference { source })?;

        let hidden_value = Tensor::from_array(hidden_states.clone())
            .map_err(|source| Error::Inference { source })?;

        let outputs = self
            .unet
            .run(ort::inputs![
                "sample" => sample_value,
                "timestep" => timestep_value,
                "encoder_hidden_states" => hidden_value,
            ])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "noise prediction output".to_string(),
                actual: "no output".to_string(),
            })?;

        vae::extract_array4(&output)
    }
}

impl Generator for StableDiffusion {
    fn generate(&mut self, request: &GenerationRequest) -> Result<DynamicImage> {
        tracing::info!(
            "Generating {}x{} image in {} steps (guidance {})",
            request.width,
            request.height,
            request.num_steps,
            request.guidance_scale
        );
        tracing::debug!("Prompt: {:?}", request.prompt);
        tracing::debug!("Negative prompt: {:?}", request.negative_prompt);

        tracing::info!("Encoding prompt...");
        let text_embeddings = self.encode_prompt(&request.prompt)?;
        let uncond_embeddings = if request.guidance_scale > MIN_GUIDANCE_SCALE {
            Some(self.encode_prompt(&request.negative_prompt)?)
        } else {
            None
        };

        tracing::info!("Running diffusion...");
        let latents = self.denoise(request, &text_embeddings, uncond_embeddings.as_ref())?;

        tracing::info!("Decoding from latent space...");
        let decoded = vae::decode(&mut self.vae_decoder, &latents)?;

        let image = tensor_to_image(&decoded)?;
        tracing::debug!("Decoded {}x{} image", image.width(), image.height());

        Ok(DynamicImage::ImageRgb8(image))
    }
}
