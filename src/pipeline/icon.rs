//! Icon generation: one request from prompt to rounded bitmap.

use image::DynamicImage;

use crate::error::{Error, Result};
use crate::image::{resize_to_edge, round_corners};
use crate::options::{
    resolve_prompt, CornerStyle, IconSize, PromptTemplate, DEFAULT_NEGATIVE_PROMPT,
};

use super::generator::{GenerationRequest, Generator};
use super::scheduler::MAX_INFERENCE_STEPS;

/// Sampling parameters for the generative model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// What the model should steer away from.
    pub negative_prompt: String,

    /// Number of denoising steps.
    pub num_steps: u32,

    /// Classifier-free guidance scale.
    pub guidance_scale: f32,

    /// Random seed for reproducibility. None for random.
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            num_steps: 20,
            guidance_scale: 7.5,
            seed: None,
        }
    }
}

impl GenerationConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.num_steps == 0 || self.num_steps > MAX_INFERENCE_STEPS {
            return Err(Error::InvalidParameter {
                name: "num_steps".to_string(),
                reason: format!("must be between 1 and {MAX_INFERENCE_STEPS}"),
            });
        }

        if !self.guidance_scale.is_finite() || self.guidance_scale <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "guidance_scale".to_string(),
                reason: "must be a positive number".to_string(),
            });
        }

        Ok(())
    }
}

/// A fully resolved icon request.
#[derive(Debug, Clone, PartialEq)]
pub struct IconRequest {
    pub prompt: String,
    pub size: IconSize,
    pub corners: CornerStyle,
    pub config: GenerationConfig,
}

impl IconRequest {
    /// Request with default sampling parameters.
    ///
    /// A blank prompt is replaced by the default prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>, size: IconSize, corners: CornerStyle) -> Self {
        let prompt = prompt.into();
        Self {
            prompt: resolve_prompt(Some(&prompt), None),
            size,
            corners,
            config: GenerationConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    fn to_generation_request(&self) -> GenerationRequest {
        let edge = self.size.edge();
        GenerationRequest {
            prompt: self.prompt.clone(),
            negative_prompt: self.config.negative_prompt.clone(),
            num_steps: self.config.num_steps,
            guidance_scale: self.config.guidance_scale,
            width: edge,
            height: edge,
            seed: self.config.seed,
        }
    }
}

/// Whether the generative model could be loaded.
#[derive(Debug)]
pub enum ModelState<G> {
    /// Loading failed; every request is refused with this reason.
    Unavailable { reason: String },
    Ready(G),
}

/// Turns icon requests into rounded bitmaps using a [`Generator`].
#[derive(Debug)]
pub struct IconGenerator<G> {
    state: ModelState<G>,
}

impl<G: Generator> IconGenerator<G> {
    /// Wrap a loaded generator.
    pub const fn new(generator: G) -> Self {
        Self {
            state: ModelState::Ready(generator),
        }
    }

    /// An orchestrator whose model failed to load.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    /// Build from the outcome of loading the model.
    ///
    /// A load failure is logged and remembered; there is no reload path.
    pub fn from_load(loaded: Result<G>) -> Self {
        match loaded {
            Ok(generator) => Self::new(generator),
            Err(err) => {
                tracing::error!("Error loading model: {err}");
                Self::unavailable(err.to_string())
            }
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ModelState<G> {
        &self.state
    }

    /// The loaded generator, if any.
    #[must_use]
    pub const fn generator(&self) -> Option<&G> {
        match &self.state {
            ModelState::Ready(generator) => Some(generator),
            ModelState::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.generator().is_some_and(|generator| generator.is_available())
    }

    /// Generate one icon.
    ///
    /// # Errors
    ///
    /// - [`Error::ModelUnavailable`] if the model is not loaded; nothing is run.
    /// - [`Error::InvalidParameter`] for bad sampling parameters.
    /// - [`Error::GenerationFailed`] if the model fails; it is not retried.
    pub fn generate(&mut self, request: &IconRequest) -> Result<DynamicImage> {
        let generator = match &mut self.state {
            ModelState::Unavailable { reason } => {
                return Err(Error::ModelUnavailable {
                    reason: reason.clone(),
                })
            }
            ModelState::Ready(generator) if !generator.is_available() => {
                return Err(Error::ModelUnavailable {
                    reason: "generator reported itself unavailable".to_string(),
                })
            }
            ModelState::Ready(generator) => generator,
        };

        request.config.validate()?;

        let edge = request.size.edge();
        tracing::info!(
            "Generating {} icon with {}",
            request.size.label(),
            request.corners.label()
        );

        let generated = generator
            .generate(&request.to_generation_request())
            .map_err(Error::generation_failed)?;

        let resized = resize_to_edge(generated, edge);
        round_corners(&resized, request.corners.radius())
    }

    /// Generate an icon from user-facing labels.
    ///
    /// `prompt` may be a template label, free text, or empty for the default
    /// prompt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] for an unknown size or corner label,
    /// otherwise the errors of [`IconGenerator::generate`].
    pub fn generate_icon(
        &mut self,
        prompt: &str,
        size_label: &str,
        corner_label: &str,
    ) -> Result<DynamicImage> {
        let size = IconSize::from_label(size_label)?;
        let corners = CornerStyle::from_label(corner_label)?;

        let prompt = match PromptTemplate::from_label(prompt) {
            Ok(template) => template.text().to_string(),
            Err(_) => resolve_prompt(Some(prompt), None),
        };

        self.generate(&IconRequest::new(prompt, size, corners))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DEFAULT_PROMPT;
    use image::{GenericImageView, Rgb, RgbImage};

    /// Records requests and returns a flat image of a fixed size.
    struct FakeGenerator {
        output: (u32, u32),
        fail: bool,
        available: bool,
        requests: Vec<GenerationRequest>,
    }

    impl FakeGenerator {
        fn new() -> Self {
            Self {
                output: (0, 0),
                fail: false,
                available: true,
                requests: Vec::new(),
            }
        }
    }

    impl Generator for FakeGenerator {
        fn generate(&mut self, request: &GenerationRequest) -> Result<DynamicImage> {
            self.requests.push(request.clone());
            if self.fail {
                return Err(Error::ShapeMismatch {
                    expected: "noise prediction output".to_string(),
                    actual: "no output".to_string(),
                });
            }
            let (w, h) = match self.output {
                (0, 0) => (request.width, request.height),
                dims => dims,
            };
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                w,
                h,
                Rgb([40, 120, 200]),
            )))
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn requests(icons: &IconGenerator<FakeGenerator>) -> &[GenerationRequest] {
        &icons.generator().unwrap().requests
    }

    #[test]
    fn test_medium_slight_scenario() {
        let mut icons = IconGenerator::new(FakeGenerator::new());
        let icon = icons
            .generate_icon("", "Medium (256x256)", "Slight Rounding")
            .unwrap();

        assert_eq!(icon.dimensions(), (256, 256));
        assert!(icon.color().has_alpha());
        for (x, y) in [(0, 0), (255, 0), (0, 255), (255, 255)] {
            assert_eq!(icon.get_pixel(x, y)[3], 0);
        }
        assert_eq!(icon.get_pixel(128, 128)[3], 255);

        let sent = &requests(&icons)[0];
        assert_eq!((sent.width, sent.height), (256, 256));
        assert_eq!(sent.num_steps, 20);
        assert!((sent.guidance_scale - 7.5).abs() < f32::EPSILON);
        assert_eq!(sent.negative_prompt, DEFAULT_NEGATIVE_PROMPT);
    }

    #[test]
    fn test_empty_prompt_uses_default() {
        let mut icons = IconGenerator::new(FakeGenerator::new());
        icons
            .generate_icon("  ", "Small (128x128)", "No Rounding")
            .unwrap();

        assert_eq!(requests(&icons)[0].prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_template_label_and_text() {
        let mut icons = IconGenerator::new(FakeGenerator::new());
        let template = PromptTemplate::Watercolor;

        icons
            .generate_icon(template.label(), "Small (128x128)", "No Rounding")
            .unwrap();
        icons
            .generate_icon(template.text(), "Small (128x128)", "No Rounding")
            .unwrap();
        icons
            .generate_icon("a tiny owl", "Small (128x128)", "No Rounding")
            .unwrap();

        let sent = requests(&icons);
        assert_eq!(sent[0].prompt, template.text());
        assert_eq!(sent[1].prompt, template.text());
        assert_eq!(sent[2].prompt, "a tiny owl");
    }

    #[test]
    fn test_empty_custom_prompt_with_template() {
        let template = PromptTemplate::RobotCharacter;
        let prompt = resolve_prompt(Some(""), Some(template));
        let request = IconRequest::new(prompt, IconSize::Small, CornerStyle::None);

        let mut icons = IconGenerator::new(FakeGenerator::new());
        icons.generate(&request).unwrap();

        assert_eq!(requests(&icons)[0].prompt, template.text());
    }

    #[test]
    fn test_unknown_labels() {
        let mut icons = IconGenerator::new(FakeGenerator::new());

        let err = icons.generate_icon("", "Tiny", "Slight Rounding").unwrap_err();
        assert!(matches!(err, Error::UnknownOption { table: "size", .. }));

        let err = icons.generate_icon("", "Small (128x128)", "Round").unwrap_err();
        assert!(matches!(err, Error::UnknownOption { table: "corner style", .. }));

        assert!(requests(&icons).is_empty());
    }

    #[test]
    fn test_unavailable_model() {
        let mut icons: IconGenerator<FakeGenerator> =
            IconGenerator::from_load(Err(Error::Tokenizer("missing file".to_string())));

        assert!(!icons.is_available());
        let err = icons
            .generate_icon("", "Medium (256x256)", "Slight Rounding")
            .unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable { ref reason } if reason.contains("missing file")));

        // Still unavailable on the next attempt.
        assert!(matches!(
            icons.generate_icon("", "Small (128x128)", "No Rounding"),
            Err(Error::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_generator_reporting_unavailable() {
        let mut fake = FakeGenerator::new();
        fake.available = false;
        let mut icons = IconGenerator::new(fake);

        assert!(matches!(
            icons.generate_icon("", "Small (128x128)", "No Rounding"),
            Err(Error::ModelUnavailable { .. })
        ));
        assert!(requests(&icons).is_empty());
    }

    #[test]
    fn test_generation_failure_is_wrapped_once() {
        let mut fake = FakeGenerator::new();
        fake.fail = true;
        let mut icons = IconGenerator::new(fake);

        let err = icons
            .generate_icon("", "Small (128x128)", "Slight Rounding")
            .unwrap_err();
        match err {
            Error::GenerationFailed { source } => {
                assert!(matches!(*source, Error::ShapeMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(requests(&icons).len(), 1);
    }

    #[test]
    fn test_output_resized_to_requested_edge() {
        let mut fake = FakeGenerator::new();
        fake.output = (300, 200);
        let mut icons = IconGenerator::new(fake);

        let icon = icons
            .generate_icon("", "Small (128x128)", "Medium Rounding")
            .unwrap();
        assert_eq!(icon.dimensions(), (128, 128));
    }

    #[test]
    fn test_no_rounding_keeps_rgb() {
        let mut icons = IconGenerator::new(FakeGenerator::new());
        let icon = icons
            .generate_icon("", "Small (128x128)", "No Rounding")
            .unwrap();

        assert!(!icon.color().has_alpha());
    }

    #[test]
    fn test_invalid_config_rejected_before_inference() {
        let mut icons = IconGenerator::new(FakeGenerator::new());
        let request = IconRequest::new("owl", IconSize::Small, CornerStyle::None).with_config(
            GenerationConfig {
                num_steps: 0,
                ..GenerationConfig::default()
            },
        );

        assert!(matches!(
            icons.generate(&request),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(requests(&icons).is_empty());
    }

    #[test]
    fn test_too_many_steps_is_a_bad_request() {
        let too_many = GenerationConfig {
            num_steps: MAX_INFERENCE_STEPS + 1,
            ..GenerationConfig::default()
        };
        assert!(matches!(
            too_many.validate(),
            Err(Error::InvalidParameter { ref name, .. }) if name == "num_steps"
        ));

        let mut icons = IconGenerator::new(FakeGenerator::new());
        let request = IconRequest::new("owl", IconSize::Small, CornerStyle::None)
            .with_config(too_many);
        assert!(matches!(
            icons.generate(&request),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(requests(&icons).is_empty());

        let most = GenerationConfig {
            num_steps: MAX_INFERENCE_STEPS,
            ..GenerationConfig::default()
        };
        assert!(most.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(GenerationConfig::default().validate().is_ok());

        let bad_scale = GenerationConfig {
            guidance_scale: 0.0,
            ..GenerationConfig::default()
        };
        assert!(bad_scale.validate().is_err());

        let nan_scale = GenerationConfig {
            guidance_scale: f32::NAN,
            ..GenerationConfig::default()
        };
        assert!(nan_scale.validate().is_err());
    }

    #[test]
    fn test_seed_is_forwarded() {
        let mut icons = IconGenerator::new(FakeGenerator::new());
        let request = IconRequest::new("owl", IconSize::Large, CornerStyle::Full).with_config(
            GenerationConfig {
                seed: Some(42),
                ..GenerationConfig::default()
            },
        );
        icons.generate(&request).unwrap();

        let sent = &requests(&icons)[0];
        assert_eq!(sent.seed, Some(42));
        assert_eq!((sent.width, sent.height), (512, 512));
    }
}
