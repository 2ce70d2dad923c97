//! iconforge CLI - generate rounded chatbot icons with Stable Diffusion.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iconforge::image::save_icon;
use iconforge::options::{resolve_prompt, DEFAULT_NEGATIVE_PROMPT};
use iconforge::{
    CornerStyle, GenerationConfig, IconGenerator, IconRequest, IconSize, ModelCache,
    PromptTemplate, StableDiffusion,
};

/// Encoder quality handed to `save_icon`; PNG output is lossless.
const ENCODER_QUALITY: u8 = 95;

/// Generate square chatbot icons with rounded corners.
#[derive(Parser, Debug)]
#[command(name = "iconforge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Prompt template label, e.g. "Cartoon Mascot".
    #[arg(short, long, value_name = "LABEL")]
    template: Option<PromptTemplate>,

    /// Custom prompt. Takes precedence over the template.
    #[arg(short, long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Icon size label.
    #[arg(long, default_value_t = IconSize::default(), value_name = "LABEL")]
    size: IconSize,

    /// Corner rounding label.
    #[arg(long, default_value_t = CornerStyle::default(), value_name = "LABEL")]
    corners: CornerStyle,

    /// What the model should avoid.
    #[arg(long, default_value = DEFAULT_NEGATIVE_PROMPT, value_name = "TEXT")]
    negative_prompt: String,

    /// Number of denoising steps. More steps = better quality but slower.
    #[arg(long, default_value = "20", value_name = "INT")]
    steps: u32,

    /// Classifier-free guidance scale.
    #[arg(short, long, default_value = "7.5", value_name = "FLOAT")]
    guidance_scale: f32,

    /// Random seed for reproducibility.
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,

    /// Output image path.
    #[arg(short, long, default_value = "icon.png", value_name = "OUTPUT")]
    output: PathBuf,

    /// Directory holding the downloaded models.
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Generate once from the flags above instead of asking.
    #[arg(long)]
    no_interactive: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("iconforge={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let config = GenerationConfig {
        negative_prompt: args.negative_prompt.clone(),
        num_steps: args.steps,
        guidance_scale: args.guidance_scale,
        seed: args.seed,
    };
    config.validate().context("Invalid generation settings")?;

    // Checked before the model loads, which can take minutes.
    validate_output(&args.output).map_err(|reason| {
        anyhow::anyhow!("Invalid output path {}: {reason}", args.output.display())
    })?;

    let mut icons = load_generator(args);

    if args.no_interactive {
        generate_once(&mut icons, args, config)
    } else {
        interactive(&mut icons, args, &config)
    }
}

/// Load the model once. A failure leaves the generator unavailable rather
/// than aborting, so the user still gets a clear error per request.
fn load_generator(args: &Args) -> IconGenerator<StableDiffusion> {
    let cache = match &args.model_dir {
        Some(dir) => ModelCache::with_dir(dir),
        None => ModelCache::new(),
    };

    IconGenerator::from_load(cache.and_then(|cache| StableDiffusion::load(&cache)))
}

fn generate_once(
    icons: &mut IconGenerator<StableDiffusion>,
    args: &Args,
    config: GenerationConfig,
) -> Result<()> {
    let prompt = resolve_prompt(args.prompt.as_deref(), args.template);
    let request = IconRequest::new(prompt, args.size, args.corners).with_config(config);

    let icon = icons.generate(&request).context("Failed to generate icon")?;
    save_icon(&icon, &args.output, ENCODER_QUALITY).context("Failed to save icon")?;

    println!("Successfully generated {}", args.output.display());

    Ok(())
}

fn interactive(
    icons: &mut IconGenerator<StableDiffusion>,
    args: &Args,
    config: &GenerationConfig,
) -> Result<()> {
    cliclack::intro("Chatbot Icon Generator")?;

    if !icons.is_available() {
        cliclack::log::warning("The image model failed to load, generation will fail.")?;
    }

    let mut template = args.template;
    let mut size = args.size;
    let mut corners = args.corners;
    let mut output = args.output.display().to_string();

    loop {
        template = select_template(template)?;

        let mut prompt_input = cliclack::input("Custom prompt (optional):")
            .placeholder("Enter your own detailed description...")
            .required(false);
        if let Some(text) = template.map(PromptTemplate::text).or(args.prompt.as_deref()) {
            prompt_input = prompt_input.default_input(text);
        }
        let custom: String = prompt_input.interact()?;

        size = select_size(size)?;
        corners = select_corners(corners)?;

        output = cliclack::input("Save icon to:")
            .default_input(&output)
            .validate(|input: &String| validate_output(Path::new(input)))
            .interact()?;

        let request = IconRequest::new(resolve_prompt(Some(&custom), template), size, corners)
            .with_config(config.clone());

        let start = Instant::now();
        let result = icons
            .generate(&request)
            .and_then(|icon| save_icon(&icon, &output, ENCODER_QUALITY));

        match result {
            Ok(()) => cliclack::log::success(format!(
                "Saved {output} in {:.2}s",
                start.elapsed().as_secs_f32()
            ))?,
            Err(err) => cliclack::log::error(format!("{err}"))?,
        }

        let again = cliclack::confirm("Generate another icon?")
            .initial_value(true)
            .interact()?;
        if !again {
            break;
        }
    }

    cliclack::outro("Done")?;
    Ok(())
}

fn select_template(current: Option<PromptTemplate>) -> Result<Option<PromptTemplate>> {
    let mut select = cliclack::select("Quick template:")
        .item(None, "None", "write your own prompt")
        .initial_value(current);
    for template in PromptTemplate::ALL {
        select = select.item(Some(template), template.label(), "");
    }

    Ok(select.interact()?)
}

fn select_size(current: IconSize) -> Result<IconSize> {
    let mut select = cliclack::select("Icon size:").initial_value(current);
    for size in IconSize::ALL {
        select = select.item(size, size.label(), "");
    }

    Ok(select.interact()?)
}

fn select_corners(current: CornerStyle) -> Result<CornerStyle> {
    let mut select = cliclack::select("Corner rounding:").initial_value(current);
    for corners in CornerStyle::ALL {
        select = select.item(corners, corners.label(), format!("{} px", corners.radius()));
    }

    Ok(select.interact()?)
}

fn validate_output(path: &Path) -> std::result::Result<(), &'static str> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => Ok(()),
        Some(_) => Err("Only .png keeps the transparent corners!"),
        None => Err(".png extension is required!"),
    }
}
