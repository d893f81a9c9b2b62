// ============================================================================
// ColorMagic CLI — render a coloring page without opening a window
// ============================================================================
//
// Usage examples:
//   colormagic --prompt "A happy dinosaur" --output dino.png
//   colormagic -p "A space cat" --no-style --api-key KEY
//   colormagic --background https://example.com/page.png -o page.png
//   colormagic -b scans/castle.jpg -o castle.png
//
// The page is composed exactly like the GUI does it: aspect-fit onto the
// square surface, then flattened over an empty drawing layer.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use thiserror::Error;

use crate::assets::AppSettings;
use crate::io::{ImageLoader, ImageRef, LoadError};
use crate::ops::ai::{GeminiGenerator, GenerationError, ImageGenerator};
use crate::ops::canvas_ops::ExportError;
use crate::project::{Project, SubmitError};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// ColorMagic headless page renderer.
#[derive(Parser, Debug)]
#[command(
    name = "colormagic",
    about = "Generate a coloring page and save it as PNG",
    long_about = "Turn a short prompt into a black-and-white coloring page, or place an\n\
                  existing picture on the page, and save the result without opening\n\
                  the GUI.\n\n\
                  Example:\n  \
                  colormagic --prompt \"A happy dinosaur\" --output dino.png\n  \
                  colormagic --background page.jpg --output page.png"
)]
pub struct CliArgs {
    /// What the coloring page should show.
    #[arg(short, long, conflicts_with = "background", required_unless_present = "background")]
    pub prompt: Option<String>,

    /// Use an existing picture instead of generating one.
    /// Accepts an http(s) URL, a base64 `data:` URL or a file path.
    #[arg(short, long, value_name = "REF")]
    pub background: Option<String>,

    /// Output PNG path (defaults to the configured export file name).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// API key for this run only; overrides settings and environment.
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Send the prompt without the coloring-book style instruction.
    #[arg(long)]
    pub no_style: bool,

    /// Print progress and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| {
            a == "--prompt" || a == "-p" || a == "--background" || a == "-b" || a.starts_with("--prompt=")
                || a.starts_with("--background=")
        })
    }

    /// Settings for this run: stored settings with command-line overrides on top.
    pub fn apply_to(&self, settings: &mut AppSettings) {
        if let Some(key) = &self.api_key {
            settings.api_key = key.clone();
        }
        if self.no_style {
            settings.style_preamble = false;
        }
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid prompt: {0}")]
    Prompt(#[from] SubmitError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("background failed: {0}")]
    Load(#[from] LoadError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one render and return an OS exit code.
/// `0` = page written, `1` = anything failed.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = AppSettings::load();
    args.apply_to(&mut settings);

    let generator = match GeminiGenerator::from_settings(&settings) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let loader = match ImageLoader::new(&settings) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    match render(&args, &settings, &generator, &loader) {
        Ok(path) => {
            if args.verbose {
                eprintln!(
                    "→ {} ({:.0}ms)",
                    path.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Produce the page and write it. Returns the path written.
pub fn render(
    args: &CliArgs,
    settings: &AppSettings,
    generator: &dyn ImageGenerator,
    loader: &ImageLoader,
) -> Result<PathBuf, CliError> {
    let mut project = Project::new(settings);

    // -- Step 1: Pick the background -----------------------------------
    let request = if let Some(text) = &args.prompt {
        let (token, prompt) = project.begin_generation(text)?;
        if args.verbose {
            eprintln!("Generating \"{}\"...", prompt.as_str());
        }
        let image_ref = generator.generate(&prompt)?;
        project.finish_generation(token, &prompt, Ok(image_ref))
    } else {
        let image_ref = ImageRef::parse(args.background.as_deref().unwrap_or_default())?;
        project.request_background(Some(image_ref))
    };

    // -- Step 2: Load and compose --------------------------------------
    if let Some(req) = request {
        if args.verbose {
            eprintln!("Loading {}...", req.image_ref);
        }
        let loaded = loader.load(&req.image_ref)?;
        project.commit_background(req.token, Ok(loaded));
    }

    // -- Step 3: Save ----------------------------------------------------
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.export_file_name));
    project.save_to(&output)?;
    Ok(output)
}
