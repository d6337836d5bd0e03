use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ocrlines::config::{default_config_path, resolve_config, save_config, AppConfig};
use ocrlines::export::{Exporter, JsonExporter, ReportTarget, TextExporter};
use ocrlines::ocr::enhance::enhance_file;
use ocrlines::ocr::ThresholdEnhancer;
use ocrlines::{BatchItem, BatchOrchestrator, BatchResult, ItemOutcome, ProcessingMode};

#[derive(Parser, Debug)]
#[command(name = "ocrlines")]
#[command(version, long_about = None)]
#[command(about = "Reconstruct reading-order text lines from OCR detections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: platform config dir, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the line grouping threshold in pixels
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recognize a single image and print its text
    Ocr {
        /// Input image (png, jpg, jpeg)
        input: PathBuf,
    },

    /// Recognize multiple images and emit a per-file report
    Batch {
        /// Input images
        inputs: Vec<PathBuf>,

        /// Run only the original image, or also the enhanced variant
        #[arg(short, long, value_enum, default_value_t = Mode::Simple)]
        mode: Mode,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Images processed in parallel
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Write the grayscale + threshold variant of an image
    Enhance {
        /// Input image
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default configuration as a starting point
    InitConfig {
        /// Destination (default: platform config dir)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Mode {
    Simple,
    Augmented,
}

impl From<Mode> for ProcessingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Simple => ProcessingMode::Simple,
            Mode::Augmented => ProcessingMode::Augmented,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Format {
    Json,
    Text,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = || -> Result<AppConfig> {
        let mut config = resolve_config(cli.config.as_deref())?;
        if let Some(threshold) = cli.threshold {
            config.layout.line_threshold = threshold;
        }
        Ok(config)
    };

    match cli.command {
        Commands::Ocr { input } => recognize_single(&config()?, input),
        Commands::Batch {
            inputs,
            mode,
            format,
            output,
            jobs,
        } => recognize_batch(&config()?, inputs, mode.into(), format, output, jobs),
        Commands::Enhance { input, output } => enhance_image(input, output),
        Commands::InitConfig { output, force } => init_config(output, force),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn recognize_single(config: &AppConfig, input: PathBuf) -> Result<()> {
    let bytes =
        fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
    let item = BatchItem::new(display_name(&input), bytes);

    let detector = config.detector.bridge();
    let enhancer = ThresholdEnhancer::new();
    let storage = config.storage.storage();
    let orchestrator = BatchOrchestrator::new(&detector, &enhancer, &storage)
        .with_clusterer(config.layout.clusterer())
        .with_allowed_extensions(config.batch.allowed_extensions.clone());

    let text = orchestrator
        .process_single(&item)
        .with_context(|| format!("failed to process {}", input.display()))?;
    println!("{text}");
    Ok(())
}

fn recognize_batch(
    config: &AppConfig,
    inputs: Vec<PathBuf>,
    mode: ProcessingMode,
    format: Format,
    output: Option<PathBuf>,
    jobs: Option<usize>,
) -> Result<()> {
    if inputs.is_empty() {
        anyhow::bail!("No input files specified");
    }

    // Unreadable files keep their slot as an error outcome.
    let mut items = Vec::with_capacity(inputs.len());
    let mut slots: Vec<Option<ItemOutcome>> = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let name = display_name(input);
        match fs::read(input) {
            Ok(bytes) => {
                items.push(BatchItem::new(name, bytes));
                slots.push(None);
            }
            Err(err) => {
                slots.push(Some(ItemOutcome::error(
                    name,
                    format!("failed to read {}: {err}", input.display()),
                )));
            }
        }
    }

    let detector = config.detector.bridge();
    let enhancer = ThresholdEnhancer::new();
    let storage = config.storage.storage();
    let orchestrator = BatchOrchestrator::new(&detector, &enhancer, &storage)
        .with_clusterer(config.layout.clusterer())
        .with_allowed_extensions(config.batch.allowed_extensions.clone())
        .with_jobs(jobs.unwrap_or(config.batch.jobs));

    let processed = if items.is_empty() {
        Vec::new()
    } else {
        orchestrator.process_batch(&items, mode)?.results
    };
    let mut processed = processed.into_iter();
    let result = BatchResult {
        results: slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| processed.next()))
            .collect(),
    };

    let target = output.map(ReportTarget::File).unwrap_or(ReportTarget::Stdout);
    match format {
        Format::Json => JsonExporter::new(target).export(&result)?,
        Format::Text => TextExporter::new(target).export(&result)?,
    }

    info!(
        "Summary: {} succeeded, {} failed",
        result.succeeded(),
        result.failed()
    );
    Ok(())
}

fn enhance_image(input: PathBuf, output: PathBuf) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    enhance_file(&ThresholdEnhancer::new(), &input, &output)
        .with_context(|| format!("failed to enhance {}", input.display()))?;
    info!(output = %output.display(), "enhanced image written");
    Ok(())
}

fn init_config(output: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match output {
        Some(path) => path,
        None => default_config_path().context("no platform config directory available")?,
    };
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    save_config(&AppConfig::default(), &path)?;
    info!(path = %path.display(), "default config written");
    Ok(())
}
