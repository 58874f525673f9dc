//! Command-line interface for background removal
//!
//! Reads one image, removes its background and writes an RGBA PNG. The
//! summary goes to stdout, as text or JSON; logs and progress go to stderr.

use crate::cli::config::CliConfigBuilder;
use crate::config::BackendType;
use crate::processor::SegmentationProcessor;
use crate::tracing_config::init_cli_tracing;
use crate::types::{RemovalSummary, SegmentationResult};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Background removal CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cutout")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output PNG file [default: <INPUT stem>-cutout.png next to the input]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Also save the refined mask as mask-<uuid>.png in this directory
    #[arg(long, value_name = "DIR")]
    pub mask_dir: Option<PathBuf>,

    /// Path to the ONNX segmentation model (overrides MODEL_PATH)
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Inference backend
    #[arg(short, long, value_enum)]
    pub backend: Option<CliBackend>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Minimum confidence for accepting the model mask (0.0-1.0)
    #[arg(long, value_name = "F")]
    pub confidence_threshold: Option<f64>,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Skip the warm-up inference after loading the model
    #[arg(long)]
    pub no_warmup: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    Tract,
    Onnx,
}

impl From<CliBackend> for BackendType {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Tract => Self::Tract,
            CliBackend::Onnx => Self::Onnx,
        }
    }
}

/// Main CLI entry point
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli)?;
    let processor =
        SegmentationProcessor::new(config).context("Failed to create segmentation processor")?;
    if !processor.backend_loaded() {
        warn!("No model loaded, using classical fallback segmentation");
    }

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read input file {}", cli.input.display()))?;

    let spinner = create_spinner(&cli)?;
    let outcome = processor.process_bytes_async(bytes).await;
    spinner.finish_and_clear();
    let result =
        outcome.with_context(|| format!("Failed to process {}", cli.input.display()))?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    write_output(&result, &output_path)?;
    info!("Saved cutout to {}", output_path.display());

    let mask_path = match &cli.mask_dir {
        Some(dir) => Some(write_mask(&result, dir)?),
        None => None,
    };

    let summary = RemovalSummary::from_result(&result, mask_path);
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        print_summary(&summary, &output_path);
    }

    Ok(())
}

fn create_spinner(cli: &Cli) -> Result<ProgressBar> {
    if cli.json {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message(format!("Removing background from {}", cli.input.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// `photo.jpg` becomes `photo-cutout.png` in the same directory
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}-cutout.png"))
}

fn write_output(result: &SegmentationResult, path: &Path) -> Result<()> {
    let png = result.to_png_bytes().context("Failed to encode output PNG")?;
    std::fs::write(path, png)
        .with_context(|| format!("Failed to write output file {}", path.display()))
}

fn write_mask(result: &SegmentationResult, dir: &Path) -> Result<String> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create mask directory {}", dir.display()))?;
    let path = dir.join(format!("mask-{}.png", uuid::Uuid::new_v4()));
    let png = result.mask().to_png_bytes().context("Failed to encode mask PNG")?;
    std::fs::write(&path, png)
        .with_context(|| format!("Failed to write mask file {}", path.display()))?;
    Ok(path.display().to_string())
}

fn print_summary(summary: &RemovalSummary, output: &Path) {
    println!("Output:      {}", output.display());
    if let Some(mask) = &summary.mask_path {
        println!("Mask:        {mask}");
    }
    println!("Size:        {}x{}", summary.width, summary.height);
    println!("Method:      {}", summary.method.as_str());
    println!("Confidence:  {:.3} ({})", summary.confidence, summary.message);
    println!("Time:        {:.3}s", summary.processing_time);
    if summary.was_downsampled {
        println!("Note:        input was downsampled before inference");
    }
}
