//! plane-locator CLI: locate reference images and paper sheets in images.

use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use plane_locator::detect::{detect_paper_encoded, locate_anchor_encoded};
use plane_locator::locate::locate_anchor_from_points;
use plane_locator::{AnchorParams, DetectionConfig, PaperPreset};
use serde::{Deserialize, Serialize};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "plane-locator")]
#[command(about = "Locate a reference image or a sheet of paper inside a scene image")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit tracing events as JSON (builds with the `tracing` feature only).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a reference image inside a scene image via feature matching.
    Anchor(AnchorArgs),

    /// Find a sheet of paper (or card) in a single image.
    Paper(PaperArgs),

    /// Fit a homography to point correspondences read from JSON.
    Points(PointsArgs),

    /// Write a detection config for a preset as JSON.
    Config {
        /// Preset name (a3, a4, a5, letter, legal, id1_card, business_card, unconstrained).
        #[arg(long, default_value = "a4")]
        preset: PaperPreset,

        /// Output path.
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct AnchorArgs {
    /// Reference image (PNG, JPEG, ...).
    #[arg(long)]
    reference: PathBuf,

    /// Scene image.
    #[arg(long)]
    scene: PathBuf,

    /// Optional JSON file with `AnchorParams` overrides.
    #[arg(long)]
    params: Option<PathBuf>,

    /// RANSAC seed.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct PaperArgs {
    /// Input image.
    #[arg(long)]
    image: PathBuf,

    /// Named preset; ignored when --config is given.
    #[arg(long)]
    preset: Option<PaperPreset>,

    /// JSON detection config.
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Focal length in pixels; enables pose recovery.
    #[arg(long)]
    focal: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct PointsArgs {
    /// JSON file with `ref_x`, `ref_y`, `scene_x`, `scene_y`, `ref_width`, `ref_height`.
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointsInput {
    ref_x: Vec<f32>,
    ref_y: Vec<f32>,
    scene_x: Vec<f32>,
    scene_y: Vec<f32>,
    ref_width: f32,
    ref_height: f32,
    #[serde(default)]
    params: AnchorParams,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    match cli.command {
        Commands::Anchor(args) => run_anchor(args),
        Commands::Paper(args) => run_paper(args),
        Commands::Points(args) => run_points(args),
        Commands::Config { preset, out } => {
            preset.config().write_json(&out)?;
            log::info!("wrote {preset} config to {}", out.display());
            Ok(())
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8, json: bool) -> CliResult<()> {
    use plane_locator::core::TraceFormat;

    let format = if json {
        TraceFormat::Json
    } else {
        TraceFormat::Text
    };
    plane_locator::core::init_tracing(format);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8, json: bool) -> CliResult<()> {
    use log::LevelFilter;

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    plane_locator::core::init_with_level(level)?;
    if json {
        log::warn!("--log-json needs the `tracing` feature; using plain stderr logs");
    }
    Ok(())
}

fn run_anchor(args: AnchorArgs) -> CliResult<()> {
    let mut params: AnchorParams = match &args.params {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => AnchorParams::default(),
    };
    if let Some(seed) = args.seed {
        params.ransac.seed = seed;
    }
    let reference = fs::read(&args.reference)?;
    let scene = fs::read(&args.scene)?;
    let detection = locate_anchor_encoded(&reference, &scene, &params);
    print_json(&detection)
}

fn run_paper(args: PaperArgs) -> CliResult<()> {
    let mut config = match (&args.config, args.preset) {
        (Some(path), _) => DetectionConfig::load_json(path)?,
        (None, Some(preset)) => preset.config(),
        (None, None) => plane_locator::locate::default_paper_config(),
    };
    if let Some(f) = args.focal {
        config = config.with_focal_length(f);
    }
    let bytes = fs::read(&args.image)?;
    let detection = detect_paper_encoded(&bytes, Some(&config));
    print_json(&detection)
}

fn run_points(args: PointsArgs) -> CliResult<()> {
    let input: PointsInput = serde_json::from_str(&fs::read_to_string(&args.input)?)?;
    let detection = locate_anchor_from_points(
        &input.ref_x,
        &input.ref_y,
        &input.scene_x,
        &input.scene_y,
        input.ref_width,
        input.ref_height,
        &input.params,
    );
    print_json(&detection)
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
