//! papertouch CLI — run pipeline stages on still images.

use clap::{Args, Parser, Subcommand};
use image::GrayImage;
use serde::Serialize;
use std::path::{Path, PathBuf};

use papertouch::homography::matrix3_to_array;
use papertouch::preprocess::edge_map;
use papertouch::{
    ControlEvent, ControlSet, EventLog, FingertipTracker, MapDirection, PaperDetector,
    PipelineConfig, ProjectorAlignment, ShapeClassifier,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "papertouch")]
#[command(about = "Paper-sheet control surface: paper detection, control classification, fingertip tracking")]
#[command(version)]
struct Cli {
    /// Pipeline configuration (JSON). Missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the paper sheet and report its quad and transforms.
    Paper(PaperArgs),

    /// Classify the controls drawn on a sheet.
    Controls(ControlsArgs),

    /// Locate the fingertip in a hand mask.
    Fingertip(FingertipArgs),

    /// Compute the camera → projector alignment from four clicked points.
    Align(AlignArgs),

    /// Print the default pipeline configuration.
    DefaultConfig(OutArgs),
}

#[derive(Debug, Clone, Args)]
struct OutArgs {
    /// Write JSON here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct PaperArgs {
    /// Camera frame.
    #[arg(long)]
    image: PathBuf,

    /// Also save the rectified sheet (PNG).
    #[arg(long)]
    rectified: Option<PathBuf>,

    #[command(flatten)]
    out: OutArgs,
}

#[derive(Debug, Clone, Args)]
struct ControlsArgs {
    /// Sheet image (already rectified unless --rectify is given).
    #[arg(long)]
    image: PathBuf,

    /// Detect and rectify the paper before classifying.
    #[arg(long)]
    rectify: bool,

    #[command(flatten)]
    out: OutArgs,
}

#[derive(Debug, Clone, Args)]
struct FingertipArgs {
    /// Camera frame used to find the paper.
    #[arg(long)]
    image: PathBuf,

    /// Binary hand mask (non-zero = hand), same size as the frame.
    #[arg(long)]
    mask: PathBuf,

    #[command(flatten)]
    out: OutArgs,
}

#[derive(Debug, Clone, Args)]
struct AlignArgs {
    /// Camera-space point as `x,y`; give exactly four, in projector corner
    /// order (top-left, top-right, bottom-right, bottom-left).
    #[arg(long = "point", value_parser = parse_point, required = true, allow_hyphen_values = true)]
    points: Vec<[f64; 2]>,

    #[command(flatten)]
    out: OutArgs,
}

fn parse_point(s: &str) -> Result<[f64; 2], String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y, got '{s}'"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok([x, y])
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Paper(args) => run_paper(&args, &config),
        Commands::Controls(args) => run_controls(&args, &config),
        Commands::Fingertip(args) => run_fingertip(&args, &config),
        Commands::Align(args) => run_align(&args, &config),
        Commands::DefaultConfig(out) => write_json(&out, &PipelineConfig::default()),
    }
}

fn load_gray(path: &Path) -> CliResult<GrayImage> {
    tracing::info!("Loading image: {}", path.display());
    let img = image::open(path)?.to_luma8();
    let (w, h) = img.dimensions();
    tracing::info!("Image size: {}x{}", w, h);
    Ok(img)
}

fn write_json<T: Serialize>(out: &OutArgs, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match &out.out {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── paper ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PaperOutput {
    found: bool,
    corners: Option<[[f64; 2]; 4]>,
    width: u32,
    height: u32,
    forward: Option<[[f64; 3]; 3]>,
    inverse: Option<[[f64; 3]; 3]>,
}

fn run_paper(args: &PaperArgs, config: &PipelineConfig) -> CliResult<()> {
    let gray = load_gray(&args.image)?;
    let (width, height) = (config.session.paper_width, config.session.paper_height);
    let mut detector = PaperDetector::new(config.paper.clone());

    let mut output = PaperOutput {
        found: detector.detect_frame(&gray),
        corners: detector.quad().map(|q| *q.corners()),
        width,
        height,
        forward: None,
        inverse: None,
    };
    if output.found {
        let t = detector.compute_transform(width, height)?;
        output.forward = Some(matrix3_to_array(&t.forward));
        output.inverse = Some(matrix3_to_array(&t.inverse));
        if let Some(path) = &args.rectified {
            detector.rectify_source(width, height)?.save(path)?;
            tracing::info!("Rectified sheet written to {}", path.display());
        }
    } else {
        tracing::warn!("No paper found");
    }
    write_json(&args.out, &output)
}

// ── controls ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ControlsOutput<'a> {
    rectified: bool,
    controls: &'a ControlSet,
    events: Vec<ControlEvent>,
}

fn run_controls(args: &ControlsArgs, config: &PipelineConfig) -> CliResult<()> {
    let mut sheet = load_gray(&args.image)?;
    if args.rectify {
        let mut detector = PaperDetector::new(config.paper.clone());
        if !detector.detect_frame(&sheet) {
            return Err("no paper found in image".into());
        }
        sheet = detector.rectify_source(config.session.paper_width, config.session.paper_height)?;
    }

    let edges = edge_map(&sheet, &config.edge_map);
    let mut log = EventLog::new();
    let controls = ShapeClassifier::new(config.classifier.clone()).classify(&edges, &mut log);
    for (kind, count) in controls.summary() {
        tracing::info!("{}: {}", kind.plural(), count);
    }
    write_json(
        &args.out,
        &ControlsOutput {
            rectified: args.rectify,
            controls: &controls,
            events: log.drain(),
        },
    )
}

// ── fingertip ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct FingertipOutput {
    paper_found: bool,
    camera: Option<[f64; 2]>,
    paper: Option<[f64; 2]>,
    peaks: usize,
}

fn run_fingertip(args: &FingertipArgs, config: &PipelineConfig) -> CliResult<()> {
    let gray = load_gray(&args.image)?;
    let mask = load_gray(&args.mask)?;
    if mask.dimensions() != gray.dimensions() {
        return Err("mask and image sizes differ".into());
    }

    let mut detector = PaperDetector::new(config.paper.clone());
    let paper_found = detector.detect_frame(&gray);
    let reference = if paper_found {
        detector.paper_polygon()
    } else {
        tracing::warn!("No paper found; accepting fingertips anywhere in the frame");
        let (w, h) = (gray.width() as f64, gray.height() as f64);
        vec![[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
    };

    let mut tracker = FingertipTracker::new(config.fingertip.clone());
    tracker.detect(&mask, &reference);
    let camera = tracker.fingertip();
    let paper = match (camera, paper_found) {
        (Some(p), true) => {
            detector.compute_transform(config.session.paper_width, config.session.paper_height)?;
            Some(detector.map_point(p, MapDirection::CameraToPaper)?)
        }
        _ => None,
    };
    write_json(
        &args.out,
        &FingertipOutput {
            paper_found,
            camera,
            paper,
            peaks: tracker.peaks().len(),
        },
    )
}

// ── align ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AlignOutput<'a> {
    alignment: &'a ProjectorAlignment,
    matrix: [[f64; 3]; 3],
}

fn run_align(args: &AlignArgs, config: &PipelineConfig) -> CliResult<()> {
    if args.points.len() != ProjectorAlignment::POINTS {
        return Err(format!(
            "expected {} --point values, got {}",
            ProjectorAlignment::POINTS,
            args.points.len()
        )
        .into());
    }
    let mut alignment =
        ProjectorAlignment::new(config.session.projector_width, config.session.projector_height);
    for &p in &args.points {
        alignment.add_point(p);
    }
    let matrix = matrix3_to_array(alignment.compute()?);
    write_json(
        &args.out,
        &AlignOutput {
            alignment: &alignment,
            matrix,
        },
    )
}

