//! fastellipse CLI: ellipse extraction from binary edge images.
//!
//! Usage:
//!   fastellipse extract --image edges.png --out ellipses.json
//!   fastellipse extract --image edges.png --out run.json --full --overlay overlay.png
//!   fastellipse default-config --out config.json

use clap::{Args, Parser, Subcommand};
use fastellipse::{Ellipse, EllipseExtractor, ExtractionConfig, ExtractionResult};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};
use serde::Serialize;
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(
    name = "fastellipse",
    about = "Fast ellipse extraction from binary edge images",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract ellipses from an edge image.
    Extract(CliExtractArgs),

    /// Print or write the default extraction configuration as JSON.
    DefaultConfig(CliDefaultConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct CliExtractArgs {
    /// Path to the input edge image (non-zero pixels are edges).
    #[arg(long)]
    image: PathBuf,

    /// Path to write the JSON result.
    #[arg(long)]
    out: PathBuf,

    /// Optional JSON extraction config. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the minimum circumference coverage of reported ellipses.
    #[arg(long)]
    min_coverage: Option<f32>,

    /// Write every intermediate stage (segments, lines, arcs, extended arcs).
    #[arg(long)]
    full: bool,

    /// Optional PNG with the detected ellipses drawn over the input.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliDefaultConfigArgs {
    /// Write to this path instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract(args) => run_extract(&args),
        Commands::DefaultConfig(args) => run_default_config(&args),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

// ── extract ──────────────────────────────────────────────────────────────

/// Compact output: ellipses only.
#[derive(Serialize)]
struct EllipseReport<'a> {
    image_size: [u32; 2],
    ellipses: &'a [Ellipse],
}

fn load_config(path: Option<&Path>) -> CliResult<ExtractionConfig> {
    let Some(path) = path else {
        return Ok(ExtractionConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("Failed to read config {}: {}", path.display(), e).into() })?;
    let config = serde_json::from_str(&text)
        .map_err(|e| -> CliError { format!("Invalid config {}: {}", path.display(), e).into() })?;
    Ok(config)
}

fn run_extract(args: &CliExtractArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(min_coverage) = args.min_coverage {
        config.merge.min_coverage = min_coverage;
    }

    tracing::info!("Loading {}", args.image.display());
    let dyn_img = image::open(&args.image).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", args.image.display(), e).into()
    })?;
    let gray = dyn_img.to_luma8();
    let (w, h) = gray.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let extractor = EllipseExtractor::with_config(config);
    let result = extractor.extract(&gray);

    tracing::info!(
        "{} segments, {} lines, {} arcs, {} extended arcs",
        result.segments.total_len(),
        result.lines.total_len(),
        result.arcs.total_len(),
        result.ext_arcs.len()
    );
    for (i, e) in result.ellipses_by_coverage().iter().enumerate() {
        tracing::debug!(
            "ellipse {}: center=({:.1}, {:.1}) a={:.1} b={:.1} t={:.3} coverage={:.2}",
            i,
            e.params.x,
            e.params.y,
            e.params.a,
            e.params.b,
            e.params.t,
            e.coverage
        );
    }

    let json = if args.full {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string_pretty(&EllipseReport {
            image_size: result.image_size,
            ellipses: &result.ellipses,
        })?
    };
    std::fs::write(&args.out, json)?;
    tracing::info!(
        "{} ellipses written to {}",
        result.ellipses.len(),
        args.out.display()
    );

    if let Some(overlay) = &args.overlay {
        let mut canvas = dyn_img.to_rgb8();
        draw_overlay(&mut canvas, &result);
        canvas.save(overlay).map_err(|e| -> CliError {
            format!("Failed to write overlay {}: {}", overlay.display(), e).into()
        })?;
        tracing::info!("Overlay written to {}", overlay.display());
    }

    Ok(())
}

const ELLIPSE_COLOR: Rgb<u8> = Rgb([255, 64, 32]);
const CENTER_COLOR: Rgb<u8> = Rgb([32, 220, 64]);

fn draw_overlay(canvas: &mut RgbImage, result: &ExtractionResult) {
    for e in &result.ellipses {
        let n = (e.params.circumference() / 2.0).clamp(32.0, 720.0) as usize;
        let pts = e.params.sample_points(n);
        for (i, p) in pts.iter().enumerate() {
            let q = pts[(i + 1) % pts.len()];
            draw_line_segment_mut(
                canvas,
                (p[0] as f32, p[1] as f32),
                (q[0] as f32, q[1] as f32),
                ELLIPSE_COLOR,
            );
        }
        draw_cross_mut(
            canvas,
            CENTER_COLOR,
            e.params.x.round() as i32,
            e.params.y.round() as i32,
        );
    }
}

// ── default-config ───────────────────────────────────────────────────────

fn run_default_config(args: &CliDefaultConfigArgs) -> CliResult<()> {
    let json = serde_json::to_string_pretty(&ExtractionConfig::default())?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Default config written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
