//! docedge: detect document-like quadrilaterals in image files.
//!
//! Reads an image, runs the detection pipeline with configurable
//! parameters, prints the accepted candidates and optionally writes the
//! annotated frame and per-stage diagnostics. Useful for:
//!
//! - Tuning the threshold, size minimums and approximation tolerance
//! - Seeing why a contour was rejected (`-v` logs every decision)
//! - Measuring per-stage durations
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin docedge -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser, ValueEnum};
use docedge_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use docedge_pipeline::{Candidate, Color, ContourMode, PipelineConfig, StagedResult};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Detect documents in an image and outline them.
///
/// Runs grayscale conversion, thresholding, contour extraction and
/// polygon filtering, then prints every accepted candidate.
#[derive(Parser)]
#[command(name = "docedge", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Write the annotated image to this path (format from extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Intensity cutoff; pixels strictly brighter become foreground.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BINARY_THRESHOLD)]
    binary_threshold: u8,

    /// Value written for foreground pixels of the binary map.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BINARY_MAX_VALUE)]
    binary_max_value: u8,

    /// Contours with an area at or below this are discarded.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_AREA)]
    min_area: f64,

    /// Contours with a perimeter at or below this are discarded.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_PERIMETER)]
    min_perimeter: f64,

    /// Smallest accepted polygon vertex count.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_VERTICES)]
    min_vertices: usize,

    /// Largest accepted polygon vertex count.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_VERTICES)]
    max_vertices: usize,

    /// Polygon approximation tolerance in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_APPROX_EPSILON)]
    approx_epsilon: f64,

    /// Cap the tolerance at this fraction of the shorter side of each
    /// contour's bounding box.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_APPROX_EPSILON_EXTENT_CAP)]
    epsilon_extent_cap: f64,

    /// Use `--approx-epsilon` for every contour regardless of its size.
    #[arg(long)]
    no_epsilon_cap: bool,

    /// Which contours to retrieve.
    #[arg(long, value_enum, default_value_t = Mode::TwoLevel)]
    contour_mode: Mode,

    /// Outline color as `R,G,B` or `#RRGGBB`.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STROKE_COLOR)]
    stroke_color: Color,

    /// Outline width in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STROKE_THICKNESS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    stroke_thickness: u32,

    /// Also outline each candidate's convex hull.
    #[arg(long)]
    draw_hulls: bool,

    /// Hull outline color as `R,G,B` or `#RRGGBB`.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STROKE_COLOR)]
    hull_color: Color,

    /// Hull outline width in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HULL_THICKNESS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    hull_thickness: u32,

    /// Load the full pipeline config from a JSON file.
    ///
    /// Missing fields take their defaults. All other pipeline parameter
    /// flags are ignored.
    #[arg(long, conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Full pipeline config as a JSON string.
    ///
    /// Missing fields take their defaults. All other pipeline parameter
    /// flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Print per-stage diagnostics.
    #[arg(long)]
    diagnostics: bool,

    /// Output JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    ///
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Contour retrieval mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Outer boundaries and their holes.
    TwoLevel,
    /// Outermost boundaries only.
    External,
    /// Every boundary, no hierarchy.
    List,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config` or `--config-json` is provided, the JSON is parsed
/// directly and all individual parameter flags are ignored. Otherwise,
/// a config is assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref path) = cli.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        return serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()));
    }
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        binary_threshold: cli.binary_threshold,
        binary_max_value: cli.binary_max_value,
        min_area: cli.min_area,
        min_perimeter: cli.min_perimeter,
        min_vertices: cli.min_vertices,
        max_vertices: cli.max_vertices,
        approx_epsilon: cli.approx_epsilon,
        approx_epsilon_extent_cap: (!cli.no_epsilon_cap).then_some(cli.epsilon_extent_cap),
        contour_mode: match cli.contour_mode {
            Mode::TwoLevel => ContourMode::TwoLevel,
            Mode::External => ContourMode::External,
            Mode::List => ContourMode::List,
        },
        stroke_color: cli.stroke_color,
        stroke_thickness: cli.stroke_thickness,
        draw_hulls: cli.draw_hulls,
        hull_color: cli.hull_color,
        hull_thickness: cli.hull_thickness,
    })
}

/// Install the stderr log subscriber.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    info!(path = %cli.image_path.display(), bytes = image_bytes.len(), "image loaded");
    debug!(?config, "pipeline config");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (staged, diagnostics) = match docedge_pipeline::diagnostics::detect_bytes_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
        ) {
            Ok(output) => output,
            Err(e) => {
                if cli.json
                    && let Ok(json) = serde_json::to_string_pretty(&serde_json::json!({ "error": e }))
                {
                    println!("{json}");
                }
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Candidates and the annotated image are the same on every run.
        if run == 0 {
            if let Err(msg) = print_candidates(&staged, cli.json) {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
            if let Some(ref path) = cli.output {
                if let Err(e) = staged.annotated.as_dynamic().save(path) {
                    eprintln!("Error writing {}: {e}", path.display());
                    return ExitCode::FAILURE;
                }
                eprintln!("Annotated image written to {}", path.display());
            }
        }

        if cli.diagnostics {
            if cli.json {
                match serde_json::to_string_pretty(&diagnostics) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error serializing diagnostics: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("{}", diagnostics.report());
            }
        }

        all_diagnostics.push(diagnostics);
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Print the accepted candidates as JSON or one line each.
fn print_candidates(staged: &StagedResult, json: bool) -> Result<(), String> {
    let candidates = staged.candidates();
    if json {
        let json = serde_json::to_string_pretty(candidates)
            .map_err(|e| format!("Error serializing candidates: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "{}x{}: {} contour(s), {} candidate(s)",
        staged.dimensions.width,
        staged.dimensions.height,
        staged.contours.len(),
        candidates.len(),
    );
    for candidate in candidates {
        println!("  {}", describe(candidate));
    }
    Ok(())
}

/// One-line summary of a candidate.
fn describe(candidate: &Candidate) -> String {
    let corners: Vec<String> = candidate
        .polygon
        .points()
        .iter()
        .map(|p| format!("({},{})", p.x, p.y))
        .collect();
    let bb = candidate.bounding_box;
    format!(
        "#{} {} vertices{} area={:.0} perimeter={:.1} box={}x{}+{}+{} [{}]",
        candidate.contour_index,
        candidate.vertex_count(),
        if candidate.is_convex() { "" } else { " (concave)" },
        candidate.area,
        candidate.perimeter,
        bb.width,
        bb.height,
        bb.x,
        bb.y,
        corners.join(" "),
    )
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let stages: &[(&str, StageExtractor)] = &[
        ("Decode", |d| d.decode.as_ref().map(|s| s.duration)),
        ("Grayscale", |d| Some(d.grayscale.duration)),
        ("Threshold", |d| Some(d.threshold.duration)),
        ("Contours", |d| Some(d.contours.duration)),
        ("Filter", |d| Some(d.filter.duration)),
        ("Render", |d| Some(d.render.duration)),
        ("Total", |d| Some(d.total_duration)),
    ];

    println!("{:<24} {:>10} {:>10} {:>10}", "Stage", "Mean", "Min", "Max");
    println!("{}", "-".repeat(58));

    for (name, extract) in stages {
        let samples: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extract)
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        if samples.is_empty() {
            continue;
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!("{name:<24} {mean:>8.3}ms {min:>8.3}ms {max:>8.3}ms");
    }
}
