//! livewire-bench: CLI tool for scripted live-wire tracing and cost tuning.
//!
//! Builds the cost matrix of an image with configurable weights, prints
//! per-stage diagnostics, then replays a scripted trace (a seed plus a
//! list of cursor points) through a [`LiveWireSession`]. Useful for:
//!
//! - Tuning the zero-crossing / gradient weights against real images
//! - Measuring cost-matrix build and shortest-path timings
//! - Producing SVG, mask, cut-out and cost-map files without a GUI
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin livewire-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path as FsPath, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use image::Rgba;
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use livewire_core::diagnostics::{BuildDiagnostics, Clock, build_with_diagnostics};
use livewire_core::{
    CostWeights, DynamicImage, FreezeOutcome, LiveWireSession, Pixel, RgbaImage, SearchStats,
    SessionConfig,
};
use serde::Serialize;

/// Scripted live-wire tracing and cost-matrix diagnostics.
///
/// Builds the cost matrix of an image, prints per-stage timing and
/// feature counts, and optionally traces a boundary through the given
/// points.
#[derive(Parser)]
#[command(name = "livewire-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// First seed of the scripted trace, as `X,Y`.
    #[arg(long, value_parser = parse_pixel)]
    seed: Option<Pixel>,

    /// Cursor point to move to and freeze at, as `X,Y`. Repeatable.
    #[arg(long = "point", value_parser = parse_pixel)]
    points: Vec<Pixel>,

    /// Freeze at the first seed after the last point, closing the boundary.
    #[arg(long)]
    close: bool,

    /// Zero-crossing weight.
    #[arg(long, default_value_t = CostWeights::DEFAULT_ZERO_CROSSING)]
    zero_crossing_weight: f64,

    /// Gradient-magnitude weight.
    #[arg(long, default_value_t = CostWeights::DEFAULT_GRADIENT_MAGNITUDE)]
    gradient_magnitude_weight: f64,

    /// Gradient-direction weight.
    #[arg(long, default_value_t = CostWeights::DEFAULT_GRADIENT_DIRECTION)]
    gradient_direction_weight: f64,

    /// Distance in pixels from the first seed within which a freeze closes.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_CLOSURE_THRESHOLD)]
    closure_threshold: f64,

    /// Radius of the cursor snap-to-edge search (0 disables snapping).
    #[arg(long, default_value_t = SessionConfig::DEFAULT_SNAP_RADIUS)]
    snap_radius: u32,

    /// Auto-freeze stability interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_SETTLE_INTERVAL_MS)]
    settle_interval_ms: u64,

    /// Disable freezing on a stable preview.
    #[arg(long)]
    no_auto_freeze: bool,

    /// Padding around the selection when cropping the cut-out.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_CROP_PADDING)]
    crop_padding: u32,

    /// Write the traced boundary as SVG.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write the selection mask as PNG (requires a closed boundary).
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Write the cut-out as PNG with alpha (requires a closed boundary).
    #[arg(long)]
    cutout: Option<PathBuf>,

    /// Write the per-pixel cost map as grayscale PNG.
    #[arg(long)]
    cost_map: Option<PathBuf>,

    /// Write the source image with the boundary and seeds drawn over it.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Log level when `RUST_LOG` is unset (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Full session config as a JSON string.
    ///
    /// When provided, all other weight and session flags are ignored.
    /// The JSON must be a valid `SessionConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

#[allow(clippy::cast_possible_truncation)]
const DEFAULT_SETTLE_INTERVAL_MS: u64 = SessionConfig::DEFAULT_SETTLE_INTERVAL.as_millis() as u64;

/// Parse an `X,Y` pair.
fn parse_pixel(s: &str) -> Result<Pixel, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {s:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in {s:?}: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in {s:?}: {e}"))?;
    Ok(Pixel::new(x, y))
}

/// Build a [`SessionConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SessionConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        SessionConfig {
            closure_threshold: cli.closure_threshold,
            weights: CostWeights {
                zero_crossing: cli.zero_crossing_weight,
                gradient_magnitude: cli.gradient_magnitude_weight,
                gradient_direction: cli.gradient_direction_weight,
            },
            settle_interval: Duration::from_millis(cli.settle_interval_ms),
            auto_freeze: !cli.no_auto_freeze,
            snap_radius: cli.snap_radius,
            crop_padding: cli.crop_padding,
        }
    };
    config.validate().map_err(|e| format!("Invalid config: {e}"))?;
    Ok(config)
}

fn setup_logging(level: &str) -> Result<flexi_logger::LoggerHandle, flexi_logger::FlexiLoggerError> {
    flexi_logger::Logger::try_with_env_or_str(level)?
        .log_to_stderr()
        .start()
}

/// Timings and counters of one scripted trace.
#[derive(Debug, Clone, Serialize)]
struct TraceReport {
    steps: Vec<TraceStep>,
    closed: bool,
    segment_count: usize,
    boundary_pixels: usize,
    selected_pixels: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
struct TraceStep {
    target: Pixel,
    snapped: Option<Pixel>,
    preview_pixels: usize,
    #[serde(with = "seconds")]
    preview_duration: Duration,
    outcome: FreezeOutcome,
    stats: SearchStats,
}

mod seconds {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Replay the scripted clicks and cursor moves.
fn run_trace(session: &mut LiveWireSession, seed: Pixel, points: &[Pixel], close: bool) -> TraceReport {
    let mut steps = Vec::with_capacity(points.len() + 1);
    let outcome = session.on_seed_click(seed);
    log::info!("seed {seed}: {outcome:?}");

    let targets = points
        .iter()
        .copied()
        .chain(close.then_some(seed));
    let start = livewire_core::Instant::now();
    for (i, target) in targets.enumerate() {
        // Space the moves one settle interval apart without polling, so
        // only the explicit clicks freeze.
        let offset = session.config().settle_interval * u32::try_from(i).unwrap_or(u32::MAX);
        let timer = Instant::now();
        let preview = session.on_cursor_move(target, start + offset);
        let preview_duration = timer.elapsed();
        let stats = session.search_stats();
        let snapped = session.cursor();
        let outcome = session.on_seed_click(snapped.unwrap_or(target));
        log::debug!(
            "step {i}: {target} -> {snapped:?}, {} px preview in {preview_duration:?}, {outcome:?}, {stats:?}",
            preview.len()
        );
        steps.push(TraceStep {
            target,
            snapped,
            preview_pixels: preview.len(),
            preview_duration,
            outcome,
            stats,
        });
    }

    TraceReport {
        steps,
        closed: session.is_closed(),
        segment_count: session.frozen_segments().len(),
        boundary_pixels: session.boundary().outline().len(),
        selected_pixels: session.export_mask().map(|m| m.selected_count()),
    }
}

fn print_trace_report(report: &TraceReport) {
    println!();
    println!("Trace\n{}", "=".repeat(60));
    println!(
        "{:<12} {:<12} {:>8} {:>12} {:>10}  Outcome",
        "Target", "Snapped", "Pixels", "Preview", "Settled"
    );
    println!("{}", "-".repeat(70));
    for step in &report.steps {
        let snapped = step
            .snapped
            .map_or_else(|| "-".to_owned(), |p| p.to_string());
        println!(
            "{:<12} {:<12} {:>8} {:>10.3}ms {:>10}  {:?}",
            step.target.to_string(),
            snapped,
            step.preview_pixels,
            step.preview_duration.as_secs_f64() * 1000.0,
            step.stats.settled,
            step.outcome,
        );
    }
    println!();
    println!(
        "Closed: {}  Segments: {}  Boundary pixels: {}",
        report.closed, report.segment_count, report.boundary_pixels
    );
    if let Some(selected) = report.selected_pixels {
        println!("Selected pixels: {selected}");
    }
}

/// Draw the boundary (or the preview while open) and the seeds over `image`.
#[allow(clippy::cast_precision_loss)]
fn draw_overlay(image: &DynamicImage, session: &LiveWireSession) -> RgbaImage {
    const BOUNDARY: Rgba<u8> = Rgba([0, 200, 255, 255]);
    const SEED: Rgba<u8> = Rgba([255, 59, 48, 255]);

    let mut canvas = image.to_rgba8();
    let mut draw_chain = |pixels: &[Pixel]| {
        for pair in pixels.windows(2) {
            draw_line_segment_mut(
                &mut canvas,
                (pair[0].x as f32, pair[0].y as f32),
                (pair[1].x as f32, pair[1].y as f32),
                BOUNDARY,
            );
        }
    };
    for segment in session.frozen_segments() {
        draw_chain(segment.pixels());
    }
    draw_chain(session.preview().pixels());

    for seed in session
        .frozen_segments()
        .iter()
        .filter_map(|s| s.first().copied())
        .chain(session.current_seed())
    {
        draw_hollow_circle_mut(&mut canvas, (seed.x, seed.y), 3, SEED);
    }
    canvas
}

fn write_output(path: &FsPath, what: &str, bytes: &[u8]) {
    match std::fs::write(path, bytes) {
        Ok(()) => eprintln!("{what} written to {} ({} bytes)", path.display(), bytes.len()),
        Err(e) => eprintln!("Error writing {what} to {}: {e}", path.display()),
    }
}

fn encode_or_report(what: &str, result: Result<Vec<u8>, livewire_export::ExportError>) -> Option<Vec<u8>> {
    result
        .map_err(|e| eprintln!("Error encoding {what}: {e}"))
        .ok()
}

fn write_outputs(cli: &Cli, image: &DynamicImage, session: &LiveWireSession) {
    if let Some(ref path) = cli.svg {
        let title = cli
            .image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("bench");
        let config_json = serde_json::to_string(session.config()).ok();
        let metadata = livewire_export::SvgMetadata {
            title: Some(title),
            description: None,
            config_json: config_json.as_deref(),
        };
        let preview = (!session.is_closed()).then(|| session.preview());
        let svg = livewire_export::to_svg(
            session.boundary(),
            preview,
            session.matrix().dimensions(),
            &metadata,
        );
        write_output(path, "SVG", svg.as_bytes());
    }

    if let Some(ref path) = cli.cost_map
        && let Some(bytes) = encode_or_report(
            "cost map",
            livewire_export::gray_to_png(&session.matrix().cost_image()),
        )
    {
        write_output(path, "Cost map", &bytes);
    }

    if let Some(ref path) = cli.overlay
        && let Some(bytes) = encode_or_report(
            "overlay",
            livewire_export::rgba_to_png(&draw_overlay(image, session)),
        )
    {
        write_output(path, "Overlay", &bytes);
    }

    if cli.mask.is_some() || cli.cutout.is_some() {
        let Some(mask) = session.export_mask() else {
            eprintln!("Boundary is not closed; skipping mask and cut-out (use --close)");
            return;
        };
        if let Some(ref path) = cli.mask
            && let Some(bytes) = encode_or_report("mask", livewire_export::mask_to_png(&mask))
        {
            write_output(path, "Mask", &bytes);
        }
        if let Some(ref path) = cli.cutout
            && let Some(cutout) = session.cutout(image)
            && let Some(bytes) = encode_or_report("cut-out", livewire_export::rgba_to_png(&cutout))
        {
            write_output(path, "Cut-out", &bytes);
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logger = match setup_logging(&cli.log_level) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error initializing logging: {e}");
            return ExitCode::FAILURE;
        }
    };

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

    let image = match livewire_core::raster::decode(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        image.width(),
        image.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (matrix, diagnostics) = match build_with_diagnostics(&image, config.weights, &StdClock) {
            Ok(built) => built,
            Err(e) => {
                eprintln!("Cost matrix error: {e}");
                return ExitCode::FAILURE;
            }
        };

        let mut session = match LiveWireSession::new(Arc::new(matrix), config.clone()) {
            Ok(session) => session,
            Err(e) => {
                eprintln!("Session error: {e}");
                return ExitCode::FAILURE;
            }
        };
        let trace = cli
            .seed
            .map(|seed| run_trace(&mut session, seed, &cli.points, cli.close));

        if cli.json {
            let output = serde_json::json!({
                "diagnostics": diagnostics,
                "trace": trace,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
            if let Some(ref trace) = trace {
                print_trace_report(trace);
            }
        }

        // Write files on the first run only.
        if run == 0 {
            write_outputs(&cli, &image, &session);
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
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
type StageExtractor = fn(&BuildDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[BuildDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Grayscale", |d| d.grayscale.duration),
        ("Gradients", |d| d.gradients.duration),
        ("Zero Crossings", |d| d.zero_crossings.duration),
        ("Cost", |d| d.cost.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
