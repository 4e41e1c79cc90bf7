mod calibration;
mod capture;
mod config;
mod input;
mod output;
mod segmentation;
mod tracking;

use anyhow::{Context, Result};
use calibration::{CalibrationSession, TriggerMode};
use capture::{FrameSource, StillImageSource, WebcamCapture};
use clap::{Args, Parser, Subcommand};
use config::{TrackerConfig, DEFAULT_HUE_WINDOW, DEFAULT_MIN_SATURATION, DEFAULT_MIN_VALUE};
use input::ConsoleInput;
use output::{DisplaySink, LogSink, V4L2Output};
use segmentation::regions::DEFAULT_EPSILON;
use segmentation::{ColorSegmenter, Hsv, HueRange};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pick the target color from the live preview and print it as "H S V"
    Calibrate(CalibrateArgs),

    /// Follow the largest region of a color through the video stream
    Track(TrackArgs),
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    camera: u32,

    /// Capture resolution width
    #[arg(long, default_value_t = 640)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 480)]
    capture_height: u32,

    /// Read frames from still images instead of the webcam
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// Cycle through the still images instead of stopping after the last
    #[arg(long)]
    repeat: bool,
}

#[derive(Args, Debug, Clone)]
struct SinkArgs {
    /// v4l2loopback device for the annotated preview
    /// If not provided, results are only logged
    #[arg(short, long)]
    output_device: Option<PathBuf>,

    /// Preview resolution width
    #[arg(long, default_value_t = 640)]
    output_width: u32,

    /// Preview resolution height
    #[arg(long, default_value_t = 480)]
    output_height: u32,
}

#[derive(Args, Debug)]
struct CalibrateArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    sink: SinkArgs,

    /// Radius of the averaging window around the clicked point.
    /// The window spans x-r..=x+r, so radius 4 averages 9x9 pixels
    #[arg(short, long, default_value_t = 4)]
    radius: u32,

    /// Only show the HSV value under the pointer, until quit
    #[arg(long)]
    hover: bool,

    /// Start tracking the picked color once calibration is done
    #[arg(long)]
    then_track: bool,

    /// Hue window handed to the tracker by --then-track
    #[arg(long, default_value_t = DEFAULT_HUE_WINDOW)]
    tracker_window: u8,
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Calibrated hue [0-179]
    hue: u8,

    /// Calibrated saturation [0-255]
    saturation: u8,

    /// Calibrated value [0-255]
    value: u8,

    /// Hue half-width around the calibrated hue
    window: Option<u8>,

    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    sink: SinkArgs,

    /// Explicit range "H,S,V:H,S,V"; give twice for a band that wraps past 179.
    /// Replaces the range derived from the calibrated color
    #[arg(long = "range", value_name = "H,S,V:H,S,V")]
    ranges: Vec<HueRange>,

    /// Lowest saturation that still counts as the target
    #[arg(long, default_value_t = DEFAULT_MIN_SATURATION)]
    min_saturation: u8,

    /// Lowest value (brightness) that still counts as the target
    #[arg(long, default_value_t = DEFAULT_MIN_VALUE)]
    min_value: u8,

    /// Side of the square noise-removal element (odd)
    #[arg(long, default_value_t = 5)]
    kernel: u32,

    /// Polygon approximation distance in pixels
    #[arg(long, default_value_t = DEFAULT_EPSILON)]
    epsilon: f64,

    /// Show the color mask instead of the video in the preview
    #[arg(long)]
    show_mask: bool,

    /// Target frames per second, 0 for unthrottled
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // stdout carries the calibration result
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Calibrate(args) => calibrate(args),
        Command::Track(args) => track(args),
    }
}

fn open_source(args: &SourceArgs) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = if args.images.is_empty() {
        let capture = WebcamCapture::new(args.camera, args.capture_width, args.capture_height)
            .context("Failed to initialize webcam capture")?;
        Box::new(capture)
    } else {
        let still = StillImageSource::open(&args.images, args.repeat)
            .context("Failed to load still images")?;
        Box::new(still)
    };

    let (width, height) = source.resolution();
    tracing::info!("Capture: {}x{}", width, height);
    Ok(source)
}

fn open_sink(args: &SinkArgs, show_mask: bool) -> Result<Box<dyn DisplaySink>> {
    match &args.output_device {
        Some(device) => {
            let output = V4L2Output::new(device, args.output_width, args.output_height, show_mask)
                .context("Failed to initialize v4l2loopback output")?;
            Ok(Box::new(output))
        }
        None => {
            tracing::info!("No output device given, reporting to the log only");
            Ok(Box::new(LogSink::new()))
        }
    }
}

fn calibrate(args: CalibrateArgs) -> Result<()> {
    let mode = if args.hover {
        TriggerMode::Hover
    } else {
        TriggerMode::Click
    };

    let sampled = run_calibration(&args.source, &args.sink, args.radius, mode)?;
    let color = sampled.unwrap_or_default();
    println!("{} {} {}", color.h, color.s, color.v);

    let color = require_sample(sampled)?;
    if args.then_track {
        launch_tracker(color, args.tracker_window, &args.source, &args.sink)?;
    }

    Ok(())
}

/// Drive a calibration session to completion and return the averaged color
///
/// `None` when the operator quit without sampling.
fn run_calibration(
    source_args: &SourceArgs,
    sink_args: &SinkArgs,
    radius: u32,
    mode: TriggerMode,
) -> Result<Option<Hsv>> {
    let mut source = open_source(source_args)?;
    let mut sink = open_sink(sink_args, false)?;

    let session = Arc::new(CalibrationSession::new(mode, radius));
    let handler = Arc::clone(&session);
    let mut keys = ConsoleInput::spawn(move |event| handler.handle_event(event))?;

    let average = session.run(source.as_mut(), sink.as_mut(), &mut keys)?;

    Ok(average.average())
}

/// A calibration that ended without a sample must not reach the tracker:
/// all zeros would match every black, gray and white pixel
fn require_sample(sampled: Option<Hsv>) -> Result<Hsv> {
    sampled.context("Calibration ended without a color sample")
}

/// Replace this process with a tracker for the picked color
#[cfg(unix)]
fn launch_tracker(color: Hsv, window: u8, source: &SourceArgs, sink: &SinkArgs) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().context("Failed to locate own executable")?;
    let mut command = std::process::Command::new(exe);
    command.args(tracker_args(color, window, source, sink));

    tracing::info!("Starting tracker: {:?}", command);
    let err = command.exec();
    Err(err).context("Failed to start tracker")
}

#[cfg(not(unix))]
fn launch_tracker(color: Hsv, window: u8, source: &SourceArgs, sink: &SinkArgs) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate own executable")?;
    let status = std::process::Command::new(exe)
        .args(tracker_args(color, window, source, sink))
        .status()
        .context("Failed to start tracker")?;
    tracing::info!("Tracker exited with {}", status);
    Ok(())
}

/// `track H S V WINDOW` plus the source and preview options in use
fn tracker_args(color: Hsv, window: u8, source: &SourceArgs, sink: &SinkArgs) -> Vec<String> {
    let mut args = vec![
        "track".to_string(),
        color.h.to_string(),
        color.s.to_string(),
        color.v.to_string(),
        window.to_string(),
        "--camera".to_string(),
        source.camera.to_string(),
        "--capture-width".to_string(),
        source.capture_width.to_string(),
        "--capture-height".to_string(),
        source.capture_height.to_string(),
    ];
    for image in &source.images {
        args.push("--image".to_string());
        args.push(image.display().to_string());
    }
    if source.repeat {
        args.push("--repeat".to_string());
    }
    if let Some(device) = &sink.output_device {
        args.push("--output-device".to_string());
        args.push(device.display().to_string());
        args.push("--output-width".to_string());
        args.push(sink.output_width.to_string());
        args.push("--output-height".to_string());
        args.push(sink.output_height.to_string());
    }
    args
}

fn tracker_config(args: &TrackArgs) -> Result<TrackerConfig, config::ConfigError> {
    let ranges = if args.ranges.is_empty() {
        let color = Hsv::new(args.hue, args.saturation, args.value);
        config::band_around(
            color,
            args.window.unwrap_or(DEFAULT_HUE_WINDOW),
            args.min_saturation,
            args.min_value,
        )?
    } else {
        config::explicit_ranges(&args.ranges)?
    };

    TrackerConfig::new(ranges, args.kernel, args.epsilon)
}

fn track(args: TrackArgs) -> Result<()> {
    let config = tracker_config(&args).context("Invalid tracker configuration")?;
    let segmenter = ColorSegmenter::new(&config);

    let mut source = open_source(&args.source)?;
    let mut sink = open_sink(&args.sink, args.show_mask)?;
    let mut keys = ConsoleInput::spawn(|_| {})?;

    tracing::info!(
        "Tracking around {} (kernel {}, epsilon {})",
        Hsv::new(args.hue, args.saturation, args.value),
        config.element.size(),
        config.epsilon
    );

    tracking::run_tracking(
        &segmenter,
        source.as_mut(),
        sink.as_mut(),
        &mut keys,
        Some(args.fps),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmentation::{RangeSet, SampleAverage};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("huetrack").chain(args.iter().copied())).unwrap()
    }

    fn track_args(args: &[&str]) -> TrackArgs {
        match parse(args).command {
            Command::Track(track) => track,
            other => panic!("expected track, got {other:?}"),
        }
    }

    #[test]
    fn test_track_accepts_hsv_and_optional_window() {
        let args = track_args(&["track", "3", "200", "180"]);
        assert_eq!((args.hue, args.saturation, args.value), (3, 200, 180));
        assert_eq!(args.window, None);

        let args = track_args(&["track", "100", "200", "180", "12"]);
        assert_eq!(args.window, Some(12));
    }

    #[test]
    fn test_track_config_wraps_red() {
        let config = tracker_config(&track_args(&["track", "2", "200", "200", "8"])).unwrap();
        assert!(matches!(config.ranges, RangeSet::Wrapped(_, _)));
        assert_eq!(config.element.size(), 5);
    }

    #[test]
    fn test_explicit_ranges_replace_derived_band() {
        let config = tracker_config(&track_args(&[
            "track",
            "0",
            "0",
            "0",
            "--range",
            "97,50,50:105,255,255",
        ]))
        .unwrap();
        let RangeSet::Single(range) = config.ranges else {
            panic!("expected a single range");
        };
        assert_eq!(range.low(), Hsv::new(97, 50, 50));
    }

    #[test]
    fn test_malformed_range_rejected_at_parse_time() {
        let result = Cli::try_parse_from(["huetrack", "track", "0", "0", "0", "--range", "105,50,50:97,255,255"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_even_kernel_is_a_config_error() {
        let args = track_args(&["track", "60", "200", "200", "--kernel", "4"]);
        assert_eq!(
            tracker_config(&args).unwrap_err(),
            config::ConfigError::InvalidKernel(4)
        );
    }

    #[test]
    fn test_tracker_args_round_trip_through_cli() {
        let source = SourceArgs {
            camera: 2,
            capture_width: 320,
            capture_height: 240,
            images: vec![PathBuf::from("snap.png")],
            repeat: true,
        };
        let sink = SinkArgs {
            output_device: None,
            output_width: 640,
            output_height: 480,
        };
        let argv = tracker_args(Hsv::new(120, 180, 90), 6, &source, &sink);
        let args = track_args(&argv.iter().map(String::as_str).collect::<Vec<_>>());

        assert_eq!((args.hue, args.saturation, args.value, args.window), (120, 180, 90, Some(6)));
        assert_eq!(args.source.camera, 2);
        assert_eq!(args.source.images, vec![PathBuf::from("snap.png")]);
        assert!(args.source.repeat);
        assert!(args.sink.output_device.is_none());
    }

    #[test]
    fn test_unsampled_calibration_is_an_error() {
        assert!(require_sample(None).is_err());

        let mut average = SampleAverage::default();
        average.add(Hsv::new(100, 150, 200));
        assert_eq!(require_sample(average.average()).unwrap(), Hsv::new(100, 150, 200));
    }

    #[test]
    fn test_calibrate_defaults() {
        match parse(&["calibrate"]).command {
            Command::Calibrate(args) => {
                assert_eq!(args.radius, 4);
                assert!(!args.hover);
                assert_eq!(args.source.camera, 0);
            }
            other => panic!("expected calibrate, got {other:?}"),
        }
    }
}
