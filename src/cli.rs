//! depthcam - command line front end.
//!
//! Subcommands map onto the mode runners in [`crate::app`]. Every flag is
//! optional and, when given, overrides the matching configuration key after
//! the defaults, the override file and the environment have been applied.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use crate::app::{self, RealtimeClock, RunSummary};
use crate::config::{Config, ConfigSource, LoggingSettings, Mode, Overrides};
use crate::device::{self, DeviceInfo, PipelineSpec};
use crate::display::{DisplaySurface, HeadlessDisplay, SnapshotDisplay, StdinKeys};
use crate::record::DefaultEncoderFactory;
use crate::shutdown::{InterruptFlag, ShutdownController};
use crate::ui::Ui;

#[derive(Parser, Debug)]
#[command(
    name = "depthcam",
    version,
    about = "Record, preview and run spatial object detection on a stereo depth camera"
)]
struct Cli {
    /// Override configuration file (YAML or JSON)
    #[arg(short, long, global = true, env = "DEPTHCAM_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Device URL (stub://... selects the synthetic camera)
    #[arg(long, global = true, value_name = "URL")]
    device: Option<String>,

    /// Log filter (error|warn|info|debug|trace or an env_logger spec)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct CaptureArgs {
    /// Directory the video files are written to
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Run time in seconds (detect/show-video: 0 runs until quit)
    #[arg(short, long, value_name = "SECONDS")]
    duration: Option<u64>,

    /// Camera frame rate
    #[arg(short, long)]
    fps: Option<u32>,
}

#[derive(Args, Debug, Default)]
struct PreviewArgs {
    /// Save preview windows as PNG files in DIR instead of discarding them
    #[arg(long, value_name = "DIR")]
    preview_dir: Option<PathBuf>,

    /// Save one preview snapshot every N frames
    #[arg(long, default_value_t = 15, value_name = "N")]
    preview_every: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record timestamped colour and colourised depth video
    Record {
        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Run object detection with a distance overlay (type q + Enter to quit)
    Detect {
        #[command(flatten)]
        capture: CaptureArgs,

        /// Minimum detection confidence (0.0 - 1.0)
        #[arg(long, value_name = "THRESHOLD")]
        confidence: Option<f32>,

        /// Save the annotated video
        #[arg(short, long)]
        save_video: bool,

        /// Hide the detected objects panel
        #[arg(long)]
        no_info: bool,

        #[command(flatten)]
        preview: PreviewArgs,
    },

    /// Check the connection to the device and print its description
    CheckConnection {
        /// Print the description as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show live colour and depth video (type q + Enter to quit)
    ShowVideo {
        #[command(flatten)]
        capture: CaptureArgs,

        #[command(flatten)]
        preview: PreviewArgs,
    },

    /// Run the mode named by `mode` in the configuration
    Run {
        #[command(flatten)]
        preview: PreviewArgs,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            init_logging(&LoggingSettings {
                level: "info".to_string(),
                file: None,
            })?;
            return Err(err);
        }
    };
    init_logging(&config.logging)?;
    log::debug!("resolved configuration: {:?}", config);

    let ui = Ui::from_args(Some(&cli.ui), std::io::stderr().is_terminal());

    match &cli.command {
        Command::Record { .. } => run_record(&config, &ui),
        Command::Detect {
            capture, preview, ..
        } => run_detect(&config, &ui, preview, run_limit(capture)),
        Command::CheckConnection { json } => run_check_connection(&config, *json),
        Command::ShowVideo { capture, preview } => {
            run_show_video(&config, &ui, preview, run_limit(capture))
        }
        Command::Run { preview } => match config.mode {
            Mode::Record => run_record(&config, &ui),
            Mode::ObjectDetection => run_detect(&config, &ui, preview, None),
        },
    }
}

// ----------------------------------------------------------------------------
// Configuration and logging
// ----------------------------------------------------------------------------

fn load_config(cli: &Cli) -> Result<Config> {
    let source = ConfigSource::from_arg_or_env(cli.config.clone());
    let overrides = cli_overrides(cli);
    let tree = (!overrides.is_empty()).then(|| overrides.into_tree());
    Config::load(&source, tree.as_ref()).context("failed to load configuration")
}

fn cli_overrides(cli: &Cli) -> Overrides {
    let mut overrides = Overrides::new();
    if let Some(url) = &cli.device {
        overrides.set("device.url", url.as_str());
    }
    if let Some(level) = &cli.log_level {
        overrides.set("logging.level", level.as_str());
    }

    let capture = match &cli.command {
        Command::Record { capture } => Some((capture, true)),
        Command::Detect { capture, .. } | Command::ShowVideo { capture, .. } => Some((capture, false)),
        Command::CheckConnection { .. } | Command::Run { .. } => None,
    };
    if let Some((capture, is_record)) = capture {
        if let Some(dir) = &capture.output_dir {
            overrides.set("output.base_path", dir.to_string_lossy().into_owned());
        }
        if let Some(fps) = capture.fps {
            overrides.set("camera.fps", fps as u64);
        }
        if is_record {
            if let Some(seconds) = capture.duration {
                overrides.set("camera.recording_time", seconds);
            }
        }
    }

    if let Command::Detect {
        confidence,
        save_video,
        no_info,
        ..
    } = &cli.command
    {
        if let Some(threshold) = confidence {
            overrides.set("detection.confidence_threshold", *threshold as f64);
        }
        if *save_video {
            overrides.set("detection.save_video", true);
        }
        if *no_info {
            overrides.set("detection.display_info", false);
        }
    }
    overrides
}

fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.level.as_str()),
    );
    if let Some(path) = &settings.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    // a logger may already be installed when called twice in one process
    let _ = builder.try_init();
    Ok(())
}

/// Detect/show-video duration; zero or absent runs until quit.
fn run_limit(capture: &CaptureArgs) -> Option<Duration> {
    capture
        .duration
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

fn controller() -> Result<ShutdownController> {
    let interrupt = InterruptFlag::install_ctrlc()?;
    Ok(ShutdownController::new(interrupt))
}

fn open_display(preview: &PreviewArgs) -> Result<Box<dyn DisplaySurface>> {
    let keys = if std::io::stdin().is_terminal() {
        Some(StdinKeys::spawn()?)
    } else {
        None
    };
    if let Some(dir) = &preview.preview_dir {
        let mut display = SnapshotDisplay::create(dir, preview.preview_every)?;
        if let Some(keys) = keys {
            display = display.with_stdin(keys);
        }
        return Ok(Box::new(display));
    }
    let mut display = HeadlessDisplay::new();
    if let Some(keys) = keys {
        display = display.with_stdin(keys);
    }
    Ok(Box::new(display))
}

fn run_record(config: &Config, ui: &Ui) -> Result<()> {
    let mut controller = controller()?;
    let device = device::open(&config.device.url, &PipelineSpec::recording(config))
        .context("failed to open device")?;
    let mut clock = RealtimeClock::new(config.camera.fps);

    let summary = {
        let stage = ui.stage(&format!(
            "Recording for {} seconds",
            config.camera.recording_time.as_secs()
        ));
        app::record(
            config,
            device,
            Box::new(DefaultEncoderFactory),
            &mut clock,
            &mut controller,
            Some(&stage),
        )
        .context("recording failed")?
    };
    report(&summary, "Recording completed successfully");
    Ok(())
}

fn run_detect(config: &Config, ui: &Ui, preview: &PreviewArgs, limit: Option<Duration>) -> Result<()> {
    let mut controller = controller()?;
    let display = open_display(preview)?;
    let device = device::open(&config.device.url, &PipelineSpec::detection(config))
        .context("failed to open device")?;
    let mut clock = RealtimeClock::new(config.camera.fps);

    let summary = {
        let stage = ui.stage("Object detection");
        app::detect(
            config,
            device,
            display,
            Box::new(DefaultEncoderFactory),
            &mut clock,
            &mut controller,
            limit,
            Some(&stage),
        )
        .context("object detection failed")?
    };
    report(&summary, "Object detection finished");
    Ok(())
}

fn run_show_video(config: &Config, ui: &Ui, preview: &PreviewArgs, limit: Option<Duration>) -> Result<()> {
    let mut controller = controller()?;
    let display = open_display(preview)?;
    let device = device::open(&config.device.url, &PipelineSpec::preview(config))
        .context("failed to open device")?;
    let mut clock = RealtimeClock::new(config.camera.fps);

    let summary = {
        let stage = ui.stage("Live preview");
        app::show_video(config, device, display, &mut clock, &mut controller, limit, Some(&stage))
            .context("video preview failed")?
    };
    report(&summary, "Video preview closed");
    Ok(())
}

fn run_check_connection(config: &Config, json: bool) -> Result<()> {
    let device = device::open(&config.device.url, &PipelineSpec::probe(config))
        .context("failed to connect to device")?;
    let info = app::check_connection(device)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_device_info(&info);
    }
    Ok(())
}

fn print_device_info(info: &DeviceInfo) {
    println!("Device: {}", info.name);
    println!("USB speed: {}", info.usb_speed);
    println!("Connected cameras: {}", info.connected_cameras.join(", "));
    let pairs: Vec<String> = info
        .stereo_pairs
        .iter()
        .map(|(left, right)| format!("{left}/{right}"))
        .collect();
    println!("Stereo pairs: {}", pairs.join(", "));
}

fn report(summary: &RunSummary, headline: &str) {
    println!("{headline}: {} frames ({:?})", summary.frames, summary.reason);
    for path in &summary.outputs {
        println!("  wrote {}", path.display());
    }
    for failure in &summary.release_failures {
        eprintln!("  warning: {failure}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_yaml::Value;

    fn lookup<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
        path.iter().try_fold(tree, |node, key| node.get(*key))
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_flags_become_overrides() {
        let cli = Cli::try_parse_from(["depthcam", "record", "-o", "/tmp/out", "-d", "5", "-f", "15"]).unwrap();
        let tree = cli_overrides(&cli).into_tree();
        assert_eq!(lookup(&tree, &["output", "base_path"]), Some(&Value::from("/tmp/out")));
        assert_eq!(lookup(&tree, &["camera", "recording_time"]), Some(&Value::from(5u64)));
        assert_eq!(lookup(&tree, &["camera", "fps"]), Some(&Value::from(15u64)));
    }

    #[test]
    fn detect_duration_is_a_run_limit() {
        let cli = Cli::try_parse_from(["depthcam", "detect", "-d", "0", "--confidence", "0.7", "-s"]).unwrap();
        let tree = cli_overrides(&cli).into_tree();
        assert!(lookup(&tree, &["camera", "recording_time"]).is_none());
        assert_eq!(lookup(&tree, &["detection", "save_video"]), Some(&Value::from(true)));
        let Command::Detect { capture, .. } = &cli.command else {
            panic!("expected detect");
        };
        assert_eq!(run_limit(capture), None);
    }

    #[test]
    fn unset_flags_leave_config_alone() {
        let cli = Cli::try_parse_from(["depthcam", "check-connection", "--json"]).unwrap();
        assert!(cli_overrides(&cli).is_empty());
    }
}
