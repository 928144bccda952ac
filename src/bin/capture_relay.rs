//! capture_relay - classify camera frames and relay the results over MQTT.
//!
//! Every 400ms a frame is captured, classified and published on the topic for
//! its confidence band. Frames are kept under `CAPTURED_IMAGES_PATH`, with a
//! slower stream of stills under `CHECK_STILL_IMAGES_PATH`.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use capture_relay::classify::open_classifier;
use capture_relay::config::{ConfigOverrides, RelayConfig};
use capture_relay::detect::open_detector;
use capture_relay::ingest::open_source;
use capture_relay::persist::SnapshotSink;
use capture_relay::pipeline::{CaptureLoop, Sinks};
use capture_relay::publish::{DryRunPublisher, MqttPublisher, Publisher};
use capture_relay::schedule::SystemClock;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Classify camera frames and publish the results over MQTT"
)]
struct Args {
    /// Input stream URI: stub://name[?frames=N], file://dir, a directory or /dev/videoN.
    /// Empty selects the camera given by --camera.
    #[arg(value_name = "input_URI")]
    input_uri: Option<String>,

    /// Output directory for a live `latest.jpg` preview.
    #[arg(value_name = "output_URI")]
    output_uri: Option<String>,

    /// Classification network (`stub` or a model under --models-dir). [default: googlenet]
    #[arg(long)]
    network: Option<String>,

    /// Camera index or device path. [default: 0]
    #[arg(long)]
    camera: Option<String>,

    /// Capture width. [default: 1280]
    #[arg(long)]
    width: Option<u32>,

    /// Capture height. [default: 720]
    #[arg(long)]
    height: Option<u32>,

    /// Disable the preview output.
    #[arg(long)]
    headless: bool,

    /// Object detector backend: cpu, stub or tract. [default: cpu]
    #[arg(long)]
    detector: Option<String>,

    /// ONNX model for the tract detector.
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Directory holding `{network}.onnx` and `{network}.labels.txt`. [default: models]
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Label file for the classifier.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Detection confidence threshold. [default: 0.5]
    #[arg(long)]
    threshold: Option<f32>,

    /// Log events instead of publishing them.
    #[arg(long)]
    dry_run: bool,

    /// MQTT broker address. [default: localhost:1883]
    #[arg(long)]
    mqtt_broker_addr: Option<String>,

    /// Minimum time between captures, in milliseconds. [default: 400]
    #[arg(long)]
    capture_interval_ms: Option<u64>,

    /// Minimum time between stills, in milliseconds. [default: 2400]
    #[arg(long)]
    snapshot_interval_ms: Option<u64>,

    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "CAPTURE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// UI mode for startup progress (auto, plain, pretty).
    #[arg(long, env = "CAPTURE_RELAY_UI", default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            input_uri: self.input_uri.clone(),
            output_uri: self.output_uri.clone(),
            headless: self.headless,
            network: self.network.clone(),
            camera: self.camera.clone(),
            width: self.width,
            height: self.height,
            models_dir: self.models_dir.clone(),
            labels: self.labels.clone(),
            detector: self.detector.clone(),
            detector_model: self.detector_model.clone(),
            threshold: self.threshold,
            mqtt_broker_addr: self.mqtt_broker_addr.clone(),
            capture_interval_ms: self.capture_interval_ms,
            snapshot_interval_ms: self.snapshot_interval_ms,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprintln!("{}", e.render());
            let _ = Args::command().print_help();
            return Ok(());
        }
    };

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        RelayConfig::load_with(args.config.as_deref(), &args.overrides())?
    };

    let sinks = {
        let _stage = ui.stage("Prepare image directories");
        Sinks {
            captured: SnapshotSink::open(&cfg.captured_dir)?,
            still: SnapshotSink::open(&cfg.still_dir)?,
            preview: cfg.preview_dir.as_ref().map(SnapshotSink::open).transpose()?,
        }
    };

    let source = {
        let _stage = ui.stage("Open image source");
        open_source(&cfg.source).context("failed to open image source")?
    };

    let (classifier, detector) = {
        let _stage = ui.stage("Load models");
        let classifier = open_classifier(&cfg.classifier)
            .with_context(|| format!("failed to load network {}", cfg.classifier.network))?;
        let detector = open_detector(&cfg.detector)
            .with_context(|| format!("failed to load detector {}", cfg.detector.backend))?;
        (classifier, detector)
    };

    let publisher: Box<dyn Publisher> = if args.dry_run {
        log::warn!("dry run: events are logged, not published");
        Box::new(DryRunPublisher::new())
    } else {
        let _stage = ui.stage("Connect to MQTT broker");
        let settings = cfg.mqtt_settings()?;
        Box::new(MqttPublisher::connect(&settings)?)
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")?;
    }

    let mut capture_loop = CaptureLoop::new(
        source,
        classifier,
        detector,
        publisher,
        sinks,
        Arc::new(SystemClock::new()),
        cfg.loop_settings(),
    )
    .with_stop_flag(stop);

    log::info!("capture_relay running (Ctrl-C to stop)");
    let report = capture_loop.run()?;
    ui.summary(&report);
    Ok(())
}
