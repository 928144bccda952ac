//! Capture-classify-publish loop.
//!
//! Each fired tick captures one frame, classifies it, publishes the result on
//! the topic its confidence band selects, persists the frame (and a still on
//! the slower cadence), then runs object detection. The loop runs until the
//! source stops streaming, a stop is requested, or capture keeps failing past
//! the retry budget. Every way out disconnects the publisher exactly once.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::classify::Classifier;
use crate::detect::DetectorBackend;
use crate::error::PipelineError;
use crate::event::CaptureEvent;
use crate::frame::Frame;
use crate::ingest::ImageSource;
use crate::persist::SnapshotSink;
use crate::publish::Publisher;
use crate::routing::Topic;
use crate::schedule::{Cadence, CadenceState, Clock, Tick};

pub const DEFAULT_MAX_CAPTURE_RETRIES: u32 = 5;
pub const PREVIEW_FILE_NAME: &str = "latest.jpg";
const BACKOFF_INITIAL: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(5);
const HEALTH_LOG_INTERVAL_MS: i64 = 5_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The image source stopped streaming.
    EndOfStream,
    /// The stop flag was raised (Ctrl-C).
    StopRequested,
    /// Capture failed more times in a row than the retry budget allows.
    SourceExhausted,
}

/// Counters for one run of the loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopReport {
    pub ticks: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub unrouted: u64,
    pub snapshots: u64,
    pub stills: u64,
    pub skipped_frames: u64,
    pub capture_failures: u64,
    pub stop_reason: StopReason,
}

#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub cadence: Cadence,
    /// Directory advertised in the `path` field of every event.
    pub captured_path: String,
    pub max_capture_retries: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl LoopSettings {
    pub fn new(captured_path: impl Into<String>) -> Self {
        Self {
            cadence: Cadence::default(),
            captured_path: captured_path.into(),
            max_capture_retries: DEFAULT_MAX_CAPTURE_RETRIES,
            backoff_initial: BACKOFF_INITIAL,
            backoff_max: BACKOFF_MAX,
        }
    }
}

/// Where frames are written.
pub struct Sinks {
    pub captured: SnapshotSink,
    pub still: SnapshotSink,
    /// Optional live preview, overwritten every tick.
    pub preview: Option<SnapshotSink>,
}

pub struct CaptureLoop<P: Publisher> {
    source: Box<dyn ImageSource>,
    classifier: Box<dyn Classifier>,
    detector: Box<dyn DetectorBackend>,
    publisher: P,
    sinks: Sinks,
    clock: Arc<dyn Clock>,
    settings: LoopSettings,
    stop: Arc<AtomicBool>,
    console: Box<dyn Write + Send>,
    state: LoopState,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    ticks: u64,
    published: u64,
    publish_failures: u64,
    unrouted: u64,
    snapshots: u64,
    stills: u64,
    skipped_frames: u64,
    capture_failures: u64,
}

impl<P: Publisher> CaptureLoop<P> {
    pub fn new(
        source: Box<dyn ImageSource>,
        classifier: Box<dyn Classifier>,
        detector: Box<dyn DetectorBackend>,
        publisher: P,
        sinks: Sinks,
        clock: Arc<dyn Clock>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            source,
            classifier,
            detector,
            publisher,
            sinks,
            clock,
            settings,
            stop: Arc::new(AtomicBool::new(false)),
            console: Box::new(std::io::stdout()),
            state: LoopState::Running,
            counters: Counters::default(),
        }
    }

    /// Share an external stop flag (set from a signal handler).
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Redirect the event echo and detection listing away from stdout.
    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = console;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Run until a terminal condition. A terminated loop cannot be restarted.
    pub fn run(&mut self) -> Result<LoopReport> {
        if self.state == LoopState::Terminated {
            return Err(anyhow!("capture loop already terminated"));
        }

        let start_ms = self.clock.monotonic_ms();
        let mut cadence = CadenceState::new(self.settings.cadence, start_ms);
        let mut consecutive_failures = 0u32;
        let mut last_health_log = start_ms;

        log::info!(
            "capture loop running: source={} classifier={} detector={} cadence={}ms/{}ms",
            self.source.name(),
            self.classifier.name(),
            self.detector.name(),
            self.settings.cadence.capture_interval_ms,
            self.settings.cadence.snapshot_interval_ms
        );

        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Ok(self.terminate(StopReason::StopRequested));
            }

            let now = self.clock.monotonic_ms();
            let tick = cadence.tick(now);
            if !tick.capture {
                self.clock.sleep(cadence.until_next_capture(now));
                continue;
            }
            self.counters.ticks += 1;

            let mut source_failed = false;
            match self.process_tick(self.clock.now_ms(), tick) {
                Ok(()) => {
                    consecutive_failures = 0;
                    if tick.snapshot {
                        cadence.commit_snapshot(now);
                    }
                }
                Err(err) if err.is_source_failure() => {
                    source_failed = true;
                    self.counters.capture_failures += 1;
                    consecutive_failures += 1;
                    if consecutive_failures > self.settings.max_capture_retries {
                        log::error!(
                            "{}; giving up after {} consecutive failures",
                            err,
                            consecutive_failures
                        );
                        return Ok(self.terminate(StopReason::SourceExhausted));
                    }
                    let delay = self.backoff(consecutive_failures);
                    log::warn!(
                        "{} (attempt {}/{}, retrying in {}ms)",
                        err,
                        consecutive_failures,
                        self.settings.max_capture_retries,
                        delay.as_millis()
                    );
                    self.clock.sleep(delay);
                }
                Err(err) => {
                    self.counters.skipped_frames += 1;
                    log::warn!("frame skipped: {}", err);
                }
            }

            if now - last_health_log >= HEALTH_LOG_INTERVAL_MS {
                let stats = self.source.stats();
                log::info!(
                    "source streaming={} frames={} source={} published={} stills={}",
                    self.source.is_streaming(),
                    stats.frames_captured,
                    stats.source,
                    self.counters.published,
                    self.counters.stills
                );
                last_health_log = now;
            }

            // A failed capture is for the retry budget to judge, not end of stream.
            if !source_failed && !self.source.is_streaming() {
                return Ok(self.terminate(StopReason::EndOfStream));
            }
        }
    }

    /// `now` is wall-clock time, used for the event timestamp and file names.
    fn process_tick(&mut self, now: i64, tick: Tick) -> Result<(), PipelineError> {
        let frame = self
            .source
            .capture()
            .map_err(PipelineError::SourceUnavailable)?;

        let result = self
            .classifier
            .classify_frame(&frame)
            .map_err(PipelineError::Inference)?;

        let event = CaptureEvent::new(&self.settings.captured_path, now, &result);
        if let Err(err) = self.route(&event) {
            self.counters.publish_failures += 1;
            log::warn!("{}", err);
        }

        self.persist(&frame, now, tick);
        self.detect(&frame);
        Ok(())
    }

    fn route(&mut self, event: &CaptureEvent) -> Result<(), PipelineError> {
        let Some(topic) = Topic::for_confidence(event.confidence) else {
            self.counters.unrouted += 1;
            log::debug!(
                "confidence {:.3} for {} falls between bands; not published",
                event.confidence,
                event.class_desc
            );
            return Ok(());
        };

        let payload = event.to_json().map_err(crate::error::PublishError::from)?;
        if topic.echo_to_stdout() {
            let _ = writeln!(self.console, "{}", payload);
        }
        self.publisher.publish(topic.as_str(), payload.as_bytes())?;
        self.counters.published += 1;
        log::debug!(
            "published {} ({}, {:.3}) to {}",
            event.name,
            event.class_desc,
            event.confidence,
            topic
        );
        Ok(())
    }

    fn persist(&mut self, frame: &Frame, now: i64, tick: Tick) {
        match self.sinks.captured.write(frame, now) {
            Ok(_) => self.counters.snapshots += 1,
            Err(err) => log::warn!("{}", PipelineError::Persistence(err)),
        }

        if tick.snapshot {
            match self.sinks.still.write(frame, now) {
                Ok(path) => {
                    self.counters.stills += 1;
                    log::debug!("still written to {}", path.display());
                }
                Err(err) => log::warn!("{}", PipelineError::Persistence(err)),
            }
        }

        if let Some(preview) = &self.sinks.preview {
            if let Err(err) = preview.write_named(frame, PREVIEW_FILE_NAME) {
                log::warn!("{}", PipelineError::Persistence(err));
            }
        }
    }

    fn detect(&mut self, frame: &Frame) {
        match self.detector.detect(frame) {
            Ok(detections) => {
                let _ = writeln!(
                    self.console,
                    "detected {} objects in image",
                    detections.len()
                );
                for detection in &detections {
                    let _ = writeln!(self.console, "{}", detection);
                }
            }
            Err(err) => log::warn!("detection failed: {:#}", err),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.settings
            .backoff_initial
            .saturating_mul(factor)
            .min(self.settings.backoff_max)
    }

    fn terminate(&mut self, reason: StopReason) -> LoopReport {
        if let Err(err) = self.publisher.disconnect() {
            log::warn!("publisher disconnect failed: {}", err);
        }
        self.state = LoopState::Terminated;
        let _ = self.console.flush();

        let report = LoopReport {
            ticks: self.counters.ticks,
            published: self.counters.published,
            publish_failures: self.counters.publish_failures,
            unrouted: self.counters.unrouted,
            snapshots: self.counters.snapshots,
            stills: self.counters.stills,
            skipped_frames: self.counters.skipped_frames,
            capture_failures: self.counters.capture_failures,
            stop_reason: reason,
        };
        log::info!("capture loop terminated: {:?}", report);
        report
    }
}
