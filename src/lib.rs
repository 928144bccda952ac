//! capture-relay
//!
//! Captures frames from a camera or stream, classifies each one and relays
//! the result to an MQTT broker on a topic chosen by confidence band.
//!
//! # Module Structure
//!
//! - `ingest`: Image sources (synthetic, image directories, V4L2 cameras)
//! - `classify`: Whole-frame classifiers and label tables
//! - `detect`: Object detectors run after classification
//! - `routing`: Confidence bands to topic strings
//! - `schedule`: Capture and snapshot cadence, clocks
//! - `publish`: MQTT and dry-run publishers
//! - `persist`: JPEG snapshot sinks
//! - `pipeline`: The capture-classify-publish loop
//! - `config`: Layered configuration (file, environment, command line)

pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod event;
pub mod frame;
pub mod ingest;
pub mod persist;
pub mod pipeline;
pub mod publish;
pub mod routing;
pub mod schedule;

pub use classify::{open_classifier, Classifier, ClassifierSettings, StubClassifier};
pub use config::{ConfigOverrides, RelayConfig};
pub use detect::{open_detector, Detection, DetectorBackend, DetectorSettings};
pub use error::{PipelineError, PublishError};
pub use event::{CaptureEvent, ClassificationResult};
pub use frame::Frame;
pub use ingest::{open_source, ImageSource, SourceSettings, SyntheticSource};
pub use persist::SnapshotSink;
pub use pipeline::{CaptureLoop, LoopReport, LoopSettings, Sinks, StopReason};
pub use publish::{DryRunPublisher, MqttPublisher, Publisher};
pub use routing::Topic;
pub use schedule::{Cadence, CadenceState, Clock, ManualClock, SystemClock};
