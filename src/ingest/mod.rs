//! Frame ingestion sources.
//!
//! This module provides the sources the capture loop can poll:
//! - Synthetic `stub://` streams (testing, demos)
//! - Directories of still images (`file://` or a plain directory path)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source yields RGB8 `Frame`s and reports whether it is still
//! streaming. A source that stops streaming ends the capture loop.

pub mod dir;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use dir::ImageDirSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;

/// A polled stream of frames.
pub trait ImageSource {
    fn name(&self) -> &str;

    /// Capture the next frame. May block until one is available.
    fn capture(&mut self) -> Result<Frame>;

    /// False once the stream has ended.
    fn is_streaming(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Input selection, taken from the command line.
#[derive(Clone, Debug)]
pub struct SourceSettings {
    /// Input URI. Empty means "use the camera option".
    pub input_uri: String,
    /// Camera index or device path.
    pub camera: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            input_uri: String::new(),
            camera: "0".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SourceKind {
    Synthetic { name: String, frames: Option<u64> },
    Directory(PathBuf),
    Device(String),
}

pub(crate) fn classify_input(settings: &SourceSettings) -> Result<SourceKind> {
    let uri = settings.input_uri.trim();
    if uri.is_empty() {
        return Ok(SourceKind::Device(camera_device_path(&settings.camera)?));
    }
    if let Some(rest) = uri.strip_prefix("stub://") {
        return parse_stub(rest);
    }
    if let Some(rest) = uri.strip_prefix("file://") {
        return Ok(SourceKind::Directory(PathBuf::from(rest)));
    }
    if let Some(rest) = uri.strip_prefix("v4l2://") {
        return Ok(SourceKind::Device(rest.to_string()));
    }
    if uri.starts_with("/dev/video") {
        return Ok(SourceKind::Device(uri.to_string()));
    }
    if uri.contains("://") {
        return Err(anyhow!("unsupported input URI scheme: {}", uri));
    }
    if Path::new(uri).is_dir() {
        return Ok(SourceKind::Directory(PathBuf::from(uri)));
    }
    Err(anyhow!("input {} is neither a directory nor a device", uri))
}

fn parse_stub(rest: &str) -> Result<SourceKind> {
    let (name, query) = match rest.split_once('?') {
        Some((name, query)) => (name, Some(query)),
        None => (rest, None),
    };
    let mut frames = None;
    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("frames", value)) => {
                    frames = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| anyhow!("stub frames must be an integer: {}", value))?,
                    );
                }
                _ => return Err(anyhow!("unsupported stub option: {}", pair)),
            }
        }
    }
    Ok(SourceKind::Synthetic {
        name: name.to_string(),
        frames,
    })
}

/// Map `--camera` to a device path: an index `N` becomes `/dev/videoN`.
pub fn camera_device_path(camera: &str) -> Result<String> {
    let camera = camera.trim();
    if camera.is_empty() {
        return Err(anyhow!("camera must not be empty"));
    }
    if camera.chars().all(|c| c.is_ascii_digit()) {
        return Ok(format!("/dev/video{}", camera));
    }
    Ok(camera.to_string())
}

/// Open the source selected by `settings`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn ImageSource>> {
    match classify_input(settings)? {
        SourceKind::Synthetic { name, frames } => Ok(Box::new(SyntheticSource::new(
            name,
            settings.width,
            settings.height,
            frames,
        ))),
        SourceKind::Directory(dir) => Ok(Box::new(ImageDirSource::open(
            &dir,
            settings.width,
            settings.height,
        )?)),
        SourceKind::Device(device) => open_device(device, settings),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(device: String, settings: &SourceSettings) -> Result<Box<dyn ImageSource>> {
    let mut source = V4l2Source::new(V4l2Config {
        device,
        target_fps: 10,
        width: settings.width,
        height: settings.height,
    })?;
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(device: String, _settings: &SourceSettings) -> Result<Box<dyn ImageSource>> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        device
    ))
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
