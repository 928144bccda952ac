//! V4L2 frame source.
//!
//! This module provides `V4l2Source` for capturing frames from local V4L2
//! devices (USB webcams, CSI bridges exposed as /dev/videoN).
//!
//! The source negotiates RGB3, YUYV or MJPG with the driver and normalizes
//! every buffer to RGB8 before handing it to the capture loop.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{now_ms, ImageSource, SourceStats};
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate. Drivers may ignore it.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: super::DEFAULT_WIDTH,
            height: super::DEFAULT_HEIGHT,
        }
    }
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    format: PixelFormat,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Result<Self> {
        if !config.device.starts_with("/dev/") {
            return Err(anyhow!(
                "v4l2 device must be a /dev path, got {}",
                config.device
            ));
        }
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;

        let mut negotiated = None;
        for fourcc in [b"RGB3", b"YUYV", b"MJPG"] {
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(fourcc);
            match device.set_format(&format) {
                Ok(applied) => {
                    if let Some(pixel_format) = PixelFormat::from_fourcc(&applied.fourcc.repr) {
                        negotiated = Some((applied, pixel_format));
                        break;
                    }
                }
                Err(err) => {
                    log::debug!(
                        "V4l2Source: {} rejected {}: {}",
                        self.config.device,
                        String::from_utf8_lossy(fourcc),
                        err
                    );
                }
            }
        }
        let (format, pixel_format) = negotiated.ok_or_else(|| {
            anyhow!(
                "v4l2 device {} supports none of RGB3, YUYV, MJPG",
                self.config.device
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.format = pixel_format;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl ImageSource for V4l2Source {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn capture(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let buf = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        let (rgb, width, height) =
            normalize_to_rgb(&buf, self.active_width, self.active_height, self.format)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;
        Frame::from_rgb(rgb, width, height, now_ms())
    }

    /// A device stays streaming until its last capture errored or it goes
    /// quiet past the grace window. A good frame clears the error.
    fn is_streaming(&self) -> bool {
        if self.state.is_none() || self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_device_paths() {
        let config = V4l2Config {
            device: "stub://cam".to_string(),
            ..V4l2Config::default()
        };
        assert!(V4l2Source::new(config).is_err());
    }

    #[test]
    fn unconnected_source_is_not_streaming() -> Result<()> {
        let source = V4l2Source::new(V4l2Config::default())?;
        assert!(!source.is_streaming());
        assert_eq!(source.stats().frames_captured, 0);
        Ok(())
    }
}
