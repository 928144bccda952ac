//! Synthetic frame source (`stub://`).
//!
//! Produces a moving gradient so downstream classifiers and the motion
//! detector see changing content. With a frame limit the source stops
//! streaming after the last frame, which is how tests drive the loop to
//! its terminal state.

use anyhow::{anyhow, Result};

use super::{now_ms, ImageSource, SourceStats};
use crate::frame::Frame;

pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(name: impl Into<String>, width: u32, height: u32, frame_limit: Option<u64>) -> Self {
        let name = name.into();
        log::info!(
            "SyntheticSource: streaming stub://{} ({}x{}, limit {:?})",
            name,
            width,
            height,
            frame_limit
        );
        Self {
            name,
            width,
            height,
            frame_limit,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        // Shift the scene every 50 frames.
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl ImageSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&mut self) -> Result<Frame> {
        if !self.is_streaming() {
            return Err(anyhow!("stub://{} has ended", self.name));
        }
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::from_rgb(pixels, self.width, self.height, now_ms())
    }

    fn is_streaming(&self) -> bool {
        self.frame_limit
            .map_or(true, |limit| self.frame_count < limit)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: format!("stub://{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_produces_frames() -> Result<()> {
        let mut source = SyntheticSource::new("test", 64, 48, None);
        let frame = source.capture()?;
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.pixels().len(), 64 * 48 * 3);
        assert!(source.is_streaming());
        Ok(())
    }

    #[test]
    fn consecutive_frames_differ() -> Result<()> {
        let mut source = SyntheticSource::new("test", 4, 4, None);
        let a = source.capture()?;
        let b = source.capture()?;
        assert_ne!(a.pixels(), b.pixels());
        Ok(())
    }

    #[test]
    fn frame_limit_ends_stream() -> Result<()> {
        let mut source = SyntheticSource::new("limited", 2, 2, Some(2));
        source.capture()?;
        assert!(source.is_streaming());
        source.capture()?;
        assert!(!source.is_streaming());
        assert!(source.capture().is_err());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }
}
