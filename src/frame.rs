//! Captured frame buffer.
//!
//! A `Frame` holds tightly packed RGB8 pixels plus the wall-clock instant it
//! was captured. Frames live for a single loop iteration: the classifier,
//! detector and snapshot sinks borrow them, then they are dropped.

use std::io::Write;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

/// JPEG quality used for every persisted snapshot.
pub const JPEG_QUALITY: u8 = 90;

pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture time in milliseconds since the UNIX epoch.
    pub captured_at_ms: i64,
}

impl Frame {
    /// Build a frame from packed RGB8 bytes.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, captured_at_ms: i64) -> Result<Self> {
        let expected = expected_rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            captured_at_ms,
        })
    }

    pub fn from_image(image: RgbImage, captured_at_ms: i64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            captured_at_ms,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the frame resized to `width` x `height`.
    pub fn resized_rgb(&self, width: u32, height: u32) -> Result<RgbImage> {
        let image = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        if (width, height) == (self.width, self.height) {
            return Ok(image);
        }
        Ok(image::imageops::resize(
            &image,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }

    /// Encode the frame as JPEG into `out`.
    pub fn write_jpeg<W: Write>(&self, out: W) -> Result<()> {
        let mut encoder = JpegEncoder::new_with_quality(out, JPEG_QUALITY);
        encoder
            .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .context("encode jpeg")?;
        Ok(())
    }

    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.data.len() / 8);
        self.write_jpeg(&mut buf)?;
        Ok(buf)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at_ms", &self.captured_at_ms)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub(crate) fn expected_rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
