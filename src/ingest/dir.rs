//! Still-image directory source.
//!
//! Replays the JPEG/PNG files of a local directory in file-name order, one
//! file per capture. Images are resized to the configured stream size. The
//! source stops streaming after the last file.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;

use super::{now_ms, ImageSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct ImageDirSource {
    dir: PathBuf,
    name: String,
    files: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
}

impl ImageDirSource {
    pub fn open(dir: &Path, width: u32, height: u32) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        log::info!(
            "ImageDirSource: {} images in {}",
            files.len(),
            dir.display()
        );
        Ok(Self {
            name: dir.display().to_string(),
            dir: dir.to_path_buf(),
            files,
            next: 0,
            width,
            height,
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len() - self.next
    }
}

impl ImageSource for ImageDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&mut self) -> Result<Frame> {
        let path = self
            .files
            .get(self.next)
            .ok_or_else(|| anyhow!("image directory {} exhausted", self.dir.display()))?
            .clone();
        self.next += 1;

        let image = image::open(&path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        let image = if image.dimensions() == (self.width, self.height) {
            image
        } else {
            image::imageops::resize(&image, self.width, self.height, FilterType::Triangle)
        };
        Ok(Frame::from_image(image, now_ms()))
    }

    fn is_streaming(&self) -> bool {
        self.next < self.files.len()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.next as u64,
            source: self.name.clone(),
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
