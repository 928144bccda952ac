//! Snapshot persistence.
//!
//! Each sink owns one directory and writes `{dir}/{timestamp}.jpg`. Writes go
//! to a temporary file first and are renamed into place, so readers watching
//! the directory never pick up a half-written JPEG.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SnapshotSink {
    dir: PathBuf,
}

impl SnapshotSink {
    /// Open a sink, creating the directory when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, timestamp_ms: i64) -> PathBuf {
        self.dir.join(format!("{}.jpg", timestamp_ms))
    }

    pub fn write(&self, frame: &Frame, timestamp_ms: i64) -> Result<PathBuf> {
        self.write_named(frame, &format!("{}.jpg", timestamp_ms))
    }

    /// Write under a fixed file name, replacing any previous file.
    pub fn write_named(&self, frame: &Frame, file_name: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        let tmp = self.dir.join(format!(".{}.tmp", file_name));
        {
            let file = File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            let mut out = BufWriter::new(file);
            frame.write_jpeg(&mut out)?;
            out.into_inner()
                .map_err(|e| e.into_error())
                .with_context(|| format!("failed to flush {}", tmp.display()))?;
        }
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_rgb(vec![64u8; 8 * 8 * 3], 8, 8, 0).unwrap()
    }

    #[test]
    fn writes_timestamped_jpeg() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = SnapshotSink::open(dir.path().join("captured"))?;
        let path = sink.write(&frame(), 1_700_000_000_401)?;
        assert_eq!(path, dir.path().join("captured/1700000000401.jpg"));
        assert_eq!(path, sink.path_for(1_700_000_000_401));

        let bytes = std::fs::read(&path)?;
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let leftovers: Vec<_> = std::fs::read_dir(sink.dir())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    fn named_writes_replace_previous_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = SnapshotSink::open(dir.path())?;
        sink.write_named(&frame(), "latest.jpg")?;
        let path = sink.write_named(&frame(), "latest.jpg")?;
        assert!(path.ends_with("latest.jpg"));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
