use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Confidence reported for a whole-frame motion detection.
const MOTION_CONFIDENCE: f32 = 0.85;

/// CPU backend for motion detection.
///
/// Reports a single whole-frame `motion` detection whenever the frame
/// content differs from the previous one.
#[derive(Default)]
pub struct CpuBackend {
    last_hash: Option<[u8; 32]>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let current_hash: [u8; 32] = Sha256::digest(frame.pixels()).into();

        let motion = self.last_hash.is_some_and(|prev| prev != current_hash);

        self.last_hash = Some(current_hash);

        if motion {
            Ok(vec![Detection {
                class_id: 0,
                label: "motion".to_string(),
                confidence: MOTION_CONFIDENCE,
                left: 0.0,
                top: 0.0,
                right: frame.width as f32,
                bottom: frame.height as f32,
            }])
        } else {
            Ok(Vec::new())
        }
    }
}
