use anyhow::Result;
use sha2::{Digest, Sha256};

use super::{Classifier, Labels};
use crate::frame::Frame;

/// Number of classes the stub pretends to know when no labels are loaded.
const STUB_CLASS_COUNT: u32 = 1000;

/// Deterministic classifier for tests and demos.
///
/// Class and confidence are derived from a digest of the frame pixels, so the
/// same frame always classifies the same way.
pub struct StubClassifier {
    labels: Labels,
}

impl StubClassifier {
    pub fn new(labels: Labels) -> Self {
        Self { labels }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new(Labels::default())
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, frame: &Frame) -> Result<(i32, f32)> {
        let digest = Sha256::digest(frame.pixels());
        let raw_conf = u16::from_le_bytes([digest[0], digest[1]]);
        let confidence = raw_conf as f32 / u16::MAX as f32;

        let classes = if self.labels.is_empty() {
            STUB_CLASS_COUNT
        } else {
            self.labels.len() as u32
        };
        let raw_class = u32::from_le_bytes([digest[2], digest[3], digest[4], digest[5]]);
        Ok(((raw_class % classes) as i32, confidence))
    }

    fn class_desc(&self, class_id: i32) -> String {
        self.labels.describe(class_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_is_deterministic_and_bounded() -> Result<()> {
        let frame = Frame::from_rgb(vec![3u8; 48], 4, 4, 0)?;
        let mut classifier = StubClassifier::new(Labels::parse("cat\ndog\n"));
        let (id_a, conf_a) = classifier.classify(&frame)?;
        let (id_b, conf_b) = classifier.classify(&frame)?;
        assert_eq!((id_a, conf_a), (id_b, conf_b));
        assert!((0.0..=1.0).contains(&conf_a));
        assert!(id_a == 0 || id_a == 1);
        assert!(["cat", "dog"].contains(&classifier.class_desc(id_a).as_str()));
        Ok(())
    }

    #[test]
    fn different_frames_usually_differ() -> Result<()> {
        let mut classifier = StubClassifier::default();
        let a = classifier.classify(&Frame::from_rgb(vec![1u8; 12], 2, 2, 0)?)?;
        let b = classifier.classify(&Frame::from_rgb(vec![2u8; 12], 2, 2, 0)?)?;
        assert_ne!(a, b);
        Ok(())
    }
}
