//! Image classification.
//!
//! A `Classifier` maps a frame to `(class_id, confidence)` and can describe
//! any class id it produces. The capture loop only ever talks to this trait.

mod labels;
mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

use std::path::PathBuf;

use anyhow::Result;

use crate::event::ClassificationResult;
use crate::frame::Frame;

pub use labels::Labels;
pub use stub::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use tract::TractClassifier;

pub const DEFAULT_NETWORK: &str = "googlenet";
pub const DEFAULT_INPUT_SIZE: u32 = 224;

pub trait Classifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn classify(&mut self, frame: &Frame) -> Result<(i32, f32)>;

    fn class_desc(&self, class_id: i32) -> String;

    /// Classify and describe in one step.
    fn classify_frame(&mut self, frame: &Frame) -> Result<ClassificationResult> {
        let (class_id, confidence) = self.classify(frame)?;
        Ok(ClassificationResult {
            class_id,
            class_desc: self.class_desc(class_id),
            confidence,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ClassifierSettings {
    /// Network name. `stub` selects the built-in deterministic classifier;
    /// anything else loads `{models_dir}/{network}.onnx`.
    pub network: String,
    pub models_dir: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            models_dir: PathBuf::from("models"),
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl ClassifierSettings {
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(format!("{}.onnx", self.network))
    }

    fn labels(&self) -> Result<Labels> {
        match &self.labels_path {
            Some(path) => Labels::load(path),
            None => {
                let default_path = self.models_dir.join(format!("{}.labels.txt", self.network));
                if default_path.is_file() {
                    Labels::load(&default_path)
                } else {
                    Ok(Labels::default())
                }
            }
        }
    }
}

pub fn open_classifier(settings: &ClassifierSettings) -> Result<Box<dyn Classifier>> {
    let labels = settings.labels()?;
    match settings.network.as_str() {
        "stub" => Ok(Box::new(StubClassifier::new(labels))),
        _ => open_onnx(settings, labels),
    }
}

#[cfg(feature = "backend-tract")]
fn open_onnx(settings: &ClassifierSettings, labels: Labels) -> Result<Box<dyn Classifier>> {
    Ok(Box::new(TractClassifier::new(
        settings.model_path(),
        settings.input_size,
        labels,
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn open_onnx(settings: &ClassifierSettings, _labels: Labels) -> Result<Box<dyn Classifier>> {
    Err(anyhow::anyhow!(
        "network {} needs the backend-tract feature (or use --network stub)",
        settings.network
    ))
}
