mod backend;
mod backends;
mod result;

use std::path::PathBuf;

use anyhow::{anyhow, Result};

pub use backend::DetectorBackend;
pub use backends::{CpuBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use result::Detection;

pub const DEFAULT_DETECTOR: &str = "cpu";
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Clone, Debug)]
pub struct DetectorSettings {
    /// Backend name: `cpu`, `stub` or `tract`.
    pub backend: String,
    /// ONNX model for the `tract` backend.
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub threshold: f32,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR.to_string(),
            model_path: None,
            labels_path: None,
            threshold: DEFAULT_THRESHOLD,
            input_width: 300,
            input_height: 300,
        }
    }
}

pub fn open_detector(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    if !(0.0..=1.0).contains(&settings.threshold) {
        return Err(anyhow!(
            "detection threshold must be within 0..=1, got {}",
            settings.threshold
        ));
    }
    let mut backend: Box<dyn DetectorBackend> = match settings.backend.as_str() {
        "cpu" => Box::new(CpuBackend::new()),
        "stub" => Box::new(StubBackend::new()),
        "tract" => open_tract(settings)?,
        other => return Err(anyhow!("unknown detector backend '{}'", other)),
    };
    backend.warm_up()?;
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn open_tract(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract detector needs --detector-model"))?;
    let labels = match &settings.labels_path {
        Some(path) => crate::classify::Labels::load(path)?,
        None => crate::classify::Labels::default(),
    };
    let detector = TractDetector::new(model_path, settings.input_width, settings.input_height)?
        .with_threshold(settings.threshold)
        .with_labels(labels);
    Ok(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract(_settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!("the tract detector requires the backend-tract feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_builtin_backends() -> Result<()> {
        for name in ["cpu", "stub"] {
            let settings = DetectorSettings {
                backend: name.to_string(),
                ..DetectorSettings::default()
            };
            assert_eq!(open_detector(&settings)?.name(), name);
        }
        Ok(())
    }

    #[test]
    fn rejects_unknown_backend_and_bad_threshold() {
        let unknown = DetectorSettings {
            backend: "yolo".to_string(),
            ..DetectorSettings::default()
        };
        assert!(open_detector(&unknown).is_err());

        let bad = DetectorSettings {
            threshold: 1.5,
            ..DetectorSettings::default()
        };
        assert!(open_detector(&bad).is_err());
    }
}
