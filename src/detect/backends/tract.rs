#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::Labels;
use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Tract-based backend for ONNX object detection.
///
/// The model takes a `[1, 3, H, W]` f32 RGB input scaled to 0..1 and returns
/// a `[N, 6]` (or `[1, N, 6]`) tensor of rows
/// `(class_id, score, x1, y1, x2, y2)` with coordinates normalized to 0..1.
pub struct TractDetector {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    labels: Labels,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.5,
            labels: Labels::default(),
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.resized_rgb(self.width, self.height)?;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| image.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let values: Vec<f32> = rows.iter().copied().collect();
        decode_rows(
            &values,
            self.confidence_threshold,
            frame.width as f32,
            frame.height as f32,
            &self.labels,
        )
    }
}

fn decode_rows(
    values: &[f32],
    threshold: f32,
    frame_width: f32,
    frame_height: f32,
    labels: &Labels,
) -> Result<Vec<Detection>> {
    if values.len() % 6 != 0 {
        return Err(anyhow!(
            "detector output length {} is not a multiple of 6",
            values.len()
        ));
    }
    Ok(values
        .chunks_exact(6)
        .filter(|row| row[1].is_finite() && row[1] >= threshold)
        .map(|row| {
            let class_id = row[0].max(0.0) as u32;
            Detection {
                class_id,
                label: labels.describe(class_id as i32),
                confidence: row[1],
                left: row[2].clamp(0.0, 1.0) * frame_width,
                top: row[3].clamp(0.0, 1.0) * frame_height,
                right: row[4].clamp(0.0, 1.0) * frame_width,
                bottom: row[5].clamp(0.0, 1.0) * frame_height,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rows_filters_and_scales() -> Result<()> {
        let labels = Labels::parse("background\nperson\n");
        let values = [
            1.0, 0.9, 0.1, 0.2, 0.5, 0.6, //
            1.0, 0.3, 0.0, 0.0, 1.0, 1.0,
        ];
        let dets = decode_rows(&values, 0.5, 100.0, 50.0, &labels)?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "person");
        assert!((dets[0].left - 10.0).abs() < 1e-4);
        assert!((dets[0].bottom - 30.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn decode_rows_rejects_ragged_output() {
        assert!(decode_rows(&[0.0; 7], 0.5, 1.0, 1.0, &Labels::default()).is_err());
    }
}
