#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use super::{Classifier, Labels};
use crate::frame::Frame;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ONNX image classifier running on tract.
///
/// Expects a single NCHW f32 input of `input_size x input_size` and a logits
/// (or probabilities) output of shape `[1, classes]`.
pub struct TractClassifier {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    labels: Labels,
}

impl TractClassifier {
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, labels: Labels) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractClassifier: loaded {} ({}x{}, {} labels)",
            model_path.display(),
            input_size,
            input_size,
            labels.len()
        );
        Ok(Self {
            model,
            input_size,
            labels,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.resized_rgb(self.input_size, self.input_size)?;
        let size = self.input_size as usize;
        let input =
            tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
                let value = image.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0;
                (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            });
        Ok(input.into_tensor())
    }
}

impl Classifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, frame: &Frame) -> Result<(i32, f32)> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let scores: Vec<f32> = scores.iter().copied().collect();
        top_class(&scores).ok_or_else(|| anyhow!("model produced empty scores"))
    }

    fn class_desc(&self, class_id: i32) -> String {
        self.labels.describe(class_id)
    }
}

/// Argmax with softmax confidence. Outputs that already sum to one are used as is.
fn top_class(scores: &[f32]) -> Option<(i32, f32)> {
    let (idx, _) = scores
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))?;

    let is_probability = scores.iter().all(|v| (0.0..=1.0).contains(v))
        && (scores.iter().sum::<f32>() - 1.0).abs() < 1e-3;
    let confidence = if is_probability {
        scores[idx]
    } else {
        softmax(scores)[idx]
    };
    Some((idx as i32, confidence))
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scores.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|v| v / sum).collect()
}
