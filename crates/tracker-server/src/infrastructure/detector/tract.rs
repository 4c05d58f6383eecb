#![cfg(feature = "backend-tract")]

//! ONNX face detector run with `tract`.
//!
//! Expects an Ultra-Light-Fast-Generic-Face-Detector style model
//! (`version-RFB-320.onnx` or `version-slim-320.onnx`):
//!
//! - input: `[1, 3, 240, 320]` f32, RGB, normalised as `(p - 127) / 128`
//! - outputs: scores `[1, N, 2]` and boxes `[1, N, 4]` (normalised corners)
//!
//! The model file is supplied by the operator; nothing is downloaded.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;
use tracker_core::FaceBox;

use crate::domain::config::DetectorConfig;
use crate::domain::frame::Frame;
use crate::domain::locator::{FaceLocator, LocateError};
use crate::infrastructure::detector::postprocess::{decode_candidates, non_max_suppression};

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;

/// Tract-backed [`FaceLocator`].
pub struct UltraFaceLocator {
    model: TypedRunnableModel<TypedModel>,
    score_threshold: f32,
    iou_threshold: f32,
}

impl UltraFaceLocator {
    /// Loads and optimises the ONNX model at `model_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a compatible
    /// model.
    pub fn load(model_path: &Path, config: &DetectorConfig) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            score_threshold: config.score_threshold,
            iou_threshold: config.iou_threshold,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        let resized = imageops::resize(&image, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
            |(_, channel, y, x)| {
                let pixel = resized.get_pixel(x as u32, y as u32);
                (f32::from(pixel[channel]) - 127.0) / 128.0
            },
        );
        Ok(input.into_tensor())
    }

    /// Picks the score and box tensors by their trailing dimension.
    fn split_outputs(outputs: &TVec<TValue>) -> Result<(Vec<f32>, Vec<f32>)> {
        let mut scores = None;
        let mut boxes = None;
        for output in outputs {
            let view = output
                .to_array_view::<f32>()
                .context("model output tensor was not f32")?;
            match view.shape().last() {
                Some(2) => scores = Some(view.iter().copied().collect()),
                Some(4) => boxes = Some(view.iter().copied().collect()),
                _ => {}
            }
        }
        match (scores, boxes) {
            (Some(scores), Some(boxes)) => Ok((scores, boxes)),
            _ => Err(anyhow!("model did not produce [.., 2] scores and [.., 4] boxes")),
        }
    }
}

impl FaceLocator for UltraFaceLocator {
    fn name(&self) -> &'static str {
        "ultraface-tract"
    }

    fn locate(&self, frame: &Frame) -> Result<Vec<FaceBox>, LocateError> {
        let input = self
            .build_input(frame)
            .map_err(|e| LocateError::Input(format!("{e:#}")))?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| LocateError::Inference(format!("{e:#}")))?;
        let (scores, boxes) =
            Self::split_outputs(&outputs).map_err(|e| LocateError::Inference(format!("{e:#}")))?;

        let candidates = decode_candidates(
            &scores,
            &boxes,
            frame.width,
            frame.height,
            self.score_threshold,
        );
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}
