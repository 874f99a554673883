#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;

/// Columns before the per-class scores in a YOLO output row: cx, cy, w, h, objectness.
const BOX_COLUMNS: usize = 5;

/// Tract-based backend for YOLO-family ONNX detectors.
///
/// Frames are resized to a square `input_size` input, scaled to 0..1 and laid
/// out NCHW RGB. Every output tensor is read as rows of
/// `[cx, cy, w, h, objectness, class scores...]`; each row becomes one
/// candidate whose class is the best-scoring class and whose confidence is
/// that class score.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    /// Boxes are emitted in input pixels rather than 0..1.
    pixel_boxes: bool,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        if input_size == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input)",
            model_path.display(),
            input_size,
            input_size
        );

        Ok(Self {
            model,
            input_size,
            pixel_boxes: false,
        })
    }

    /// Treat output boxes as input-pixel coordinates and normalize them.
    pub fn with_pixel_boxes(mut self) -> Self {
        self.pixel_boxes = true;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let image = RgbImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
            anyhow!(
                "expected {}x{} RGB bytes, received {}",
                width,
                height,
                pixels.len()
            )
        })?;
        let side = self.input_size;
        let scaled = if width == side && height == side {
            image
        } else {
            imageops::resize(&image, side, side, FilterType::Triangle)
        };

        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            scaled.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<RawDetection>> {
        if outputs.is_empty() {
            return Err(anyhow!("model produced no outputs"));
        }
        let scale = if self.pixel_boxes {
            self.input_size as f32
        } else {
            1.0
        };

        let mut detections = Vec::new();
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .context("model output tensor was not f32")?;
            let row_len = view.shape().last().copied().unwrap_or(0);
            if row_len <= BOX_COLUMNS {
                return Err(anyhow!(
                    "model output rows have {} columns, expected more than {}",
                    row_len,
                    BOX_COLUMNS
                ));
            }
            let values: Vec<f32> = view.iter().copied().collect();
            for row in values.chunks_exact(row_len) {
                let Some((class_id, score)) = best_class(&row[BOX_COLUMNS..]) else {
                    continue;
                };
                detections.push(RawDetection::new(
                    class_id,
                    score,
                    row[0] / scale,
                    row[1] / scale,
                    row[2] / scale,
                    row[3] / scale,
                ));
            }
        }
        Ok(detections)
    }
}

fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| score.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawDetection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = vec![0u8; (side as usize) * (side as usize) * 3];
        self.detect(&blank, side, side).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_class_picks_argmax() {
        assert_eq!(best_class(&[0.1, 0.7, 0.3]), Some((1, 0.7)));
        assert_eq!(best_class(&[]), None);
    }
}
