use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::rgb_len;

const DEFAULT_LUMA_THRESHOLD: u8 = 200;
const DEFAULT_MIN_PIXELS: usize = 16;

/// CPU backend for bright-region detection.
///
/// Reports the bounding box of all pixels brighter than a luma threshold as a
/// single detection of class 0. Pairs with the synthetic source, which renders
/// its pedestrian as a bright rectangle; it is not a person classifier.
pub struct CpuBackend {
    luma_threshold: u8,
    min_pixels: usize,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            luma_threshold: DEFAULT_LUMA_THRESHOLD,
            min_pixels: DEFAULT_MIN_PIXELS,
        }
    }

    /// Fewer bright pixels than this is treated as noise.
    pub fn with_min_pixels(mut self, min_pixels: usize) -> Self {
        self.min_pixels = min_pixels.max(1);
        self
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawDetection>> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            ));
        }

        let w = width as usize;
        let mut count = 0usize;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        for (i, rgb) in pixels.chunks_exact(3).enumerate() {
            if luma(rgb) < self.luma_threshold {
                continue;
            }
            let (x, y) = (i % w, i / w);
            count += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        if count < self.min_pixels {
            return Ok(Vec::new());
        }

        let box_w = (max_x - min_x + 1) as f32;
        let box_h = (max_y - min_y + 1) as f32;
        // Fill ratio: a solid blob is a confident detection, scattered glare is not.
        let confidence = (count as f32 / (box_w * box_h)).min(1.0);
        let (fw, fh) = (width as f32, height as f32);

        Ok(vec![RawDetection::new(
            0,
            confidence,
            (min_x as f32 + box_w / 2.0) / fw,
            (min_y as f32 + box_h / 2.0) / fh,
            box_w / fw,
            box_h / fh,
        )])
    }
}

fn luma(rgb: &[u8]) -> u8 {
    let value = 299 * rgb[0] as u32 + 587 * rgb[1] as u32 + 114 * rgb[2] as u32;
    (value / 1000) as u8
}
