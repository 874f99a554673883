//! Frame container.
//!
//! - `Frame`: owned RGB24 pixels plus dimensions and capture metadata.
//!
//! Sources produce frames; the control loop resizes them to the policy
//! resolution before handing the pixels to a detector backend.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::time::Instant;

use crate::FrameSize;

/// One captured RGB24 frame. Rows are tightly packed (`width * 3` bytes).
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Per-source capture counter, starting at 1.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }

    /// Resize to `target`. Frames already at the target size pass through untouched.
    pub fn resized(self, target: FrameSize) -> Result<Frame> {
        if self.size() == target {
            return Ok(self);
        }
        if target.width == 0 || target.height == 0 {
            return Err(anyhow!("cannot resize frame to {}x{}", target.width, target.height));
        }
        let Frame {
            data,
            width,
            height,
            sequence,
            captured_at,
        } = self;
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", width, height))?;
        let scaled = imageops::resize(&image, target.width, target.height, FilterType::Triangle);
        Ok(Frame {
            data: scaled.into_raw(),
            width: target.width,
            height: target.height,
            sequence,
            captured_at,
        })
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))
}
