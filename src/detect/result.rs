use serde::Serialize;

use crate::{BoundingBox, FrameSize};

/// One candidate as produced by a backend, before thresholding.
///
/// The box is in normalized centre form (0..1 of frame width/height), the
/// layout YOLO-style heads emit.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl RawDetection {
    pub fn new(class_id: usize, confidence: f32, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            class_id,
            confidence,
            cx,
            cy,
            w,
            h,
        }
    }

    /// Project onto a frame of `size` pixels.
    ///
    /// Each step truncates toward zero so boxes land on the same pixels the
    /// detector's own integer conversion would produce.
    pub fn to_pixels(&self, size: FrameSize) -> BoundingBox {
        let width = size.width as f32;
        let height = size.height as f32;
        let center_x = (self.cx * width) as i32;
        let center_y = (self.cy * height) as i32;
        let w = (self.w * width) as i32;
        let h = (self.h * height) as i32;
        let x = (center_x as f32 - w as f32 / 2.0) as i32;
        let y = (center_y as f32 - h as f32 / 2.0) as i32;
        BoundingBox::new(x, w, y, h)
    }
}

/// A thresholded, pixel-space detection with its class label resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}
