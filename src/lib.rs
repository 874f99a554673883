//! Tello Avoid
//!
//! This crate implements a pedestrian-avoidance control loop for Tello-class
//! quadcopters.
//!
//! # Architecture
//!
//! Each control cycle runs the same pipeline, start to finish:
//!
//! 1. **Ingest**: a `FrameSource` supplies one RGB frame.
//! 2. **Detect**: a `PersonDetector` runs a backend, filters by confidence,
//!    applies non-max suppression, and selects one person box.
//! 3. **Decide**: the `MotionPolicy` maps that box to a `MotionCommand`.
//! 4. **Command**: the `Aircraft` receives an `rc` command with zero roll.
//! 5. **Settle**: after any non-zero command the loop pauses before reacting again.
//!
//! # Module Structure
//!
//! - `frame`: owned RGB frames and resizing
//! - `ingest`: frame sources (synthetic, ffmpeg)
//! - `detect`: detector backends, registry, NMS and target selection
//! - `policy`: the stateless box-to-command policy
//! - `aircraft`: command sinks (Tello SDK over UDP, dry run)
//! - `control`: the control loop and its pause abstraction
//! - `config`: file + environment configuration
//! - Core types: `FrameSize`, `BoundingBox`

use serde::{Deserialize, Serialize};

pub mod aircraft;
pub mod config;
pub mod control;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod policy;

pub use aircraft::{Aircraft, DryRunAircraft, RcCommand, TelloConfig, TelloLink};
pub use control::{CycleReport, ControlLoop, LoopSummary, Pause, RecordedPause, ThreadPause};
pub use detect::{
    BackendRegistry, CpuBackend, Detection, DetectorBackend, DetectorConfig, Labels,
    PersonDetector, RawDetection, StubBackend, TargetSelection,
};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceStats, SyntheticConfig, SyntheticSource};
pub use policy::{MotionCommand, MotionPolicy, PolicyConfig, Velocity};

/// Control resolution used by the reference deployment.
pub const DEFAULT_FRAME_WIDTH: u32 = 360;
pub const DEFAULT_FRAME_HEIGHT: u32 = 240;

// -------------------- Frame Size --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT)
    }
}

// -------------------- Bounding Box --------------------

/// Axis-aligned box in pixel coordinates of the control resolution.
///
/// Field order follows the detector hand-off: left-x, width, top-y, height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub w: i32,
    pub y: i32,
    pub h: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, w: i32, y: i32, h: i32) -> Self {
        Self { x, w, y, h }
    }

    /// "No person detected": frame centre with zero extent.
    pub fn sentinel(frame: FrameSize) -> Self {
        let (cx, cy) = frame.center();
        Self::new(cx, 0, cy, 0)
    }

    /// Widened so boxes anywhere in the `i32` plane have a centre.
    pub fn center_x(&self) -> i64 {
        self.x as i64 + (self.w / 2) as i64
    }

    pub fn center_y(&self) -> i64 {
        self.y as i64 + (self.h / 2) as i64
    }

    /// A zero-width box carries no distance information.
    pub fn is_empty(&self) -> bool {
        self.w == 0
    }

    pub fn area(&self) -> i64 {
        (self.w.max(0) as i64) * (self.h.max(0) as i64)
    }

    /// Intersection over union. Degenerate boxes never overlap.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x) as i64;
        let top = self.y.max(other.y) as i64;
        let right = (self.x as i64 + self.w as i64).min(other.x as i64 + other.w as i64);
        let bottom = (self.y as i64 + self.h as i64).min(other.y as i64 + other.h as i64);
        if right <= left || bottom <= top {
            return 0.0;
        }
        let intersection = ((right - left) as f64 * (bottom - top) as f64) as f32;
        let union = (self.area() + other.area()) as f32 - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}
