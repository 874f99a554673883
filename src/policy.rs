//! Motion policy.
//!
//! Maps one target box to one three-axis motion command. The policy is
//! stateless and total: every input, including the "no detection" sentinel,
//! produces a command and no error is possible.
//!
//! Each axis is evaluated independently against a dead-zone:
//! - yaw turns toward the box's horizontal centre
//! - vertical climbs or descends toward the box's vertical centre
//! - longitudinal closes or opens distance based on the box width
//!
//! Boundary values fall inside the dead-zone and produce no motion.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, FrameSize};

/// Largest magnitude accepted by the aircraft for any rc axis.
pub const MAX_VELOCITY: i32 = 100;

// ----------------------------------------------------------------------------
// Velocity / MotionCommand
// ----------------------------------------------------------------------------

/// Signed velocity clamped to -100..=100.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Velocity(i32);

impl Velocity {
    pub const ZERO: Velocity = Velocity(0);

    pub fn new(value: i32) -> Self {
        Self(value.clamp(-MAX_VELOCITY, MAX_VELOCITY))
    }

    pub fn get(self) -> i32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for Velocity {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

/// Output of the policy. Lateral motion is never commanded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MotionCommand {
    /// Positive is up.
    pub vertical: Velocity,
    /// Positive is forward.
    pub longitudinal: Velocity,
    /// Positive rotates right (clockwise seen from above).
    pub yaw: Velocity,
}

impl MotionCommand {
    pub const STOP: MotionCommand = MotionCommand {
        vertical: Velocity::ZERO,
        longitudinal: Velocity::ZERO,
        yaw: Velocity::ZERO,
    };

    pub fn new(vertical: i32, longitudinal: i32, yaw: i32) -> Self {
        Self {
            vertical: Velocity::new(vertical),
            longitudinal: Velocity::new(longitudinal),
            yaw: Velocity::new(yaw),
        }
    }

    /// True when no axis moves; the loop skips its settle pause.
    pub fn is_stationary(&self) -> bool {
        self.vertical.is_zero() && self.longitudinal.is_zero() && self.yaw.is_zero()
    }

    /// (vertical, longitudinal, yaw)
    pub fn as_tuple(&self) -> (i32, i32, i32) {
        (self.vertical.get(), self.longitudinal.get(), self.yaw.get())
    }
}

// ----------------------------------------------------------------------------
// PolicyConfig
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Half-width of the horizontal dead-zone around the frame centre.
    pub yaw_dead_zone: i32,
    /// Half-height of the vertical dead-zone around the frame centre.
    pub vertical_dead_zone: i32,
    /// Boxes narrower than this are far away.
    pub min_width: i32,
    /// Boxes wider than this are too close.
    pub max_width: i32,
    pub yaw_speed: i32,
    pub vertical_speed: i32,
    pub longitudinal_speed: i32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            frame_width: crate::DEFAULT_FRAME_WIDTH,
            frame_height: crate::DEFAULT_FRAME_HEIGHT,
            yaw_dead_zone: 60,
            vertical_dead_zone: 40,
            min_width: 50,
            max_width: 110,
            yaw_speed: 30,
            vertical_speed: 20,
            longitudinal_speed: 20,
        }
    }
}

impl PolicyConfig {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.frame_width, self.frame_height)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(anyhow!("policy frame dimensions must be non-zero"));
        }
        if self.yaw_dead_zone < 0 || self.vertical_dead_zone < 0 {
            return Err(anyhow!("policy dead-zones must not be negative"));
        }
        if self.yaw_dead_zone as i64 > self.frame_width as i64 {
            return Err(anyhow!(
                "yaw_dead_zone {} exceeds frame width {}",
                self.yaw_dead_zone,
                self.frame_width
            ));
        }
        if self.vertical_dead_zone as i64 > self.frame_height as i64 {
            return Err(anyhow!(
                "vertical_dead_zone {} exceeds frame height {}",
                self.vertical_dead_zone,
                self.frame_height
            ));
        }
        if self.min_width < 0 || self.min_width > self.max_width {
            return Err(anyhow!(
                "policy width band is invalid (min_width={}, max_width={})",
                self.min_width,
                self.max_width
            ));
        }
        for (name, speed) in [
            ("yaw_speed", self.yaw_speed),
            ("vertical_speed", self.vertical_speed),
            ("longitudinal_speed", self.longitudinal_speed),
        ] {
            if !(0..=MAX_VELOCITY).contains(&speed) {
                return Err(anyhow!("{} must be within 0..={}", name, MAX_VELOCITY));
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// MotionPolicy
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct MotionPolicy {
    config: PolicyConfig,
}

impl MotionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn frame_size(&self) -> FrameSize {
        self.config.frame_size()
    }

    pub fn decide(&self, bbox: BoundingBox) -> MotionCommand {
        MotionCommand {
            vertical: Velocity::new(self.vertical(bbox.center_y())),
            longitudinal: Velocity::new(self.longitudinal(bbox.w)),
            yaw: Velocity::new(self.yaw(bbox.center_x())),
        }
    }

    // Thresholds are compared in i64 so no box or config can overflow them.
    fn yaw(&self, cx: i64) -> i32 {
        let (center, _) = self.frame_size().center();
        let low = center as i64 - self.config.yaw_dead_zone as i64;
        let high = center as i64 + self.config.yaw_dead_zone as i64;
        if cx < low {
            self.config.yaw_speed.saturating_neg()
        } else if cx > high {
            self.config.yaw_speed
        } else {
            0
        }
    }

    fn vertical(&self, cy: i64) -> i32 {
        let (_, center) = self.frame_size().center();
        let low = center as i64 - self.config.vertical_dead_zone as i64;
        let high = center as i64 + self.config.vertical_dead_zone as i64;
        // Image y grows downward: a target high in the frame means climb.
        if cy < low {
            self.config.vertical_speed
        } else if cy > high {
            self.config.vertical_speed.saturating_neg()
        } else {
            0
        }
    }

    fn longitudinal(&self, width: i32) -> i32 {
        // Absent target, not a distant one.
        if width == 0 {
            return 0;
        }
        if width < self.config.min_width {
            self.config.longitudinal_speed
        } else if width > self.config.max_width {
            self.config.longitudinal_speed.saturating_neg()
        } else {
            0
        }
    }
}
