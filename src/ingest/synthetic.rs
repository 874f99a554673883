//! Synthetic frame source.
//!
//! Renders a dark scene with a single bright upright rectangle standing in for
//! a pedestrian. The rectangle drifts by a bounded random walk so the control
//! loop sees yaw, vertical and distance corrections. Used for `stub://` URLs.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceStats};
use crate::frame::{rgb_len, Frame};

const BACKGROUND: u8 = 24;
const FOREGROUND: u8 = 235;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Initial target rectangle (left, top, width, height) in pixels.
    pub target: (u32, u32, u32, u32),
    /// Largest per-frame step of the random walk, in pixels.
    pub max_step: u32,
    /// Every Nth frame renders the background only. 0 disables.
    pub empty_every: u64,
    /// Seed for a reproducible walk. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://tello".to_string(),
            width: 960,
            height: 720,
            target: (420, 240, 120, 240),
            max_step: 24,
            empty_every: 0,
            seed: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    frame_count: u64,
    target: (u32, u32, u32, u32),
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let target = clamp_target(config.target, config.width, config.height);
        Self {
            config,
            rng,
            frame_count: 0,
            target,
            connected: false,
        }
    }

    /// Target rectangle rendered into the most recent frame, if any.
    pub fn current_target(&self) -> Option<(u32, u32, u32, u32)> {
        if self.frame_count == 0 || self.is_empty_frame(self.frame_count) {
            None
        } else {
            Some(self.target)
        }
    }

    fn is_empty_frame(&self, frame: u64) -> bool {
        self.config.empty_every > 0 && frame % self.config.empty_every == 0
    }

    fn advance_target(&mut self) {
        if self.frame_count == 1 || self.config.max_step == 0 {
            return;
        }
        let step = self.config.max_step as i64;
        let (x, y, w, h) = self.target;
        let dx = self.rng.gen_range(-step..=step);
        let dy = self.rng.gen_range(-step..=step) / 2;
        // Width breathes slower than position so distance changes stay gradual.
        let dw = self.rng.gen_range(-step..=step) / 3;
        let w = (w as i64 + dw).max(8) as u32;
        let h = w.saturating_mul(2);
        self.target = clamp_target(
            (
                (x as i64 + dx).max(0) as u32,
                (y as i64 + dy).max(0) as u32,
                w,
                h,
            ),
            self.config.width,
            self.config.height,
        );
    }

    fn render(&self) -> Result<Vec<u8>> {
        let mut pixels = vec![BACKGROUND; rgb_len(self.config.width, self.config.height)?];
        if self.is_empty_frame(self.frame_count) {
            return Ok(pixels);
        }
        let (tx, ty, tw, th) = self.target;
        let row_bytes = self.config.width as usize * 3;
        for row in ty..(ty + th) {
            let start = row as usize * row_bytes + tx as usize * 3;
            let end = start + tw as usize * 3;
            pixels[start..end].fill(FOREGROUND);
        }
        Ok(pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    /// Synthetic sources are always "connected".
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("SyntheticSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        self.advance_target();
        let pixels = self.render()?;
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

/// Keep the rectangle non-empty and fully inside the frame.
fn clamp_target(
    (x, y, w, h): (u32, u32, u32, u32),
    width: u32,
    height: u32,
) -> (u32, u32, u32, u32) {
    let w = w.clamp(1, width.max(1));
    let h = h.clamp(1, height.max(1));
    let x = x.min(width.saturating_sub(w));
    let y = y.min(height.saturating_sub(h));
    (x, y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(empty_every: u64) -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            url: "stub://test".to_string(),
            width: 64,
            height: 48,
            target: (20, 10, 10, 20),
            max_step: 4,
            empty_every,
            seed: Some(7),
        })
    }

    #[test]
    fn synthetic_source_produces_frames() -> Result<()> {
        let mut source = seeded(0);
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.sequence, 1);
        assert!(source.is_healthy());

        Ok(())
    }

    #[test]
    fn first_frame_renders_initial_target() -> Result<()> {
        let mut source = seeded(0);
        let frame = source.next_frame()?;
        assert_eq!(source.current_target(), Some((20, 10, 10, 20)));

        let pixels = frame.pixels();
        let inside = (15 * 64 + 25) * 3;
        let outside = (2 * 64 + 2) * 3;
        assert_eq!(pixels[inside], FOREGROUND);
        assert_eq!(pixels[outside], BACKGROUND);
        Ok(())
    }

    #[test]
    fn target_stays_inside_frame() -> Result<()> {
        let mut source = seeded(0);
        for _ in 0..500 {
            source.next_frame()?;
            let (x, y, w, h) = source.current_target().unwrap();
            assert!(x + w <= 64);
            assert!(y + h <= 48);
        }
        Ok(())
    }

    #[test]
    fn empty_frames_have_no_target() -> Result<()> {
        let mut source = seeded(2);
        source.next_frame()?;
        assert!(source.current_target().is_some());
        let frame = source.next_frame()?;
        assert!(source.current_target().is_none());
        assert!(frame.pixels().iter().all(|&p| p == BACKGROUND));
        Ok(())
    }

    #[test]
    fn same_seed_replays_same_walk() -> Result<()> {
        let mut a = seeded(0);
        let mut b = seeded(0);
        for _ in 0..20 {
            a.next_frame()?;
            b.next_frame()?;
            assert_eq!(a.current_target(), b.current_target());
        }
        assert_eq!(a.stats().frames_captured, 20);
        Ok(())
    }
}
