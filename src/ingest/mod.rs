//! Frame ingestion sources.
//!
//! This module provides different sources for frames:
//! - Synthetic scene (`stub://` URLs, testing and demos)
//! - Any ffmpeg input, including the Tello video stream on `udp://0.0.0.0:11111`
//!   and recorded flight files (feature: ingest-ffmpeg)
//!
//! All sources produce `Frame` instances that flow into the control loop.
//! Sources do not resize; the loop brings frames to the policy resolution.

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg;
pub mod synthetic;

use anyhow::Result;

use crate::config::SourceSettings;
use crate::frame::Frame;

#[cfg(feature = "ingest-ffmpeg")]
pub use ffmpeg::FfmpegSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// A supplier of one frame per control cycle.
pub trait FrameSource {
    /// Source identifier for logs.
    fn name(&self) -> &'static str;

    /// Open the underlying stream.
    fn connect(&mut self) -> Result<()>;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Frame> {
        (**self).next_frame()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Open the source named by `settings.url`.
///
/// `stub://` selects the synthetic scene; everything else goes to ffmpeg.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    if settings.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            url: settings.url.clone(),
            ..SyntheticConfig::default()
        })));
    }
    #[cfg(feature = "ingest-ffmpeg")]
    {
        Ok(Box::new(FfmpegSource::new(
            settings.url.clone(),
            settings.target_fps,
        )?))
    }
    #[cfg(not(feature = "ingest-ffmpeg"))]
    {
        anyhow::bail!(
            "source '{}' requires the ingest-ffmpeg feature",
            settings.url
        )
    }
}
