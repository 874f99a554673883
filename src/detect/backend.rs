use anyhow::Result;

use crate::detect::result::RawDetection;

/// Detector backend trait.
///
/// A backend turns one RGB24 frame into raw candidates for every class it
/// knows. Thresholding, suppression and person selection happen above it in
/// `PersonDetector`, so every backend is held to the same selection rules.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// `pixels` is tightly packed RGB24 of `width * height * 3` bytes.
    /// Returned boxes are normalized to the frame that was passed in.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
