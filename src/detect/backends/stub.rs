use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;

/// Stub backend for testing. Replays scripted detections, one entry per frame.
///
/// The script wraps around; an empty script never detects anything.
#[derive(Default)]
pub struct StubBackend {
    script: Vec<Vec<RawDetection>>,
    frames_seen: u64,
}

impl StubBackend {
    pub fn new(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script,
            frames_seen: 0,
        }
    }

    /// Same detections for every frame.
    pub fn repeating(detections: Vec<RawDetection>) -> Self {
        Self::new(vec![detections])
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<RawDetection>> {
        let index = self.frames_seen as usize;
        self.frames_seen += 1;
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.script[index % self.script.len()].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_replays_script() -> Result<()> {
        let person = RawDetection::new(0, 0.9, 0.5, 0.5, 0.2, 0.4);
        let mut backend = StubBackend::new(vec![vec![person.clone()], vec![]]);

        assert_eq!(backend.detect(b"", 0, 0)?, vec![person.clone()]);
        assert!(backend.detect(b"", 0, 0)?.is_empty());
        assert_eq!(backend.detect(b"", 0, 0)?, vec![person]);
        assert_eq!(backend.frames_seen(), 3);
        Ok(())
    }

    #[test]
    fn empty_script_never_detects() -> Result<()> {
        let mut backend = StubBackend::default();
        assert!(backend.detect(b"", 0, 0)?.is_empty());
        Ok(())
    }
}
