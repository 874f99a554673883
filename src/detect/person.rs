//! Person selection.
//!
//! `PersonDetector` owns a backend handle and a label table and turns a frame
//! into at most one target box:
//!
//! 1. drop raw candidates at or below the confidence threshold
//! 2. project to pixels of the frame that was inspected
//! 3. non-max suppression
//! 4. keep the target label ("person")
//! 5. pick one according to `TargetSelection`

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use super::backend::DetectorBackend;
use super::labels::Labels;
use super::nms::non_max_suppression;
use super::result::{Detection, RawDetection};
use crate::frame::Frame;
use crate::{BoundingBox, FrameSize};

/// Which person to react to when several survive suppression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelection {
    /// First survivor in backend output order.
    First,
    /// Largest box: the nearest person is the one to avoid.
    #[default]
    LargestArea,
    HighestConfidence,
    /// Closest box centre to the frame centre.
    NearestCenter,
}

impl FromStr for TargetSelection {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "first" => Ok(Self::First),
            "largest_area" => Ok(Self::LargestArea),
            "highest_confidence" => Ok(Self::HighestConfidence),
            "nearest_center" => Ok(Self::NearestCenter),
            other => Err(anyhow!("unknown target selection '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub confidence_threshold: f32,
    pub nms_score_threshold: f32,
    pub nms_iou_threshold: f32,
    pub target_label: String,
    pub selection: TargetSelection,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.2,
            nms_score_threshold: 0.2,
            nms_iou_threshold: 0.4,
            target_label: "person".to_string(),
            selection: TargetSelection::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("nms_score_threshold", self.nms_score_threshold),
            ("nms_iou_threshold", self.nms_iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within 0..=1, got {}", name, value));
            }
        }
        if self.target_label.trim().is_empty() {
            return Err(anyhow!("target_label must not be empty"));
        }
        Ok(())
    }
}

/// Detector with an explicit lifecycle: constructed once at start-up and
/// shared with the control loop.
pub struct PersonDetector {
    backend: Arc<Mutex<dyn DetectorBackend>>,
    labels: Labels,
    config: DetectorConfig,
}

impl PersonDetector {
    pub fn new(
        backend: Arc<Mutex<dyn DetectorBackend>>,
        labels: Labels,
        config: DetectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if labels.id_of(&config.target_label).is_none() {
            return Err(anyhow!(
                "target label '{}' is not in the label table",
                config.target_label
            ));
        }
        Ok(Self {
            backend,
            labels,
            config,
        })
    }

    pub fn from_backend<B: DetectorBackend + 'static>(
        backend: B,
        labels: Labels,
        config: DetectorConfig,
    ) -> Result<Self> {
        Self::new(Arc::new(Mutex::new(backend)), labels, config)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn backend_name(&self) -> Result<&'static str> {
        let guard = self
            .backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        Ok(guard.name())
    }

    pub fn warm_up(&self) -> Result<()> {
        let mut guard = self
            .backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.warm_up()
    }

    /// All detections surviving thresholding and suppression, in backend order.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let raw = {
            let mut guard = self
                .backend
                .lock()
                .map_err(|_| anyhow!("backend lock poisoned"))?;
            guard.detect(frame.pixels(), frame.width, frame.height)?
        };
        Ok(self.filter(&raw, frame.size()))
    }

    /// The one person to react to, if any.
    pub fn select_target(&self, frame: &Frame) -> Result<Option<Detection>> {
        let detections = self.detect(frame)?;
        Ok(self.select(detections, frame.size()))
    }

    /// Target box for the policy; the sentinel when nobody is visible.
    pub fn target_box(&self, frame: &Frame) -> Result<BoundingBox> {
        Ok(self
            .select_target(frame)?
            .map(|det| det.bbox)
            .unwrap_or_else(|| BoundingBox::sentinel(frame.size())))
    }

    fn filter(&self, raw: &[RawDetection], size: FrameSize) -> Vec<Detection> {
        let confident: Vec<&RawDetection> = raw
            .iter()
            .filter(|det| det.confidence > self.config.confidence_threshold)
            .collect();
        let boxes: Vec<BoundingBox> = confident.iter().map(|det| det.to_pixels(size)).collect();
        let scores: Vec<f32> = confident.iter().map(|det| det.confidence).collect();

        let mut kept = non_max_suppression(
            &boxes,
            &scores,
            self.config.nms_score_threshold,
            self.config.nms_iou_threshold,
        );
        kept.sort_unstable();

        kept.into_iter()
            .map(|i| {
                let det = confident[i];
                Detection {
                    bbox: boxes[i],
                    class_id: det.class_id,
                    label: self
                        .labels
                        .get(det.class_id)
                        .unwrap_or("unknown")
                        .to_string(),
                    confidence: det.confidence,
                }
            })
            .collect()
    }

    fn select(&self, detections: Vec<Detection>, size: FrameSize) -> Option<Detection> {
        let mut people = detections
            .into_iter()
            .filter(|det| det.label == self.config.target_label);
        match self.config.selection {
            TargetSelection::First => people.next(),
            TargetSelection::LargestArea => people.reduce(|best, det| {
                if det.bbox.area() > best.bbox.area() {
                    det
                } else {
                    best
                }
            }),
            TargetSelection::HighestConfidence => people.reduce(|best, det| {
                if det.confidence > best.confidence {
                    det
                } else {
                    best
                }
            }),
            TargetSelection::NearestCenter => {
                let (cx, cy) = size.center();
                let distance = |det: &Detection| {
                    let dx = det.bbox.center_x() - cx as i64;
                    let dy = det.bbox.center_y() - cy as i64;
                    dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
                };
                people.reduce(|best, det| {
                    if distance(&det) < distance(&best) {
                        det
                    } else {
                        best
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;

    fn frame() -> Frame {
        Frame::new(vec![0u8; 360 * 240 * 3], 360, 240, 1).unwrap()
    }

    fn detector(script: Vec<RawDetection>, selection: TargetSelection) -> PersonDetector {
        PersonDetector::from_backend(
            StubBackend::repeating(script),
            Labels::coco(),
            DetectorConfig {
                selection,
                ..DetectorConfig::default()
            },
        )
        .unwrap()
    }

    // Two well separated people: a small confident one, a large less confident one.
    fn two_people() -> Vec<RawDetection> {
        vec![
            RawDetection::new(0, 0.9, 0.2, 0.5, 0.1, 0.2),
            RawDetection::new(0, 0.5, 0.75, 0.5, 0.3, 0.6),
        ]
    }

    #[test]
    fn no_detections_yield_sentinel() -> Result<()> {
        let det = detector(vec![], TargetSelection::First);
        assert_eq!(det.target_box(&frame())?, BoundingBox::new(180, 0, 120, 0));
        Ok(())
    }

    #[test]
    fn non_person_yields_sentinel() -> Result<()> {
        let det = detector(
            vec![RawDetection::new(2, 0.9, 0.5, 0.5, 0.2, 0.2)],
            TargetSelection::First,
        );
        assert_eq!(det.detect(&frame())?.len(), 1);
        assert_eq!(det.target_box(&frame())?, BoundingBox::sentinel(frame().size()));
        Ok(())
    }

    #[test]
    fn low_confidence_is_dropped() -> Result<()> {
        let det = detector(
            vec![RawDetection::new(0, 0.2, 0.5, 0.5, 0.2, 0.2)],
            TargetSelection::First,
        );
        assert!(det.detect(&frame())?.is_empty());
        Ok(())
    }

    #[test]
    fn overlapping_duplicates_are_suppressed() -> Result<()> {
        let det = detector(
            vec![
                RawDetection::new(0, 0.6, 0.5, 0.5, 0.2, 0.4),
                RawDetection::new(0, 0.8, 0.51, 0.5, 0.2, 0.4),
            ],
            TargetSelection::First,
        );
        let detections = det.detect(&frame())?;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.8);
        Ok(())
    }

    #[test]
    fn first_selection_follows_backend_order() -> Result<()> {
        let det = detector(two_people(), TargetSelection::First);
        let target = det.select_target(&frame())?.unwrap();
        assert_eq!(target.confidence, 0.9);
        Ok(())
    }

    #[test]
    fn first_selection_ignores_confidence_rank() -> Result<()> {
        // The less confident person comes first; a car outranks both.
        let det = detector(
            vec![
                RawDetection::new(0, 0.4, 0.2, 0.5, 0.1, 0.2),
                RawDetection::new(2, 0.95, 0.5, 0.5, 0.1, 0.2),
                RawDetection::new(0, 0.9, 0.8, 0.5, 0.1, 0.2),
            ],
            TargetSelection::First,
        );
        let detections = det.detect(&frame())?;
        let confidences: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.4, 0.95, 0.9]);

        let target = det.select_target(&frame())?.unwrap();
        assert_eq!(target.confidence, 0.4);
        assert_eq!(target.label, "person");
        assert_eq!(det.labels().get(target.class_id), Some("person"));
        Ok(())
    }

    #[test]
    fn largest_area_selection() -> Result<()> {
        let det = detector(two_people(), TargetSelection::LargestArea);
        let target = det.select_target(&frame())?.unwrap();
        assert_eq!(target.confidence, 0.5);
        Ok(())
    }

    #[test]
    fn highest_confidence_selection() -> Result<()> {
        let det = detector(two_people(), TargetSelection::HighestConfidence);
        let target = det.select_target(&frame())?.unwrap();
        assert_eq!(target.confidence, 0.9);
        Ok(())
    }

    #[test]
    fn nearest_center_selection() -> Result<()> {
        let mut people = two_people();
        people.push(RawDetection::new(0, 0.3, 0.45, 0.5, 0.05, 0.1));
        let det = detector(people, TargetSelection::NearestCenter);
        let target = det.select_target(&frame())?.unwrap();
        assert_eq!(target.confidence, 0.3);
        Ok(())
    }

    #[test]
    fn unknown_target_label_is_rejected() {
        let result = PersonDetector::from_backend(
            StubBackend::default(),
            Labels::coco(),
            DetectorConfig {
                target_label: "pedestrian".to_string(),
                ..DetectorConfig::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn selection_parses_from_str() {
        assert_eq!(
            "nearest_center".parse::<TargetSelection>().unwrap(),
            TargetSelection::NearestCenter
        );
        assert!("closest".parse::<TargetSelection>().is_err());
    }
}
