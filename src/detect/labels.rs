//! Class label tables.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Class names of the 80-class COCO detection set, in model output order.
pub const COCO_LABELS: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorbike",
    "aeroplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "sofa",
    "pottedplant",
    "bed",
    "diningtable",
    "toilet",
    "tvmonitor",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Class id to name lookup, owned by the detector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labels {
    names: Vec<String>,
}

impl Labels {
    pub fn coco() -> Self {
        Self {
            names: COCO_LABELS.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Parse one label per line. Entries are trimmed and blank lines skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let names: Vec<String> = text
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();
        if names.is_empty() {
            return Err(anyhow!("label table is empty"));
        }
        Ok(Self { names })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels from {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid labels file {}", path.display()))
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn id_of(&self, label: &str) -> Option<usize> {
        self.names.iter().position(|name| name == label)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::coco()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_starts_with_person() {
        let labels = Labels::coco();
        assert_eq!(labels.len(), 80);
        assert_eq!(labels.get(0), Some("person"));
        assert_eq!(labels.id_of("dog"), Some(16));
        assert_eq!(labels.get(80), None);
    }

    #[test]
    fn parse_trims_and_skips_blank_lines() -> Result<()> {
        let labels = Labels::parse("person\r\n\n  bicycle  \ncar\n")?;
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(1), Some("bicycle"));
        Ok(())
    }

    #[test]
    fn parse_rejects_empty_table() {
        assert!(Labels::parse("\n \n").is_err());
    }
}
