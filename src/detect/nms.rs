//! Non-maximum suppression over pixel-space boxes.

use crate::BoundingBox;

/// Indices of the boxes that survive suppression, highest score first.
///
/// Candidates scoring at or below `score_threshold` are discarded. Walking the
/// rest in descending score order, a box is kept unless its IoU with an
/// already kept box exceeds `iou_threshold`. Equal scores keep input order.
pub fn non_max_suppression(
    boxes: &[BoundingBox],
    scores: &[f32],
    score_threshold: f32,
    iou_threshold: f32,
) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), scores.len());

    let mut order: Vec<usize> = (0..boxes.len().min(scores.len()))
        .filter(|&i| scores[i] > score_threshold)
        .collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for candidate in order {
        let overlaps = kept
            .iter()
            .any(|&k| boxes[k].iou(&boxes[candidate]) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppresses_overlapping_lower_score() {
        let boxes = [
            BoundingBox::new(0, 100, 0, 100),
            BoundingBox::new(10, 100, 10, 100),
            BoundingBox::new(200, 50, 0, 50),
        ];
        let scores = [0.6, 0.9, 0.5];
        let kept = non_max_suppression(&boxes, &scores, 0.2, 0.4);
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn drops_scores_at_threshold() {
        let boxes = [BoundingBox::new(0, 10, 0, 10), BoundingBox::new(50, 10, 0, 10)];
        let scores = [0.2, 0.21];
        assert_eq!(non_max_suppression(&boxes, &scores, 0.2, 0.4), vec![1]);
    }

    #[test]
    fn overlap_compared_against_iou_threshold() {
        // IoU of these two is exactly 1/3.
        let boxes = [BoundingBox::new(0, 10, 0, 10), BoundingBox::new(5, 10, 0, 10)];
        let scores = [0.9, 0.8];
        assert_eq!(non_max_suppression(&boxes, &scores, 0.2, 0.5), vec![0, 1]);
        assert_eq!(non_max_suppression(&boxes, &scores, 0.2, 0.3), vec![0]);
    }

    #[test]
    fn empty_input_keeps_nothing() {
        assert!(non_max_suppression(&[], &[], 0.2, 0.4).is_empty());
    }
}
