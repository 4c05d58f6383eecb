//! Turning raw detector tensors into face rectangles.
//!
//! Single-shot face detectors emit thousands of overlapping candidate boxes
//! per frame.  Two steps reduce them to one box per face:
//!
//! 1. [`decode_candidates`] keeps candidates above a confidence threshold and
//!    scales their normalised corners to frame pixels.
//! 2. [`non_max_suppression`] keeps the highest-scoring box of every cluster
//!    of boxes that overlap by more than an IoU threshold.

use tracker_core::FaceBox;

/// A face candidate with its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub face: FaceBox,
    pub score: f32,
}

/// Decodes `[background, face]` score pairs and normalised
/// `[x1, y1, x2, y2]` boxes into pixel-space candidates.
///
/// Boxes are clipped to the frame; boxes that collapse to zero area after
/// clipping are dropped.
pub fn decode_candidates(
    scores: &[f32],
    boxes: &[f32],
    frame_width: u32,
    frame_height: u32,
    score_threshold: f32,
) -> Vec<Candidate> {
    let w = frame_width as f32;
    let h = frame_height as f32;

    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] >= score_threshold)
        .filter_map(|(score, corners)| {
            let x1 = (corners[0] * w).clamp(0.0, w).round() as i32;
            let y1 = (corners[1] * h).clamp(0.0, h).round() as i32;
            let x2 = (corners[2] * w).clamp(0.0, w).round() as i32;
            let y2 = (corners[3] * h).clamp(0.0, h).round() as i32;
            (x2 > x1 && y2 > y1).then(|| Candidate {
                face: FaceBox::new(x1, y1, x2 - x1, y2 - y1),
                score: score[1],
            })
        })
        .collect()
}

/// Intersection-over-union of two boxes, in `[0, 1]`.
pub fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = (a.x + a.width).min(b.x + b.width);
    let iy2 = (a.y + a.height).min(b.y + b.height);

    let inter = (ix2 - ix1).max(0) as f32 * (iy2 - iy1).max(0) as f32;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = a.width as f32 * a.height as f32;
    let area_b = b.width as f32 * b.height as f32;
    inter / (area_a + area_b - inter)
}

/// Greedy non-maximum suppression, highest score first.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<FaceBox> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| iou(k, &candidate.face) <= iou_threshold) {
            kept.push(candidate.face);
        }
    }
    kept
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keeps_only_confident_candidates() {
        // Arrange: two candidates, one above and one below 0.7
        let scores = [0.1, 0.9, 0.6, 0.4];
        let boxes = [0.1, 0.1, 0.3, 0.3, 0.5, 0.5, 0.7, 0.7];

        // Act
        let found = decode_candidates(&scores, &boxes, 100, 200, 0.7);

        // Assert
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].face, FaceBox::new(10, 20, 20, 40));
        assert!((found[0].score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_clips_to_frame() {
        let scores = [0.0, 1.0];
        let boxes = [-0.2, 0.9, 0.5, 1.3];

        let found = decode_candidates(&scores, &boxes, 100, 100, 0.5);

        assert_eq!(found[0].face, FaceBox::new(0, 90, 50, 10));
    }

    #[test]
    fn test_decode_drops_degenerate_boxes() {
        let scores = [0.0, 1.0];
        let boxes = [0.5, 0.5, 0.5, 0.9];
        assert!(decode_candidates(&scores, &boxes, 100, 100, 0.5).is_empty());
    }

    #[test]
    fn test_iou_identical_boxes_is_one() {
        let a = FaceBox::new(0, 0, 10, 10);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_boxes_is_zero() {
        let a = FaceBox::new(0, 0, 10, 10);
        let b = FaceBox::new(20, 20, 10, 10);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_nms_merges_overlapping_boxes_keeping_best() {
        // Arrange: two near-identical boxes and one separate box
        let candidates = vec![
            Candidate {
                face: FaceBox::new(0, 0, 10, 10),
                score: 0.8,
            },
            Candidate {
                face: FaceBox::new(1, 1, 10, 10),
                score: 0.95,
            },
            Candidate {
                face: FaceBox::new(50, 50, 10, 10),
                score: 0.75,
            },
        ];

        // Act
        let kept = non_max_suppression(candidates, 0.3);

        // Assert: best of the cluster first, then the separate face
        assert_eq!(
            kept,
            vec![FaceBox::new(1, 1, 10, 10), FaceBox::new(50, 50, 10, 10)]
        );
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(non_max_suppression(Vec::new(), 0.3).is_empty());
    }
}
