use crate::geometry::coords::{BBox, FrameSpace};

/// Number of pose values: pitch, roll, yaw, then x, y, z translation.
pub const POSE_DOF: usize = 6;

/// One candidate face in (possibly letterboxed) frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox<FrameSpace>,
    pub pose: [f64; POSE_DOF],
    pub score: f64,
}

impl Detection {
    pub fn new(bbox: BBox<FrameSpace>, pose: [f64; POSE_DOF], score: f64) -> Self {
        Self { bbox, pose, score }
    }

    /// Placeholder for "no face": NaN box and pose, zero score.
    pub fn sentinel() -> Self {
        Self {
            bbox: BBox::nan(),
            pose: [f64::NAN; POSE_DOF],
            score: 0.0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.bbox.is_nan()
    }
}

/// Keeps candidates scoring at least `threshold`, in detector order.
///
/// Never returns an empty vector: a frame with no surviving candidate gets a
/// single sentinel.
pub fn select_detections(candidates: Vec<Detection>, threshold: f64) -> Vec<Detection> {
    let kept: Vec<Detection> = candidates
        .into_iter()
        .filter(|d| d.score >= threshold && !d.bbox.is_nan())
        .collect();
    if kept.is_empty() {
        vec![Detection::sentinel()]
    } else {
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn det(score: f64) -> Detection {
        Detection::new(BBox::new(0.0, 0.0, 10.0, 10.0), [0.0; POSE_DOF], score)
    }

    #[rstest]
    #[case(vec![], 1, true)]
    #[case(vec![0.1, 0.2], 1, true)]
    #[case(vec![0.9, 0.2, 0.5], 2, false)]
    #[case(vec![0.5], 1, false)]
    fn test_select_detections(
        #[case] scores: Vec<f64>,
        #[case] expected_len: usize,
        #[case] expect_sentinel: bool,
    ) {
        let kept = select_detections(scores.into_iter().map(det).collect(), 0.5);
        assert_eq!(kept.len(), expected_len);
        assert_eq!(kept[0].is_sentinel(), expect_sentinel);
    }

    #[test]
    fn test_select_preserves_order() {
        let kept = select_detections(vec![det(0.6), det(0.95), det(0.7)], 0.5);
        let scores: Vec<f64> = kept.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![0.6, 0.95, 0.7]);
    }

    #[test]
    fn test_sentinel_fields() {
        let s = Detection::sentinel();
        assert!(s.is_sentinel());
        assert_eq!(s.score, 0.0);
        assert!(s.pose.iter().all(|v| v.is_nan()));
    }
}
