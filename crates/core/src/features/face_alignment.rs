//! Similarity alignment of a face crop: eyes level, reference points
//! centered, scaled so their extent times [`BOX_ENLARGE`] fills the output.

use ndarray::{Array2, ArrayView3};

use crate::geometry::coords::{CropSpace, LandmarkSet};
use crate::geometry::crop::bilinear;

pub const ALIGNED_SIZE: usize = 112;
pub const BOX_ENLARGE: f64 = 2.5;

/// Fill for output pixels that map outside the source crop.
const BORDER: f32 = 0.5;

const LEFT_EYE: std::ops::Range<usize> = 36..42;
const RIGHT_EYE: std::ops::Range<usize> = 42..48;
const NOSE_TIP: usize = 30;
const MOUTH_LEFT: usize = 48;
const MOUTH_RIGHT: usize = 54;

/// Pixel space of the aligned face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignedSpace;

/// Rotation + uniform scale + translation, `p' = s * R * p + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityTransform {
    cos: f64,
    sin: f64,
    scale: f64,
    tx: f64,
    ty: f64,
}

impl SimilarityTransform {
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let rx = self.cos * x + self.sin * y;
        let ry = -self.sin * x + self.cos * y;
        (self.scale * rx + self.tx, self.scale * ry + self.ty)
    }

    pub fn invert(&self, u: f64, v: f64) -> (f64, f64) {
        let rx = (u - self.tx) / self.scale;
        let ry = (v - self.ty) / self.scale;
        (self.cos * rx - self.sin * ry, self.sin * rx + self.cos * ry)
    }
}

pub struct AlignedFace {
    /// Grayscale, `(ALIGNED_SIZE, ALIGNED_SIZE)`, values in `[0, 1]`.
    pub image: Array2<f32>,
    pub landmarks: LandmarkSet<AlignedSpace>,
}

fn mean_point(lm: &LandmarkSet<CropSpace>, range: std::ops::Range<usize>) -> (f64, f64) {
    let n = range.len() as f64;
    let (sx, sy) = range.fold((0.0, 0.0), |(sx, sy), i| {
        (sx + lm.xs()[i], sy + lm.ys()[i])
    });
    (sx / n, sy / n)
}

/// Builds the crop-to-aligned transform from eye centers, nose tip and
/// mouth corners. Returns `None` for NaN or degenerate landmarks.
pub fn alignment_transform(lm: &LandmarkSet<CropSpace>) -> Option<SimilarityTransform> {
    if lm.is_nan() {
        return None;
    }
    let left = mean_point(lm, LEFT_EYE);
    let right = mean_point(lm, RIGHT_EYE);
    let (dx, dy) = (right.0 - left.0, right.1 - left.1);
    let dist = (dx * dx + dy * dy).sqrt();
    if dist <= f64::EPSILON {
        return None;
    }
    let (cos, sin) = (dx / dist, dy / dist);

    let reference = [
        left,
        right,
        (lm.xs()[NOSE_TIP], lm.ys()[NOSE_TIP]),
        (lm.xs()[MOUTH_LEFT], lm.ys()[MOUTH_LEFT]),
        (lm.xs()[MOUTH_RIGHT], lm.ys()[MOUTH_RIGHT]),
    ];
    let rotated: Vec<(f64, f64)> = reference
        .iter()
        .map(|&(x, y)| (cos * x + sin * y, -sin * x + cos * y))
        .collect();
    let (min_x, max_x) = min_max(rotated.iter().map(|p| p.0));
    let (min_y, max_y) = min_max(rotated.iter().map(|p| p.1));
    let half = 0.5 * BOX_ENLARGE * (max_x - min_x).max(max_y - min_y);
    if half <= f64::EPSILON {
        return None;
    }
    let (cx, cy) = ((max_x + min_x) / 2.0, (max_y + min_y) / 2.0);
    let scale = (ALIGNED_SIZE as f64 - 1.0) / (2.0 * half);

    Some(SimilarityTransform {
        cos,
        sin,
        scale,
        tx: scale * (half - cx),
        ty: scale * (half - cy),
    })
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Aligns a channel-first `(3, S, S)` crop given its crop-space landmarks.
pub fn align_face(crop: ArrayView3<'_, f32>, lm: &LandmarkSet<CropSpace>) -> Option<AlignedFace> {
    let transform = alignment_transform(lm)?;
    let (h, w) = (crop.shape()[1], crop.shape()[2]);
    let gray = Array2::from_shape_fn((h, w), |(y, x)| {
        0.299 * crop[[0, y, x]] + 0.587 * crop[[1, y, x]] + 0.114 * crop[[2, y, x]]
    });

    let image = Array2::from_shape_fn((ALIGNED_SIZE, ALIGNED_SIZE), |(v, u)| {
        let (x, y) = transform.invert(u as f64, v as f64);
        if x < -0.5 || y < -0.5 || x > w as f64 - 0.5 || y > h as f64 - 0.5 {
            BORDER
        } else {
            bilinear(w, h, x, y, |px, py| gray[[py, px]])
        }
    });

    let mut xs = *lm.xs();
    let mut ys = *lm.ys();
    for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
        (*x, *y) = transform.apply(*x, *y);
    }
    Some(AlignedFace {
        image,
        landmarks: LandmarkSet::from_axes(xs, ys),
    })
}
