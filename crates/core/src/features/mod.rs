//! Hand-crafted face descriptor for the feature-based action unit and
//! emotion classifiers: HOG of the aligned, masked face followed by the
//! aligned landmarks.

pub mod convex_hull;
pub mod face_alignment;
pub mod hog;

use ndarray::{Array2, ArrayView3};

use crate::geometry::coords::{CropSpace, LandmarkSet};
use crate::shared::constants::NUM_LANDMARKS;

use face_alignment::{align_face, AlignedFace, ALIGNED_SIZE};
use hog::HogParams;

pub const HOG_LEN: usize = 5408;
pub const DESCRIPTOR_LEN: usize = HOG_LEN + 2 * NUM_LANDMARKS;

const JAW_LEFT: usize = 0;
const JAW_RIGHT: usize = 16;

/// Zeroes everything outside the landmark hull, keeping the forehead band
/// above the jaw endpoints.
pub fn mask_face(aligned: &mut AlignedFace) {
    let lm = &aligned.landmarks;
    let points: Vec<(f64, f64)> = lm.points().map(|p| (p.x, p.y)).collect();
    let mut mask = convex_hull::hull_mask(&points, ALIGNED_SIZE, ALIGNED_SIZE);

    let band_bottom = lm.ys()[JAW_LEFT].min(lm.ys()[JAW_RIGHT]).max(0.0) as usize;
    let x0 = lm.xs()[JAW_LEFT].max(0.0) as usize;
    let x1 = (lm.xs()[JAW_RIGHT].max(0.0) as usize).min(ALIGNED_SIZE);
    for r in 0..band_bottom.min(ALIGNED_SIZE) {
        for c in x0..x1 {
            mask[[r, c]] = true;
        }
    }

    aligned
        .image
        .zip_mut_with(&mask, |px, keep| {
            if !keep {
                *px = 0.0;
            }
        });
}

/// One descriptor row: HOG followed by aligned x then y landmarks.
/// NaN landmarks give an all-NaN row.
pub fn face_descriptor(crop: ArrayView3<'_, f32>, landmarks: &LandmarkSet<CropSpace>) -> Vec<f32> {
    let Some(mut aligned) = align_face(crop, landmarks) else {
        return vec![f32::NAN; DESCRIPTOR_LEN];
    };
    mask_face(&mut aligned);
    let mut row = hog::hog(aligned.image.view(), &HogParams::default());
    row.extend(aligned.landmarks.flatten_x_then_y().into_iter().map(|v| v as f32));
    row
}

/// Stacks [`face_descriptor`] over a `(N, 3, S, S)` crop batch.
pub fn face_descriptors(
    crops: ndarray::ArrayView4<'_, f32>,
    landmarks: &[LandmarkSet<CropSpace>],
) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((landmarks.len(), DESCRIPTOR_LEN));
    for (i, (crop, lm)) in crops.outer_iter().zip(landmarks).enumerate() {
        let row = face_descriptor(crop, lm);
        out.row_mut(i)
            .iter_mut()
            .zip(row)
            .for_each(|(dst, v)| *dst = v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn face_landmarks() -> LandmarkSet<CropSpace> {
        // Oval of 68 points with eyes and mouth inside it.
        let mut xs = [0.0; NUM_LANDMARKS];
        let mut ys = [0.0; NUM_LANDMARKS];
        for i in 0..NUM_LANDMARKS {
            let t = i as f64 / NUM_LANDMARKS as f64 * std::f64::consts::TAU;
            xs[i] = 56.0 + 30.0 * t.cos();
            ys[i] = 60.0 + 40.0 * t.sin();
        }
        for i in 36..42 {
            (xs[i], ys[i]) = (44.0, 50.0);
        }
        for i in 42..48 {
            (xs[i], ys[i]) = (68.0, 50.0);
        }
        (xs[30], ys[30]) = (56.0, 62.0);
        (xs[48], ys[48]) = (46.0, 78.0);
        (xs[54], ys[54]) = (66.0, 78.0);
        LandmarkSet::from_axes(xs, ys)
    }

    #[test]
    fn test_descriptor_width() {
        let crop = Array3::from_shape_fn((3, 112, 112), |(_, y, x)| ((x * y) % 17) as f32 / 17.0);
        let row = face_descriptor(crop.view(), &face_landmarks());
        assert_eq!(row.len(), DESCRIPTOR_LEN);
        assert!(row.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_sentinel_landmarks_give_nan_row() {
        let crops = Array4::<f32>::zeros((2, 3, 112, 112));
        let lms = vec![face_landmarks(), LandmarkSet::nan()];
        let rows = face_descriptors(crops.view(), &lms);
        assert_eq!(rows.shape(), &[2, DESCRIPTOR_LEN]);
        assert!(rows.row(0).iter().all(|v| v.is_finite()));
        assert!(rows.row(1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_mask_zeroes_corners() {
        let crop = Array3::<f32>::ones((3, 112, 112));
        let mut aligned = align_face(crop.view(), &face_landmarks()).unwrap();
        mask_face(&mut aligned);
        assert_eq!(aligned.image[[ALIGNED_SIZE - 1, 0]], 0.0);
        assert_eq!(aligned.image[[ALIGNED_SIZE - 1, ALIGNED_SIZE - 1]], 0.0);
    }
}
