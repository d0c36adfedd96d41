//! Face crop extraction and the inverse mapping of crop-space predictions.
//!
//! Crop pixel `(i, j)` of an `S x S` crop samples the frame at the center of
//! the matching cell of the effective box, so a crop-space coordinate `c`
//! maps back as `c / S * box_extent + box_origin` on each axis.

use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::geometry::coords::{BBox, CropSpace, FrameSpace, LandmarkSet};
use crate::shared::error::ConfigError;
use crate::shared::frame::Frame;

/// Crop geometry a predictor asks for.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropSpec {
    /// Output side length in pixels.
    pub size: u32,
    /// Box scale factor around its center, applied before clamping.
    pub expand: f64,
}

impl CropSpec {
    pub const fn new(size: u32, expand: f64) -> Self {
        Self { size, expand }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::InvalidValue {
                option: "crop size",
                reason: "must be at least 1 pixel".into(),
            });
        }
        if !(self.expand.is_finite() && self.expand > 0.0) {
            return Err(ConfigError::InvalidValue {
                option: "crop expand ratio",
                reason: format!("must be a positive number, got {}", self.expand),
            });
        }
        Ok(())
    }
}

/// The box a crop was actually taken from (post-expand, post-clamp) and the
/// crop's side length. Inverting through anything else drifts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropWindow {
    pub bbox: BBox<FrameSpace>,
    pub size: u32,
}

impl CropWindow {
    pub fn nan(size: u32) -> Self {
        Self {
            bbox: BBox::nan(),
            size,
        }
    }
}

pub fn expand_box(bbox: &BBox<FrameSpace>, expand: f64) -> BBox<FrameSpace> {
    let c = bbox.center();
    let w = bbox.width * expand;
    let h = bbox.height * expand;
    BBox::new(c.x - w / 2.0, c.y - h / 2.0, w, h)
}

pub fn clamp_box(bbox: &BBox<FrameSpace>, width: u32, height: u32) -> BBox<FrameSpace> {
    let x1 = bbox.x.max(0.0);
    let y1 = bbox.y.max(0.0);
    let x2 = bbox.x2().min(width as f64);
    let y2 = bbox.y2().min(height as f64);
    BBox::from_corners(x1, y1, x2.max(x1), y2.max(y1))
}

/// All-zero `(3, size, size)` crop, used where there is nothing to crop.
pub fn zero_crop(size: u32) -> Array3<f32> {
    Array3::zeros((3, size as usize, size as usize))
}

/// Expands, clamps and resizes `bbox` out of `frame` into a channel-first
/// `(3, size, size)` crop with values in `[0, 1]`.
///
/// A NaN box yields a zero crop and a NaN window; a box that clamps to
/// nothing yields a zero crop and the degenerate window.
pub fn crop_and_resize(
    frame: &Frame,
    bbox: &BBox<FrameSpace>,
    spec: CropSpec,
) -> (Array3<f32>, CropWindow) {
    let size = spec.size;
    if bbox.is_nan() {
        return (zero_crop(size), CropWindow::nan(size));
    }

    let effective = clamp_box(&expand_box(bbox, spec.expand), frame.width(), frame.height());
    let window = CropWindow {
        bbox: effective,
        size,
    };
    if effective.width <= 0.0 || effective.height <= 0.0 {
        return (zero_crop(size), window);
    }

    let src = frame.as_ndarray();
    let n = size as usize;
    let step_x = effective.width / size as f64;
    let step_y = effective.height / size as f64;
    let mut crop = zero_crop(size);
    for i in 0..n {
        let sy = effective.y + (i as f64 + 0.5) * step_y - 0.5;
        for j in 0..n {
            let sx = effective.x + (j as f64 + 0.5) * step_x - 0.5;
            for c in 0..Frame::CHANNELS {
                crop[[c, i, j]] = sample_hwc(&src, sx, sy, c) / 255.0;
            }
        }
    }
    (crop, window)
}

/// Maps crop-space landmarks into the frame through the crop's window.
pub fn inverse_landmarks(
    landmarks: &LandmarkSet<CropSpace>,
    window: &CropWindow,
) -> LandmarkSet<FrameSpace> {
    let s = window.size as f64;
    let b = window.bbox;
    landmarks.map_axes(|x| x / s * b.width + b.x, |y| y / s * b.height + b.y)
}

/// Maps frame-space landmarks into a crop window; the inverse of
/// [`inverse_landmarks`].
pub fn project_landmarks(
    landmarks: &LandmarkSet<FrameSpace>,
    window: &CropWindow,
) -> LandmarkSet<CropSpace> {
    let s = window.size as f64;
    let b = window.bbox;
    landmarks.map_axes(|x| (x - b.x) / b.width * s, |y| (y - b.y) / b.height * s)
}

/// Bilinear sample with edge clamping over a `width x height` grid whose
/// values are read through `at(x, y)`.
pub(crate) fn bilinear(
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    at: impl Fn(usize, usize) -> f32,
) -> f32 {
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

fn sample_hwc(src: &ArrayView3<'_, u8>, x: f64, y: f64, c: usize) -> f32 {
    let (h, w) = (src.shape()[0], src.shape()[1]);
    bilinear(w, h, x, y, |px, py| src[[py, px, c]] as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::NUM_LANDMARKS;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn gradient_frame(w: u32, h: u32) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for _y in 0..h {
            for x in 0..w {
                let v = (x * 255 / (w - 1)) as u8;
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(data, w, h, 0).unwrap()
    }

    fn frame_box(x: f64, y: f64, w: f64, h: f64) -> BBox<FrameSpace> {
        BBox::new(x, y, w, h)
    }

    #[test]
    fn test_expand_keeps_center() {
        let b = expand_box(&frame_box(10.0, 10.0, 50.0, 50.0), 1.1);
        assert_relative_eq!(b.width, 55.0);
        assert_relative_eq!(b.x, 7.5);
        assert_relative_eq!(b.center().x, 35.0);
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = clamp_box(&frame_box(-10.0, 80.0, 50.0, 50.0), 100, 100);
        assert_relative_eq!(b.x, 0.0);
        assert_relative_eq!(b.width, 40.0);
        assert_relative_eq!(b.y, 80.0);
        assert_relative_eq!(b.height, 20.0);
    }

    #[test]
    fn test_clamp_box_outside_frame_is_degenerate() {
        let b = clamp_box(&frame_box(200.0, 200.0, 10.0, 10.0), 100, 100);
        assert_relative_eq!(b.width, 0.0);
        assert_relative_eq!(b.height, 0.0);
    }

    #[test]
    fn test_crop_shape_and_window() {
        let frame = gradient_frame(100, 100);
        let (crop, window) = crop_and_resize(&frame, &frame_box(10.0, 10.0, 50.0, 50.0), CropSpec::new(112, 1.0));
        assert_eq!(crop.shape(), &[3, 112, 112]);
        assert_eq!(window.bbox, frame_box(10.0, 10.0, 50.0, 50.0));
        assert_eq!(window.size, 112);
    }

    #[test]
    fn test_crop_reports_expanded_clamped_box() {
        let frame = gradient_frame(100, 100);
        let (_, window) = crop_and_resize(&frame, &frame_box(0.0, 0.0, 50.0, 50.0), CropSpec::new(224, 1.1));
        // expanded to (-2.5, -2.5, 55, 55), clamped at the origin
        assert_relative_eq!(window.bbox.x, 0.0);
        assert_relative_eq!(window.bbox.width, 52.5);
    }

    #[test]
    fn test_crop_is_axis_aligned_resize() {
        // Horizontal gradient stays horizontal: columns vary, rows do not.
        let frame = gradient_frame(64, 64);
        let (crop, _) = crop_and_resize(&frame, &frame_box(0.0, 0.0, 64.0, 64.0), CropSpec::new(32, 1.0));
        assert_relative_eq!(crop[[0, 0, 5]], crop[[0, 31, 5]], epsilon = 1e-6);
        assert!(crop[[0, 10, 30]] > crop[[0, 10, 1]]);
        assert!(crop.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_crop_nan_box_gives_zero_crop() {
        let frame = gradient_frame(32, 32);
        let (crop, window) = crop_and_resize(&frame, &BBox::nan(), CropSpec::new(16, 1.0));
        assert!(crop.iter().all(|v| *v == 0.0));
        assert!(window.bbox.is_nan());
        assert_eq!(window.size, 16);
    }

    #[test]
    fn test_crop_box_outside_frame_gives_zero_crop() {
        let frame = gradient_frame(32, 32);
        let (crop, _) = crop_and_resize(&frame, &frame_box(100.0, 100.0, 5.0, 5.0), CropSpec::new(8, 1.0));
        assert!(crop.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_inverse_landmarks_formula() {
        let mut xs = [0.0; NUM_LANDMARKS];
        let mut ys = [0.0; NUM_LANDMARKS];
        xs[0] = 56.0;
        ys[0] = 112.0;
        let lm = LandmarkSet::<CropSpace>::from_axes(xs, ys);
        let window = CropWindow {
            bbox: frame_box(10.0, 20.0, 50.0, 100.0),
            size: 112,
        };
        let out = inverse_landmarks(&lm, &window);
        assert_relative_eq!(out.xs()[0], 35.0);
        assert_relative_eq!(out.ys()[0], 120.0);
        assert_relative_eq!(out.xs()[1], 10.0);
    }

    #[rstest]
    #[case(112, frame_box(10.0, 10.0, 50.0, 50.0))]
    #[case(224, frame_box(3.25, 40.5, 17.0, 91.0))]
    fn test_project_then_inverse_recovers_points(#[case] size: u32, #[case] bbox: BBox<FrameSpace>) {
        let xs: [f64; NUM_LANDMARKS] = std::array::from_fn(|i| bbox.x + i as f64 * 0.3);
        let ys: [f64; NUM_LANDMARKS] = std::array::from_fn(|i| bbox.y + i as f64 * 0.7);
        let original = LandmarkSet::<FrameSpace>::from_axes(xs, ys);
        let window = CropWindow { bbox, size };
        let back = inverse_landmarks(&project_landmarks(&original, &window), &window);
        for i in 0..NUM_LANDMARKS {
            assert_relative_eq!(back.xs()[i], original.xs()[i], epsilon = 1e-9);
            assert_relative_eq!(back.ys()[i], original.ys()[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_inverse_with_nan_window_is_nan() {
        let lm = LandmarkSet::<CropSpace>::from_axes([1.0; NUM_LANDMARKS], [1.0; NUM_LANDMARKS]);
        let out = inverse_landmarks(&lm, &CropWindow::nan(112));
        assert!(out.xs().iter().all(|v| v.is_nan()));
    }

    #[rstest]
    #[case::zero_size(CropSpec::new(0, 1.0))]
    #[case::zero_expand(CropSpec::new(112, 0.0))]
    #[case::nan_expand(CropSpec::new(112, f64::NAN))]
    fn test_invalid_crop_spec(#[case] spec: CropSpec) {
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_bilinear_midpoint() {
        let grid = [[0.0f32, 10.0], [20.0, 30.0]];
        let v = bilinear(2, 2, 0.5, 0.5, |x, y| grid[y][x]);
        assert_relative_eq!(v, 15.0);
    }
}
