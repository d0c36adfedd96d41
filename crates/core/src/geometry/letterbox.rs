//! Letterboxing (uniform scale plus padding) applied by the loaders, and its
//! exact inverse used to report results in original-image coordinates.

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::geometry::coords::{BBox, FrameSpace, ImageSpace, LandmarkSet, Point};
use crate::shared::error::ShapeError;
use crate::shared::frame::Frame;

/// `(coord - padding) / scale`, the per-axis inverse of letterboxing.
///
/// NaN stays NaN. Extents (box width / height) pass `padding = 0`.
pub fn undo_letterbox(coord: f64, padding: f64, scale: f64) -> f64 {
    (coord - padding) / scale
}

pub fn apply_letterbox(coord: f64, padding: f64, scale: f64) -> f64 {
    coord * scale + padding
}

/// Affine preprocessing a loader applied to reach the batch frame size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Letterbox {
    pub scale: f64,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub original_width: u32,
    pub original_height: u32,
}

impl Letterbox {
    /// No scaling, no padding.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            scale: 1.0,
            left: 0.0,
            top: 0.0,
            right: 0.0,
            bottom: 0.0,
            original_width: width,
            original_height: height,
        }
    }

    /// Aspect-preserving fit of a `width x height` image into a
    /// `target x target` square, centered, remainder padding on the
    /// right / bottom.
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = target as f64 / width.max(height).max(1) as f64;
        let (new_w, new_h) = scaled_size(width, height, scale);
        let pad_x = target.saturating_sub(new_w);
        let pad_y = target.saturating_sub(new_h);
        Self {
            scale,
            left: (pad_x / 2) as f64,
            top: (pad_y / 2) as f64,
            right: (pad_x - pad_x / 2) as f64,
            bottom: (pad_y - pad_y / 2) as f64,
            original_width: width,
            original_height: height,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.left == 0.0 && self.top == 0.0
    }

    pub fn undo_point(&self, p: Point<FrameSpace>) -> Point<ImageSpace> {
        Point::new(
            undo_letterbox(p.x, self.left, self.scale),
            undo_letterbox(p.y, self.top, self.scale),
        )
    }

    pub fn undo_box(&self, b: &BBox<FrameSpace>) -> BBox<ImageSpace> {
        BBox::new(
            undo_letterbox(b.x, self.left, self.scale),
            undo_letterbox(b.y, self.top, self.scale),
            undo_letterbox(b.width, 0.0, self.scale),
            undo_letterbox(b.height, 0.0, self.scale),
        )
    }

    pub fn undo_landmarks(&self, lm: &LandmarkSet<FrameSpace>) -> LandmarkSet<ImageSpace> {
        lm.map_axes(
            |x| undo_letterbox(x, self.left, self.scale),
            |y| undo_letterbox(y, self.top, self.scale),
        )
    }

    pub fn apply_point(&self, p: Point<ImageSpace>) -> Point<FrameSpace> {
        Point::new(
            apply_letterbox(p.x, self.left, self.scale),
            apply_letterbox(p.y, self.top, self.scale),
        )
    }

    pub fn apply_box(&self, b: &BBox<ImageSpace>) -> BBox<FrameSpace> {
        BBox::new(
            apply_letterbox(b.x, self.left, self.scale),
            apply_letterbox(b.y, self.top, self.scale),
            apply_letterbox(b.width, 0.0, self.scale),
            apply_letterbox(b.height, 0.0, self.scale),
        )
    }

    pub fn apply_landmarks(&self, lm: &LandmarkSet<ImageSpace>) -> LandmarkSet<FrameSpace> {
        lm.map_axes(
            |x| apply_letterbox(x, self.left, self.scale),
            |y| apply_letterbox(y, self.top, self.scale),
        )
    }
}

fn scaled_size(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Resizes `frame` into a zero-padded `target x target` square.
pub fn letterbox_frame(frame: &Frame, target: u32) -> Result<(Frame, Letterbox), ShapeError> {
    let (w, h) = (frame.width(), frame.height());
    let letterbox = Letterbox::fit(w, h, target);
    let source = image::RgbImage::from_raw(w, h, frame.data())
        .ok_or_else(|| ShapeError::new(format!("{w}x{h} RGB buffer"), vec![h as usize, w as usize]))?;

    let (new_w, new_h) = scaled_size(w, h, letterbox.scale);
    let resized = imageops::resize(&source, new_w, new_h, FilterType::Triangle);
    let mut canvas = image::RgbImage::new(target, target);
    imageops::replace(&mut canvas, &resized, letterbox.left as i64, letterbox.top as i64);

    let boxed = Frame::new(canvas.into_raw(), target, target, frame.index())?;
    Ok((boxed, letterbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::NUM_LANDMARKS;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_fit_wide_image() {
        let lb = Letterbox::fit(200, 100, 400);
        assert_relative_eq!(lb.scale, 2.0);
        assert_relative_eq!(lb.left, 0.0);
        assert_relative_eq!(lb.top, 100.0);
        assert_relative_eq!(lb.bottom, 100.0);
    }

    #[test]
    fn test_fit_odd_padding_goes_right() {
        let lb = Letterbox::fit(100, 97, 100);
        assert_relative_eq!(lb.top, 1.0);
        assert_relative_eq!(lb.bottom, 2.0);
    }

    #[test]
    fn test_identity_is_identity() {
        assert!(Letterbox::identity(10, 10).is_identity());
        assert!(!Letterbox::fit(10, 20, 40).is_identity());
    }

    #[test]
    fn test_undo_box_scenario() {
        // Box (10,10,50,50), scale 0.5, padding (5,5) -> origin (10,10), extent (100,100)
        let lb = Letterbox {
            scale: 0.5,
            left: 5.0,
            top: 5.0,
            right: 5.0,
            bottom: 5.0,
            original_width: 180,
            original_height: 180,
        };
        let out = lb.undo_box(&BBox::new(10.0, 10.0, 50.0, 50.0));
        assert_relative_eq!(out.x, 10.0);
        assert_relative_eq!(out.y, 10.0);
        assert_relative_eq!(out.width, 100.0);
        assert_relative_eq!(out.height, 100.0);
    }

    #[rstest]
    #[case(1.0, 0.0, 0.0)]
    #[case(0.5, 5.0, 5.0)]
    #[case(3.7, 0.0, 120.0)]
    #[case(0.013, 17.0, 2.0)]
    fn test_round_trip_box_and_landmarks(#[case] scale: f64, #[case] left: f64, #[case] top: f64) {
        let lb = Letterbox {
            scale,
            left,
            top,
            right: left,
            bottom: top,
            original_width: 640,
            original_height: 480,
        };
        let b = BBox::<ImageSpace>::new(12.5, 300.25, 41.0, 77.75);
        let back = lb.undo_box(&lb.apply_box(&b));
        assert_relative_eq!(back.x, b.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, b.y, epsilon = 1e-9);
        assert_relative_eq!(back.width, b.width, epsilon = 1e-9);
        assert_relative_eq!(back.height, b.height, epsilon = 1e-9);

        let xs: [f64; NUM_LANDMARKS] = std::array::from_fn(|i| i as f64 * 1.5);
        let ys: [f64; NUM_LANDMARKS] = std::array::from_fn(|i| 400.0 - i as f64);
        let lm = LandmarkSet::<ImageSpace>::from_axes(xs, ys);
        let back = lb.undo_landmarks(&lb.apply_landmarks(&lm));
        for i in 0..NUM_LANDMARKS {
            assert_relative_eq!(back.xs()[i], xs[i], epsilon = 1e-9);
            assert_relative_eq!(back.ys()[i], ys[i], epsilon = 1e-9);
        }

        let p = Point::<ImageSpace>::new(3.0, 9.0);
        let back = lb.undo_point(lb.apply_point(p));
        assert_relative_eq!(back.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(back.y, 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_undo_nan_stays_nan() {
        let lb = Letterbox::fit(100, 50, 200);
        assert!(lb.undo_box(&BBox::nan()).is_nan());
        assert!(undo_letterbox(f64::NAN, 3.0, 2.0).is_nan());
    }

    #[test]
    fn test_letterbox_frame_dimensions_and_padding() {
        let frame = Frame::new(vec![200u8; 40 * 20 * 3], 40, 20, 7).unwrap();
        let (boxed, lb) = letterbox_frame(&frame, 80).unwrap();
        assert_eq!(boxed.width(), 80);
        assert_eq!(boxed.height(), 80);
        assert_eq!(boxed.index(), 7);
        assert_relative_eq!(lb.scale, 2.0);
        assert_relative_eq!(lb.top, 20.0);
        let px = boxed.as_ndarray();
        assert_eq!(px[[0, 40, 0]], 0); // padding row
        assert_eq!(px[[40, 40, 0]], 200); // image content
        assert_eq!(lb.original_width, 40);
        assert_eq!(lb.original_height, 20);
    }
}
