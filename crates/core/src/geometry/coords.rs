//! Spatial values tagged with the coordinate space they live in.
//!
//! A value moves from crop space to frame space through
//! [`crate::geometry::crop::inverse_landmarks`] and from frame space to
//! original-image space through [`crate::geometry::letterbox::Letterbox`].
//! Nothing else changes the tag, so a value cannot be reprojected twice.

use std::marker::PhantomData;

use crate::shared::constants::NUM_LANDMARKS;
use crate::shared::error::ShapeError;

/// Pixel coordinates inside a resized face crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropSpace;

/// Pixel coordinates of the padded / scaled frame handed to the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSpace;

/// Pixel coordinates of the original, unpadded, unscaled input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSpace;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point<S> {
    pub x: f64,
    pub y: f64,
    space: PhantomData<S>,
}

impl<S> Point<S> {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    pub fn is_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }
}

/// Axis-aligned box stored as origin plus extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox<S> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    space: PhantomData<S>,
}

impl<S> BBox<S> {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// The "no face" box.
    pub fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn is_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.width.is_nan() || self.height.is_nan()
    }

    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point<S> {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub(crate) fn retag<T>(self) -> BBox<T> {
        BBox::new(self.x, self.y, self.width, self.height)
    }
}

/// The 68-point face shape, stored per axis so flattening to the
/// `x_0..x_67, y_0..y_67` column order is a concatenation.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet<S> {
    xs: [f64; NUM_LANDMARKS],
    ys: [f64; NUM_LANDMARKS],
    space: PhantomData<S>,
}

impl<S> LandmarkSet<S> {
    pub fn from_axes(xs: [f64; NUM_LANDMARKS], ys: [f64; NUM_LANDMARKS]) -> Self {
        Self {
            xs,
            ys,
            space: PhantomData,
        }
    }

    pub fn nan() -> Self {
        Self::from_axes([f64::NAN; NUM_LANDMARKS], [f64::NAN; NUM_LANDMARKS])
    }

    /// Parses `x0, y0, x1, y1, ...`, the layout landmark models emit.
    pub fn from_interleaved(values: &[f64]) -> Result<Self, ShapeError> {
        if values.len() != NUM_LANDMARKS * 2 {
            return Err(ShapeError::new(
                format!("{} interleaved landmark values", NUM_LANDMARKS * 2),
                vec![values.len()],
            ));
        }
        let mut xs = [0.0; NUM_LANDMARKS];
        let mut ys = [0.0; NUM_LANDMARKS];
        for (i, pair) in values.chunks_exact(2).enumerate() {
            xs[i] = pair[0];
            ys[i] = pair[1];
        }
        Ok(Self::from_axes(xs, ys))
    }

    pub fn xs(&self) -> &[f64; NUM_LANDMARKS] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64; NUM_LANDMARKS] {
        &self.ys
    }

    pub fn point(&self, i: usize) -> Point<S> {
        Point::new(self.xs[i], self.ys[i])
    }

    pub fn points(&self) -> impl Iterator<Item = Point<S>> + '_ {
        (0..NUM_LANDMARKS).map(|i| self.point(i))
    }

    pub fn is_nan(&self) -> bool {
        self.xs.iter().chain(self.ys.iter()).any(|v| v.is_nan())
    }

    /// `x_0..x_67` followed by `y_0..y_67`.
    pub fn flatten_x_then_y(&self) -> Vec<f64> {
        self.xs.iter().chain(self.ys.iter()).copied().collect()
    }

    pub(crate) fn map_axes<T>(
        &self,
        fx: impl Fn(f64) -> f64,
        fy: impl Fn(f64) -> f64,
    ) -> LandmarkSet<T> {
        LandmarkSet::from_axes(self.xs.map(fx), self.ys.map(fy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bbox_corners() {
        let b = BBox::<FrameSpace>::from_corners(10.0, 20.0, 60.0, 90.0);
        assert_relative_eq!(b.width, 50.0);
        assert_relative_eq!(b.height, 70.0);
        assert_relative_eq!(b.x2(), 60.0);
        assert_relative_eq!(b.y2(), 90.0);
    }

    #[test]
    fn test_bbox_center() {
        let c = BBox::<FrameSpace>::new(10.0, 10.0, 50.0, 30.0).center();
        assert_relative_eq!(c.x, 35.0);
        assert_relative_eq!(c.y, 25.0);
    }

    #[test]
    fn test_nan_bbox_is_nan() {
        assert!(BBox::<FrameSpace>::nan().is_nan());
        assert!(!BBox::<FrameSpace>::new(0.0, 0.0, 1.0, 1.0).is_nan());
    }

    #[test]
    fn test_from_interleaved_splits_axes() {
        let values: Vec<f64> = (0..136).map(|v| v as f64).collect();
        let lm = LandmarkSet::<CropSpace>::from_interleaved(&values).unwrap();
        assert_relative_eq!(lm.xs()[0], 0.0);
        assert_relative_eq!(lm.ys()[0], 1.0);
        assert_relative_eq!(lm.xs()[67], 134.0);
        assert_relative_eq!(lm.ys()[67], 135.0);
    }

    #[test]
    fn test_from_interleaved_wrong_length() {
        let err = LandmarkSet::<CropSpace>::from_interleaved(&[0.0; 10]).unwrap_err();
        assert_eq!(err.actual, vec![10]);
    }

    #[test]
    fn test_flatten_orders_x_before_y() {
        let mut xs = [0.0; NUM_LANDMARKS];
        let mut ys = [0.0; NUM_LANDMARKS];
        xs[3] = 7.0;
        ys[3] = 9.0;
        let flat = LandmarkSet::<FrameSpace>::from_axes(xs, ys).flatten_x_then_y();
        assert_eq!(flat.len(), 136);
        assert_relative_eq!(flat[3], 7.0);
        assert_relative_eq!(flat[NUM_LANDMARKS + 3], 9.0);
    }

    #[test]
    fn test_nan_landmarks() {
        let lm = LandmarkSet::<FrameSpace>::nan();
        assert!(lm.is_nan());
        assert!(lm.points().all(|p| p.is_nan()));
    }
}
