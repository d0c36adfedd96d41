use ndarray::{Array3, ArrayView3, ArrayViewD, Axis};

use crate::shared::error::ShapeError;

/// A single decoded image: RGB bytes laid out as `(height, width, 3)`.
///
/// `index` is the frame identifier the rest of the pipeline keys on: the
/// position in the input list for images and tensors, the native frame index
/// for video.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pixels: Array3<u8>,
    index: usize,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wraps a tightly packed row-major RGB buffer.
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Result<Self, ShapeError> {
        let shape = (height as usize, width as usize, Self::CHANNELS);
        let len = data.len();
        let pixels = Array3::from_shape_vec(shape, data).map_err(|_| {
            ShapeError::new(
                format!("{} bytes for a {width}x{height} RGB frame", shape.0 * shape.1 * shape.2),
                vec![len],
            )
        })?;
        Ok(Self { pixels, index })
    }

    pub fn from_pixels(pixels: Array3<u8>, index: usize) -> Result<Self, ShapeError> {
        if pixels.shape()[2] != Self::CHANNELS {
            return Err(ShapeError::new("(H, W, 3) pixels", pixels.shape().to_vec()));
        }
        Ok(Self { pixels, index })
    }

    /// Builds a frame from a channel-first `(3, H, W)` tensor with values in
    /// `0..=255`. Values are rounded and saturated into `u8`.
    pub fn from_chw(tensor: ArrayViewD<'_, f32>, index: usize) -> Result<Self, ShapeError> {
        if tensor.ndim() != 3 || tensor.shape()[0] != Self::CHANNELS {
            return Err(ShapeError::new("(3, H, W) tensor", tensor.shape().to_vec()));
        }
        let hwc = tensor.permuted_axes(vec![1, 2, 0]);
        let (h, w) = (hwc.shape()[0], hwc.shape()[1]);
        let pixels = Array3::from_shape_fn((h, w, Self::CHANNELS), |(y, x, c)| {
            hwc[[y, x, c]].round().clamp(0.0, 255.0) as u8
        });
        Ok(Self { pixels, index })
    }

    pub fn width(&self) -> u32 {
        self.pixels.len_of(Axis(1)) as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.len_of(Axis(0)) as u32
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    /// Row-major RGB bytes; contiguous because frames are only built from
    /// owned standard-layout arrays.
    pub fn data(&self) -> Vec<u8> {
        self.pixels.iter().copied().collect()
    }

    /// Channel-first float copy scaled to `[0, 1]`, the layout every
    /// predictor consumes.
    pub fn to_unit_chw(&self) -> Array3<f32> {
        let (h, w) = (self.height() as usize, self.width() as usize);
        Array3::from_shape_fn((Self::CHANNELS, h, w), |(c, y, x)| {
            self.pixels[[y, x, c]] as f32 / 255.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_construction_and_accessors() {
        let frame = Frame::new(vec![0u8; 2 * 4 * 3], 4, 2, 5).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]);
    }

    #[test]
    fn test_mismatched_data_length_is_shape_error() {
        let err = Frame::new(vec![0u8; 10], 2, 2, 0).unwrap_err();
        assert_eq!(err.actual, vec![10]);
    }

    #[test]
    fn test_pixel_access_is_row_major() {
        let mut data = vec![0u8; 12];
        data[6] = 255; // row=1, col=0, R
        let frame = Frame::new(data, 2, 2, 0).unwrap();
        assert_eq!(frame.as_ndarray()[[1, 0, 0]], 255);
        assert_eq!(frame.as_ndarray()[[1, 0, 1]], 0);
    }

    #[test]
    fn test_from_pixels_rejects_wrong_channel_count() {
        let pixels = Array3::<u8>::zeros((4, 4, 1));
        assert!(Frame::from_pixels(pixels, 0).is_err());
    }

    #[test]
    fn test_from_chw_transposes_and_saturates() {
        let mut chw = Array3::<f32>::zeros((3, 2, 2));
        chw[[0, 1, 0]] = 300.0;
        chw[[2, 0, 1]] = 12.4;
        let frame = Frame::from_chw(chw.view().into_dyn(), 1).unwrap();
        assert_eq!(frame.as_ndarray()[[1, 0, 0]], 255);
        assert_eq!(frame.as_ndarray()[[0, 1, 2]], 12);
    }

    #[test]
    fn test_from_chw_rejects_wrong_rank() {
        let flat = ndarray::Array2::<f32>::zeros((3, 4));
        let err = Frame::from_chw(flat.view().into_dyn(), 0).unwrap_err();
        assert_eq!(err.actual, vec![3, 4]);
    }

    #[test]
    fn test_to_unit_chw_scales_to_unit_range() {
        let frame = Frame::new(vec![255u8; 2 * 2 * 3], 2, 2, 0).unwrap();
        let chw = frame.to_unit_chw();
        assert_eq!(chw.shape(), &[3, 2, 2]);
        assert!((chw[[1, 1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_data_round_trips_buffer() {
        let data: Vec<u8> = (0..12).collect();
        let frame = Frame::new(data.clone(), 2, 2, 0).unwrap();
        assert_eq!(frame.data(), data);
    }
}
