use ndarray::{ArrayD, Axis};

use crate::loading::domain::frame_loader::{FrameLoader, LoadedFrame};
use crate::shared::error::{AnalyzeError, ConfigError, SendError, ShapeError};
use crate::shared::frame::Frame;

/// Serves frames out of an in-memory `(B, 3, H, W)` or `(3, H, W)` tensor
/// with values in `0..=255`. Frames keep their size.
pub struct TensorLoader {
    tensor: ArrayD<f32>,
    batch_size: usize,
    cursor: usize,
}

impl TensorLoader {
    pub fn new(tensor: ArrayD<f32>, batch_size: usize) -> Result<Self, AnalyzeError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                option: "batch_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        let tensor = match tensor.ndim() {
            3 => tensor.insert_axis(Axis(0)),
            4 => tensor,
            _ => return Err(ShapeError::new("(B, 3, H, W) or (3, H, W) tensor", tensor.shape().to_vec()).into()),
        };
        if tensor.shape()[1] != Frame::CHANNELS {
            return Err(ShapeError::new("3 channels on axis 1", tensor.shape().to_vec()).into());
        }
        Ok(Self {
            tensor,
            batch_size,
            cursor: 0,
        })
    }

    fn len(&self) -> usize {
        self.tensor.shape()[0]
    }
}

impl FrameLoader for TensorLoader {
    fn next_batch(&mut self) -> Option<Result<Vec<LoadedFrame>, SendError>> {
        if self.cursor >= self.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.len());
        let batch: Result<Vec<_>, SendError> = (self.cursor..end)
            .map(|i| {
                let frame = Frame::from_chw(self.tensor.index_axis(Axis(0), i), i)?;
                Ok(LoadedFrame::unscaled(frame, format!("tensor[{i}]")))
            })
            .collect();
        self.cursor = end;
        Some(batch)
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.len())
    }
}
