use crate::geometry::letterbox::Letterbox;
use crate::shared::error::{ConfigError, SendError};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// One decoded item of a batch.
///
/// `frame.index()` is the frame identifier results are keyed by: the
/// position in the input list for images and tensors, the native frame
/// number for video.
#[derive(Clone, Debug)]
pub struct LoadedFrame {
    pub frame: Frame,
    pub source: String,
    pub letterbox: Letterbox,
}

impl LoadedFrame {
    pub fn new(frame: Frame, source: impl Into<String>, letterbox: Letterbox) -> Self {
        Self {
            frame,
            source: source.into(),
            letterbox,
        }
    }

    /// A frame used at its native size.
    pub fn unscaled(frame: Frame, source: impl Into<String>) -> Self {
        let letterbox = Letterbox::identity(frame.width(), frame.height());
        Self::new(frame, source, letterbox)
    }
}

/// Yields batches of frames. Errors are `Send` so a loader can run on a
/// prefetch thread.
pub trait FrameLoader: Send {
    /// `None` once the input is exhausted.
    fn next_batch(&mut self) -> Option<Result<Vec<LoadedFrame>, SendError>>;

    /// Present for video input; drives `approx_time`.
    fn video_metadata(&self) -> Option<VideoMetadata> {
        None
    }

    /// Total number of frames this loader will yield, when known.
    fn frame_count(&self) -> Option<usize> {
        None
    }
}

/// All frames of a batch must share one size.
pub fn check_uniform_size(batch: &[LoadedFrame]) -> Result<(), ConfigError> {
    let Some(first) = batch.first() else {
        return Ok(());
    };
    let (expected_width, expected_height) = (first.frame.width(), first.frame.height());
    for item in &batch[1..] {
        let (width, height) = (item.frame.width(), item.frame.height());
        if (width, height) != (expected_width, expected_height) {
            return Err(ConfigError::MixedFrameSizes {
                expected_width,
                expected_height,
                width,
                height,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(w: u32, h: u32) -> LoadedFrame {
        LoadedFrame::unscaled(Frame::new(vec![0; (w * h * 3) as usize], w, h, 0).unwrap(), "x")
    }

    #[test]
    fn test_uniform_batch_passes() {
        assert!(check_uniform_size(&[loaded(4, 4), loaded(4, 4)]).is_ok());
        assert!(check_uniform_size(&[]).is_ok());
    }

    #[test]
    fn test_mixed_batch_fails() {
        let err = check_uniform_size(&[loaded(4, 4), loaded(6, 4)]).unwrap_err();
        assert!(matches!(err, ConfigError::MixedFrameSizes { width: 6, .. }));
    }

    #[test]
    fn test_unscaled_records_identity_letterbox() {
        let item = loaded(8, 5);
        assert!(item.letterbox.is_identity());
        assert_eq!(item.letterbox.original_width, 8);
        assert_eq!(item.letterbox.original_height, 5);
    }
}
