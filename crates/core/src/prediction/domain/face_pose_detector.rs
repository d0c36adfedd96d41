use crate::prediction::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for joint face and head-pose detection.
///
/// Returns every candidate above the model's own floor; confidence
/// thresholding and the sentinel are applied by the caller.
pub trait FacePoseDetector: Send {
    fn name(&self) -> &str;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
