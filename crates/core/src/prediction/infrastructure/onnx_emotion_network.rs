use std::path::Path;

use ndarray::{Array2, Axis};

use crate::geometry::crop::CropSpec;
use crate::pipeline::config::Device;
use crate::prediction::domain::predictors::{FaceBatch, FaceClassifier};
use crate::shared::constants::EMOTION_COLUMNS;

use super::onnx_session;

/// ResMaskNet needs a looser, larger crop than the landmark models.
pub const RESMASKNET_CROP: CropSpec = CropSpec::new(224, 1.1);

/// Network emotion classifier: raw crops in, softmaxed class scores out.
pub struct OnnxEmotionNetwork {
    session: ort::session::Session,
}

impl OnnxEmotionNetwork {
    pub fn new(model_path: &Path, device: Device) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: onnx_session::build_session(model_path, device)?,
        })
    }
}

impl FaceClassifier for OnnxEmotionNetwork {
    fn name(&self) -> &str {
        "resmasknet"
    }

    fn crop_spec(&self) -> Option<CropSpec> {
        Some(RESMASKNET_CROP)
    }

    fn output_width(&self) -> usize {
        EMOTION_COLUMNS.len()
    }

    fn predict(&mut self, batch: &FaceBatch<'_>) -> Result<Array2<f32>, Box<dyn std::error::Error>> {
        let outputs = onnx_session::run_f32(&mut self.session, batch.crops.to_owned())?;
        let logits = onnx_session::select_matrix(&outputs, batch.len(), self.output_width())?;
        Ok(softmax_rows(logits))
    }
}

pub fn softmax_rows(mut logits: Array2<f32>) -> Array2<f32> {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, v| m.max(*v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    logits
}
