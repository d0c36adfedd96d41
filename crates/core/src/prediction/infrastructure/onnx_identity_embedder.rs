use std::path::Path;

use ndarray::Array2;

use crate::pipeline::config::Device;
use crate::prediction::domain::predictors::{FaceBatch, FaceClassifier};
use crate::shared::constants::IDENTITY_WIDTH;

use super::onnx_session;

const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 128.0;

/// FaceNet identity embeddings over the generic crop.
pub struct OnnxIdentityEmbedder {
    session: ort::session::Session,
}

impl OnnxIdentityEmbedder {
    pub fn new(model_path: &Path, device: Device) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: onnx_session::build_session(model_path, device)?,
        })
    }
}

impl FaceClassifier for OnnxIdentityEmbedder {
    fn name(&self) -> &str {
        "facenet"
    }

    fn output_width(&self) -> usize {
        IDENTITY_WIDTH
    }

    fn predict(&mut self, batch: &FaceBatch<'_>) -> Result<Array2<f32>, Box<dyn std::error::Error>> {
        let input = batch.crops.mapv(|v| (v * 255.0 - NORM_MEAN) / NORM_STD);
        let outputs = onnx_session::run_f32(&mut self.session, input)?;
        onnx_session::select_matrix(&outputs, batch.len(), IDENTITY_WIDTH)
    }
}
