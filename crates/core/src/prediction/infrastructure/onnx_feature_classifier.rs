/// Classifiers over the hand-crafted face descriptor (aligned-face HOG plus
/// aligned landmarks), exported to ONNX. Used for the `xgb` / `svm` action
/// unit models and the `svm` emotion model.
use std::path::Path;

use ndarray::{Array2, Axis};

use crate::features::{face_descriptors, DESCRIPTOR_LEN};
use crate::pipeline::config::Device;
use crate::prediction::domain::predictors::{FaceBatch, FaceClassifier};
use crate::shared::constants::{AU_COLUMNS, EMOTION_COLUMNS};

use super::onnx_session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureModel {
    ActionUnitXgb,
    ActionUnitSvm,
    EmotionSvm,
}

impl FeatureModel {
    pub fn name(self) -> &'static str {
        match self {
            Self::ActionUnitXgb => "xgb",
            Self::ActionUnitSvm | Self::EmotionSvm => "svm",
        }
    }

    pub fn output_width(self) -> usize {
        match self {
            Self::ActionUnitXgb | Self::ActionUnitSvm => AU_COLUMNS.len(),
            Self::EmotionSvm => EMOTION_COLUMNS.len(),
        }
    }
}

pub struct OnnxFeatureClassifier {
    session: ort::session::Session,
    model: FeatureModel,
}

impl OnnxFeatureClassifier {
    pub fn new(
        model_path: &Path,
        model: FeatureModel,
        device: Device,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: onnx_session::build_session(model_path, device)?,
            model,
        })
    }
}

impl FaceClassifier for OnnxFeatureClassifier {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn requires_landmarks(&self) -> bool {
        true
    }

    fn output_width(&self) -> usize {
        self.model.output_width()
    }

    fn predict(&mut self, batch: &FaceBatch<'_>) -> Result<Array2<f32>, Box<dyn std::error::Error>> {
        let landmarks = batch
            .landmarks
            .ok_or("feature classifier called without landmarks")?;
        let descriptors = face_descriptors(batch.crops, landmarks);
        let width = self.output_width();

        let valid: Vec<usize> = (0..descriptors.nrows())
            .filter(|&i| descriptors.row(i).iter().all(|v| v.is_finite()))
            .collect();
        let mut out = Array2::from_elem((descriptors.nrows(), width), f32::NAN);
        if valid.is_empty() {
            return Ok(out);
        }

        let input = descriptors.select(Axis(0), &valid);
        debug_assert_eq!(input.ncols(), DESCRIPTOR_LEN);
        let outputs = onnx_session::run_f32(&mut self.session, input)?;
        let scores = onnx_session::select_matrix(&outputs, valid.len(), width)?;
        for (row, &i) in scores.rows().into_iter().zip(&valid) {
            out.row_mut(i).assign(&row);
        }
        Ok(out)
    }
}
