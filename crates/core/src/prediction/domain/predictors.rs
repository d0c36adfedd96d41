//! Per-capability predictor contracts consumed by the analyzer.
//!
//! Crops arrive channel-first, `(N, 3, S, S)`, with values in `[0, 1]`;
//! each adapter applies its own normalization on top.

use ndarray::{Array2, ArrayView4};
use serde::{Deserialize, Serialize};

use crate::geometry::coords::{CropSpace, LandmarkSet};
use crate::geometry::crop::CropSpec;
use crate::prediction::domain::capability::Capability;
use crate::prediction::domain::face_pose_detector::FacePoseDetector;
use crate::shared::error::ConfigError;

/// 68-point landmark regression. Its crop spec is the generic one every
/// other predictor shares unless it asks for its own.
pub trait LandmarkPredictor: Send {
    fn name(&self) -> &str;

    fn crop_spec(&self) -> CropSpec;

    /// One landmark set per crop, in pixel coordinates of the crop.
    fn predict(
        &mut self,
        crops: ArrayView4<'_, f32>,
    ) -> Result<Vec<LandmarkSet<CropSpace>>, Box<dyn std::error::Error>>;
}

/// Crops (plus their landmarks when the classifier needs them) for one
/// classifier call.
pub struct FaceBatch<'a> {
    pub crops: ArrayView4<'a, f32>,
    /// In the pixel space of `crops`; NaN sets mark sentinel rows.
    pub landmarks: Option<&'a [LandmarkSet<CropSpace>]>,
}

impl FaceBatch<'_> {
    pub fn len(&self) -> usize {
        self.crops.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn crop_size(&self) -> usize {
        self.crops.shape()[2]
    }
}

/// Fixed-width per-face output: action units, emotions or identity
/// embeddings.
pub trait FaceClassifier: Send {
    fn name(&self) -> &str;

    /// `None` means the generic crop.
    fn crop_spec(&self) -> Option<CropSpec> {
        None
    }

    /// Feature-based variants read the landmark predictor's output.
    fn requires_landmarks(&self) -> bool {
        false
    }

    fn output_width(&self) -> usize;

    /// Returns `(batch.len(), output_width())`.
    fn predict(&mut self, batch: &FaceBatch<'_>) -> Result<Array2<f32>, Box<dyn std::error::Error>>;
}

/// The configured predictors, one slot per capability. An empty slot is a
/// disabled capability.
pub struct PredictorSet {
    pub face: Box<dyn FacePoseDetector>,
    pub landmarks: Option<Box<dyn LandmarkPredictor>>,
    pub action_units: Option<Box<dyn FaceClassifier>>,
    pub emotion: Option<Box<dyn FaceClassifier>>,
    pub identity: Option<Box<dyn FaceClassifier>>,
}

impl PredictorSet {
    pub fn new(face: Box<dyn FacePoseDetector>) -> Self {
        Self {
            face,
            landmarks: None,
            action_units: None,
            emotion: None,
            identity: None,
        }
    }

    pub fn with_landmarks(mut self, predictor: Box<dyn LandmarkPredictor>) -> Self {
        self.landmarks = Some(predictor);
        self
    }

    pub fn with_action_units(mut self, classifier: Box<dyn FaceClassifier>) -> Self {
        self.action_units = Some(classifier);
        self
    }

    pub fn with_emotion(mut self, classifier: Box<dyn FaceClassifier>) -> Self {
        self.emotion = Some(classifier);
        self
    }

    pub fn with_identity(mut self, classifier: Box<dyn FaceClassifier>) -> Self {
        self.identity = Some(classifier);
        self
    }

    /// Classifier slots with their capability, in output column order.
    pub fn classifiers_mut(
        &mut self,
    ) -> impl Iterator<Item = (Capability, &mut Option<Box<dyn FaceClassifier>>)> {
        [
            (Capability::ActionUnits, &mut self.action_units),
            (Capability::Emotion, &mut self.emotion),
            (Capability::Identity, &mut self.identity),
        ]
        .into_iter()
    }

    fn classifiers(&self) -> [(Capability, Option<&dyn FaceClassifier>); 3] {
        [
            (Capability::ActionUnits, self.action_units.as_deref()),
            (Capability::Emotion, self.emotion.as_deref()),
            (Capability::Identity, self.identity.as_deref()),
        ]
    }

    /// Checks the combination before any model runs: landmark-dependent
    /// classifiers need a landmark predictor, output widths must match the
    /// column schema, and crop specs must be usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(landmarks) = &self.landmarks {
            landmarks.crop_spec().validate()?;
        }
        for (capability, classifier) in self.classifiers() {
            let Some(classifier) = classifier else {
                continue;
            };
            if classifier.requires_landmarks() && self.landmarks.is_none() {
                return Err(ConfigError::MissingLandmarks {
                    capability,
                    variant: classifier.name().to_string(),
                });
            }
            if classifier.output_width() != capability.output_width() {
                return Err(ConfigError::InvalidValue {
                    option: "model output width",
                    reason: format!(
                        "{capability} model '{}' produces {} values, expected {}",
                        classifier.name(),
                        classifier.output_width(),
                        capability.output_width()
                    ),
                });
            }
            if let Some(spec) = classifier.crop_spec() {
                spec.validate()?;
            }
        }
        Ok(())
    }

    pub fn model_info(&self) -> ModelInfo {
        let name = |c: Option<&dyn FaceClassifier>| c.map(|c| c.name().to_string());
        ModelInfo {
            face_model: self.face.name().to_string(),
            facepose_model: self.face.name().to_string(),
            landmark_model: self.landmarks.as_ref().map(|l| l.name().to_string()),
            au_model: name(self.action_units.as_deref()),
            emotion_model: name(self.emotion.as_deref()),
            identity_model: name(self.identity.as_deref()),
        }
    }
}

/// Which variant produced each capability's columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub face_model: String,
    pub facepose_model: String,
    pub landmark_model: Option<String>,
    pub au_model: Option<String>,
    pub emotion_model: Option<String>,
    pub identity_model: Option<String>,
}
