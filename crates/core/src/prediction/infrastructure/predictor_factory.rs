use crate::pipeline::config::{Device, ModelChoice, ModelSelection};
use crate::prediction::domain::capability::Capability;
use crate::prediction::domain::predictors::{FaceClassifier, PredictorSet};
use crate::shared::error::{AnalyzeError, ConfigError};

use super::onnx_emotion_network::OnnxEmotionNetwork;
use super::onnx_face_pose_detector::OnnxFacePoseDetector;
use super::onnx_feature_classifier::{FeatureModel, OnnxFeatureClassifier};
use super::onnx_identity_embedder::OnnxIdentityEmbedder;
use super::onnx_landmark_predictor::{LandmarkVariant, OnnxLandmarkPredictor};

const FACE_VARIANTS: &str = "img2pose";
const AU_VARIANTS: &str = "xgb, svm";
const EMOTION_VARIANTS: &str = "resmasknet, svm";
const IDENTITY_VARIANTS: &str = "facenet";

/// Parsed variant per capability; produced by [`resolve_variants`] without
/// touching any model file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedVariants {
    pub landmark: Option<LandmarkVariant>,
    pub action_unit: Option<FeatureModel>,
    pub emotion: Option<EmotionVariant>,
    pub identity: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmotionVariant {
    ResMaskNet,
    Svm,
}

fn unsupported(capability: Capability, choice: &ModelChoice, expected: &str) -> ConfigError {
    ConfigError::UnsupportedVariant {
        capability,
        variant: choice.variant.clone(),
        expected: expected.to_string(),
    }
}

/// Validates every variant name and the landmark dependency of the
/// feature-based models.
pub fn resolve_variants(models: &ModelSelection) -> Result<ResolvedVariants, ConfigError> {
    let face = models.face.as_ref().ok_or(ConfigError::InvalidValue {
        option: "face model",
        reason: "face detection is required".into(),
    })?;
    if !face.variant.eq_ignore_ascii_case("img2pose") {
        return Err(unsupported(Capability::FaceDetection, face, FACE_VARIANTS));
    }

    let landmark = models
        .landmark
        .as_ref()
        .map(|c| {
            LandmarkVariant::from_name(&c.variant)
                .ok_or_else(|| unsupported(Capability::Landmarks, c, LandmarkVariant::NAMES))
        })
        .transpose()?;

    let action_unit = models
        .action_unit
        .as_ref()
        .map(|c| match c.variant.to_ascii_lowercase().as_str() {
            "xgb" => Ok(FeatureModel::ActionUnitXgb),
            "svm" => Ok(FeatureModel::ActionUnitSvm),
            _ => Err(unsupported(Capability::ActionUnits, c, AU_VARIANTS)),
        })
        .transpose()?;

    let emotion = models
        .emotion
        .as_ref()
        .map(|c| match c.variant.to_ascii_lowercase().as_str() {
            "resmasknet" => Ok(EmotionVariant::ResMaskNet),
            "svm" => Ok(EmotionVariant::Svm),
            _ => Err(unsupported(Capability::Emotion, c, EMOTION_VARIANTS)),
        })
        .transpose()?;

    if let Some(c) = &models.identity {
        if !c.variant.eq_ignore_ascii_case("facenet") {
            return Err(unsupported(Capability::Identity, c, IDENTITY_VARIANTS));
        }
    }

    if landmark.is_none() {
        if let (Some(_), Some(c)) = (action_unit, &models.action_unit) {
            return Err(ConfigError::MissingLandmarks {
                capability: Capability::ActionUnits,
                variant: c.variant.clone(),
            });
        }
        if let (Some(EmotionVariant::Svm), Some(c)) = (emotion, &models.emotion) {
            return Err(ConfigError::MissingLandmarks {
                capability: Capability::Emotion,
                variant: c.variant.clone(),
            });
        }
    }

    Ok(ResolvedVariants {
        landmark,
        action_unit,
        emotion,
        identity: models.identity.is_some(),
    })
}

/// Validates the selection, then loads one ONNX session per enabled
/// capability.
pub fn create_predictors(models: &ModelSelection, device: Device) -> Result<PredictorSet, AnalyzeError> {
    let variants = resolve_variants(models)?;
    let load_err = |capability: Capability| {
        move |e: Box<dyn std::error::Error>| AnalyzeError::predict(capability, e)
    };

    let face = models.face.as_ref().ok_or(ConfigError::InvalidValue {
        option: "face model",
        reason: "face detection is required".into(),
    })?;
    let detector = OnnxFacePoseDetector::new(&face.path, device)
        .map_err(load_err(Capability::FaceDetection))?;
    let mut set = PredictorSet::new(Box::new(detector));

    if let (Some(variant), Some(choice)) = (variants.landmark, &models.landmark) {
        let predictor = OnnxLandmarkPredictor::new(&choice.path, variant, device)
            .map_err(load_err(Capability::Landmarks))?;
        set = set.with_landmarks(Box::new(predictor));
    }

    if let (Some(model), Some(choice)) = (variants.action_unit, &models.action_unit) {
        let classifier = OnnxFeatureClassifier::new(&choice.path, model, device)
            .map_err(load_err(Capability::ActionUnits))?;
        set = set.with_action_units(Box::new(classifier));
    }

    if let (Some(variant), Some(choice)) = (variants.emotion, &models.emotion) {
        let classifier: Box<dyn FaceClassifier> = match variant {
            EmotionVariant::ResMaskNet => Box::new(
                OnnxEmotionNetwork::new(&choice.path, device).map_err(load_err(Capability::Emotion))?,
            ),
            EmotionVariant::Svm => Box::new(
                OnnxFeatureClassifier::new(&choice.path, FeatureModel::EmotionSvm, device)
                    .map_err(load_err(Capability::Emotion))?,
            ),
        };
        set = set.with_emotion(classifier);
    }

    if let Some(choice) = &models.identity {
        let embedder = OnnxIdentityEmbedder::new(&choice.path, device)
            .map_err(load_err(Capability::Identity))?;
        set = set.with_identity(Box::new(embedder));
    }

    log::info!("Predictors ready: {:?}", set.model_info());
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn selection() -> ModelSelection {
        ModelSelection {
            face: Some(ModelChoice::new("img2pose", "face.onnx")),
            ..ModelSelection::default()
        }
    }

    #[test]
    fn test_face_only_resolves() {
        let v = resolve_variants(&selection()).unwrap();
        assert_eq!(v.landmark, None);
        assert_eq!(v.emotion, None);
        assert!(!v.identity);
    }

    #[test]
    fn test_full_selection_resolves() {
        let models = ModelSelection {
            landmark: Some(ModelChoice::new("mobilefacenet", "lm.onnx")),
            action_unit: Some(ModelChoice::new("XGB", "au.onnx")),
            emotion: Some(ModelChoice::new("resmasknet", "emo.onnx")),
            identity: Some(ModelChoice::new("facenet", "id.onnx")),
            ..selection()
        };
        let v = resolve_variants(&models).unwrap();
        assert_eq!(v.landmark, Some(LandmarkVariant::MobileFaceNet));
        assert_eq!(v.action_unit, Some(FeatureModel::ActionUnitXgb));
        assert_eq!(v.emotion, Some(EmotionVariant::ResMaskNet));
        assert!(v.identity);
    }

    #[test]
    fn test_missing_face_model() {
        let err = resolve_variants(&ModelSelection::default()).unwrap_err();
        assert!(err.to_string().contains("face model"));
    }

    #[rstest]
    #[case(ModelSelection { face: Some(ModelChoice::new("retinaface", "f.onnx")), ..ModelSelection::default() }, "face detection")]
    #[case(ModelSelection { landmark: Some(ModelChoice::new("dlib", "l.onnx")), ..selection() }, "landmark")]
    #[case(ModelSelection { action_unit: Some(ModelChoice::new("rf", "a.onnx")), ..selection() }, "action unit")]
    #[case(ModelSelection { emotion: Some(ModelChoice::new("fer", "e.onnx")), ..selection() }, "emotion")]
    #[case(ModelSelection { identity: Some(ModelChoice::new("arcface", "i.onnx")), ..selection() }, "identity")]
    fn test_unsupported_variants_name_capability(
        #[case] models: ModelSelection,
        #[case] capability: &str,
    ) {
        let err = resolve_variants(&models).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVariant { .. }));
        assert!(err.to_string().contains(capability), "{err}");
    }

    #[test]
    fn test_feature_models_need_landmarks() {
        let au = ModelSelection {
            action_unit: Some(ModelChoice::new("svm", "au.onnx")),
            ..selection()
        };
        assert!(matches!(
            resolve_variants(&au).unwrap_err(),
            ConfigError::MissingLandmarks {
                capability: Capability::ActionUnits,
                ..
            }
        ));

        let emo = ModelSelection {
            emotion: Some(ModelChoice::new("svm", "emo.onnx")),
            ..selection()
        };
        assert!(matches!(
            resolve_variants(&emo).unwrap_err(),
            ConfigError::MissingLandmarks {
                capability: Capability::Emotion,
                ..
            }
        ));
    }

    #[test]
    fn test_network_emotion_needs_no_landmarks() {
        let models = ModelSelection {
            emotion: Some(ModelChoice::new("resmasknet", "emo.onnx")),
            ..selection()
        };
        assert!(resolve_variants(&models).is_ok());
    }

    #[test]
    fn test_bad_variant_fails_before_loading() {
        // No model files exist; the variant error must win over file errors.
        let models = ModelSelection {
            emotion: Some(ModelChoice::new("nope", "/nonexistent/emo.onnx")),
            ..selection()
        };
        let err = create_predictors(&models, Device::Cpu).err().unwrap();
        assert!(matches!(err, AnalyzeError::Config(ConfigError::UnsupportedVariant { .. })));
    }

    #[test]
    fn test_missing_model_file_is_predict_error() {
        let models = ModelSelection {
            face: Some(ModelChoice::new("img2pose", "/nonexistent/face.onnx")),
            ..ModelSelection::default()
        };
        let err = create_predictors(&models, Device::Cpu).err().unwrap();
        assert!(err.to_string().starts_with("face detection model failed"), "{err}");
    }
}
