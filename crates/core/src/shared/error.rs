use thiserror::Error;

use crate::prediction::domain::capability::Capability;

/// Boxed error that can cross the prefetch thread boundary.
pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal configuration problems, raised before any model runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unsupported {capability} model '{variant}' (expected one of: {expected})")]
    UnsupportedVariant {
        capability: Capability,
        variant: String,
        expected: String,
    },
    #[error(
        "{capability} model '{variant}' is computed from landmark features; \
         configure a landmark model or disable {capability}"
    )]
    MissingLandmarks {
        capability: Capability,
        variant: String,
    },
    #[error(
        "frames in one batch have different sizes ({expected_width}x{expected_height} vs \
         {width}x{height}); set output_size to letterbox inputs or use batch_size = 1"
    )]
    MixedFrameSizes {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
    #[error("invalid value for {option}: {reason}")]
    InvalidValue {
        option: &'static str,
        reason: String,
    },
    #[error("failed to read config {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Wrong-rank or wrong-channel input handed to a transform; a caller bug.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected {expected}, got shape {actual:?}")]
pub struct ShapeError {
    pub expected: String,
    pub actual: Vec<usize>,
}

impl ShapeError {
    pub fn new(expected: impl Into<String>, actual: Vec<usize>) -> Self {
        Self {
            expected: expected.into(),
            actual,
        }
    }
}

/// Top-level failure of an analysis run.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("failed to load frames: {0}")]
    Load(#[source] SendError),
    #[error("{capability} model failed: {source}")]
    Predict {
        capability: Capability,
        #[source]
        source: SendError,
    },
}

impl AnalyzeError {
    pub(crate) fn predict(capability: Capability, err: impl std::fmt::Display) -> Self {
        Self::Predict {
            capability,
            source: err.to_string().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_variant_names_option() {
        let err = ConfigError::UnsupportedVariant {
            capability: Capability::Landmarks,
            variant: "dlib".into(),
            expected: "mobilefacenet, mobilenet, pfld".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("landmark"));
        assert!(msg.contains("'dlib'"));
        assert!(msg.contains("mobilefacenet"));
    }

    #[test]
    fn test_missing_landmarks_is_actionable() {
        let err = ConfigError::MissingLandmarks {
            capability: Capability::ActionUnits,
            variant: "xgb".into(),
        };
        assert!(err.to_string().contains("configure a landmark model"));
    }

    #[test]
    fn test_shape_error_reports_actual_shape() {
        let err = ShapeError::new("(B, 3, H, W) tensor", vec![2, 4]);
        assert_eq!(
            err.to_string(),
            "expected (B, 3, H, W) tensor, got shape [2, 4]"
        );
    }

    #[test]
    fn test_predict_error_names_capability() {
        let err = AnalyzeError::predict(Capability::Emotion, "bad output");
        assert_eq!(err.to_string(), "emotion model failed: bad output");
    }
}
