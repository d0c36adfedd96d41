//! Construction-time analyzer settings. Immutable once an analyzer is built.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_DETECTION_THRESHOLD, DEFAULT_IDENTITY_THRESHOLD};
use crate::shared::error::ConfigError;

/// Where model sessions execute. Chosen once, when sessions are built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    /// Platform execution provider (CoreML, DirectML), CPU fallback.
    Accelerator,
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "accelerator" | "gpu" => Ok(Device::Accelerator),
            other => Err(ConfigError::InvalidValue {
                option: "device",
                reason: format!("unknown device '{other}' (expected cpu or accelerator)"),
            }),
        }
    }
}

/// Variant name plus model file for one capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelChoice {
    pub variant: String,
    pub path: PathBuf,
}

impl ModelChoice {
    pub fn new(variant: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            variant: variant.into(),
            path: path.into(),
        }
    }
}

/// `None` disables a capability; face detection is required.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSelection {
    pub face: Option<ModelChoice>,
    pub landmark: Option<ModelChoice>,
    pub action_unit: Option<ModelChoice>,
    pub emotion: Option<ModelChoice>,
    pub identity: Option<ModelChoice>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub face_detection_threshold: f64,
    pub batch_size: usize,
    /// Letterbox every input to this square side before detection.
    pub output_size: Option<u32>,
    /// Video only: keep one frame out of this many.
    pub skip_frames: Option<usize>,
    pub identity_threshold: f64,
    pub device: Device,
    pub models: ModelSelection,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            face_detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            batch_size: 1,
            output_size: None,
            skip_frames: None,
            identity_threshold: DEFAULT_IDENTITY_THRESHOLD,
            device: Device::Cpu,
            models: ModelSelection::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("face_detection_threshold", self.face_detection_threshold)?;
        check_unit_interval("identity_threshold", self.identity_threshold)?;
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                option: "batch_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.output_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                option: "output_size",
                reason: "must be at least 1 pixel".into(),
            });
        }
        if self.skip_frames == Some(0) {
            return Err(ConfigError::InvalidValue {
                option: "skip_frames",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn check_unit_interval(option: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            option,
            reason: format!("must be between 0 and 1, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.face_detection_threshold, 0.5);
        assert_eq!(config.identity_threshold, 0.8);
        assert_eq!(config.batch_size, 1);
    }

    #[rstest]
    #[case(AnalyzerConfig { face_detection_threshold: 1.5, ..Default::default() }, "face_detection_threshold")]
    #[case(AnalyzerConfig { identity_threshold: -0.1, ..Default::default() }, "identity_threshold")]
    #[case(AnalyzerConfig { batch_size: 0, ..Default::default() }, "batch_size")]
    #[case(AnalyzerConfig { output_size: Some(0), ..Default::default() }, "output_size")]
    #[case(AnalyzerConfig { skip_frames: Some(0), ..Default::default() }, "skip_frames")]
    fn test_invalid_values_name_option(#[case] config: AnalyzerConfig, #[case] option: &str) {
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(option), "{err}");
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let config = AnalyzerConfig {
            face_detection_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"batch_size": 4, "device": "accelerator",
                "models": {{"face": {{"variant": "img2pose", "path": "face.onnx"}}}}}}"#
        )
        .unwrap();
        let config = AnalyzerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.device, Device::Accelerator);
        assert_eq!(config.face_detection_threshold, 0.5);
        assert_eq!(
            config.models.face,
            Some(ModelChoice::new("img2pose", "face.onnx"))
        );
        assert!(config.models.emotion.is_none());
    }

    #[test]
    fn test_from_json_file_reports_path() {
        let err = AnalyzerConfig::from_json_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
        assert!(err.to_string().contains("/nonexistent/config.json"));
    }

    #[test]
    fn test_from_json_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"batch_size": 0}}"#).unwrap();
        assert!(AnalyzerConfig::from_json_file(file.path()).is_err());
    }

    #[rstest]
    #[case("cpu", Device::Cpu)]
    #[case("CPU", Device::Cpu)]
    #[case("accelerator", Device::Accelerator)]
    fn test_device_from_str(#[case] s: &str, #[case] expected: Device) {
        assert_eq!(s.parse::<Device>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_device_rejected() {
        assert!("tpu".parse::<Device>().is_err());
    }
}
