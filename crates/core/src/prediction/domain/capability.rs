use std::fmt;

use serde::{Deserialize, Serialize};

/// One independently configurable inference task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FaceDetection,
    Landmarks,
    ActionUnits,
    Emotion,
    Identity,
}

impl Capability {
    /// Width of this capability's block in a result row. Detection covers
    /// the box, score and pose columns.
    pub fn output_width(self) -> usize {
        use crate::shared::constants::*;
        match self {
            Capability::FaceDetection => FACEBOX_COLUMNS.len() + FACEPOSE_COLUMNS.len(),
            Capability::Landmarks => 2 * NUM_LANDMARKS,
            Capability::ActionUnits => AU_COLUMNS.len(),
            Capability::Emotion => EMOTION_COLUMNS.len(),
            Capability::Identity => IDENTITY_WIDTH,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::FaceDetection => "face detection",
            Capability::Landmarks => "landmark",
            Capability::ActionUnits => "action unit",
            Capability::Emotion => "emotion",
            Capability::Identity => "identity",
        };
        f.write_str(name)
    }
}
