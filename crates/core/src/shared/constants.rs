//! Output vocabularies and default crop geometry.

pub const NUM_LANDMARKS: usize = 68;

pub const FACEBOX_COLUMNS: [&str; 5] = [
    "FaceRectX",
    "FaceRectY",
    "FaceRectWidth",
    "FaceRectHeight",
    "FaceScore",
];

pub const FACEPOSE_COLUMNS: [&str; 6] = ["Pitch", "Roll", "Yaw", "X", "Y", "Z"];

pub const AU_COLUMNS: [&str; 20] = [
    "AU01", "AU02", "AU04", "AU05", "AU06", "AU07", "AU09", "AU10", "AU11", "AU12", "AU14",
    "AU15", "AU17", "AU20", "AU23", "AU24", "AU25", "AU26", "AU28", "AU43",
];

pub const EMOTION_COLUMNS: [&str; 7] = [
    "anger",
    "disgust",
    "fear",
    "happiness",
    "sadness",
    "surprise",
    "neutral",
];

pub const IDENTITY_WIDTH: usize = 512;

/// Generic crop side length when no landmark model sets one.
pub const DEFAULT_FACE_SIZE: u32 = 112;

pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.5;
pub const DEFAULT_IDENTITY_THRESHOLD: f64 = 0.8;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
