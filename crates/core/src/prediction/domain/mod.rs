pub mod capability;
pub mod detection;
pub mod face_pose_detector;
pub mod predictors;
