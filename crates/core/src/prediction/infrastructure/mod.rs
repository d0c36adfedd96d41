pub mod onnx_emotion_network;
pub mod onnx_face_pose_detector;
pub mod onnx_feature_classifier;
pub mod onnx_identity_embedder;
pub mod onnx_landmark_predictor;
pub mod onnx_session;
pub mod predictor_factory;
