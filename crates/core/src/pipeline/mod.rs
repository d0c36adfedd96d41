pub mod analyze_faces_use_case;
pub mod config;
pub mod frame_faces;
pub mod letterbox_corrector;
pub mod pipeline_logger;
pub mod result_table;
