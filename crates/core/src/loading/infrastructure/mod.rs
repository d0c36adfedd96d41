pub mod image_loader;
pub mod prefetch_loader;
pub mod tensor_loader;
pub mod video_loader;
