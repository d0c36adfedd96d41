pub mod frame_loader;
