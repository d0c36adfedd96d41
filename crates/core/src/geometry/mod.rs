pub mod coords;
pub mod crop;
pub mod letterbox;
