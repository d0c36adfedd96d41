//! Multi-stage facial signal inference: face and pose detection, landmark
//! regression, action unit, emotion and identity prediction, assembled into
//! one row per detected face per frame in original-image coordinates.

pub mod features;
pub mod geometry;
pub mod identity;
pub mod loading;
pub mod pipeline;
pub mod prediction;
pub mod shared;
