pub mod cosine_identity_grouper;
mod math;
