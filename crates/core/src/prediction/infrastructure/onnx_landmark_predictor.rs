use std::path::Path;

use ndarray::{ArrayD, ArrayView4};

use crate::geometry::coords::{CropSpace, LandmarkSet};
use crate::geometry::crop::CropSpec;
use crate::pipeline::config::Device;
use crate::prediction::domain::predictors::LandmarkPredictor;
use crate::shared::constants::NUM_LANDMARKS;

use super::onnx_session;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandmarkVariant {
    MobileFaceNet,
    MobileNet,
    Pfld,
}

impl LandmarkVariant {
    pub const NAMES: &'static str = "mobilefacenet, mobilenet, pfld";

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mobilefacenet" => Some(Self::MobileFaceNet),
            "mobilenet" => Some(Self::MobileNet),
            "pfld" => Some(Self::Pfld),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MobileFaceNet => "mobilefacenet",
            Self::MobileNet => "mobilenet",
            Self::Pfld => "pfld",
        }
    }

    pub fn crop_spec(self) -> CropSpec {
        match self {
            Self::MobileNet => CropSpec::new(224, 1.0),
            Self::MobileFaceNet | Self::Pfld => CropSpec::new(112, 1.0),
        }
    }
}

/// 68-point landmark regressor. Models emit `(N, 136)` interleaved x, y
/// normalized to the crop; they are scaled to crop pixels here.
pub struct OnnxLandmarkPredictor {
    session: ort::session::Session,
    variant: LandmarkVariant,
}

impl OnnxLandmarkPredictor {
    pub fn new(
        model_path: &Path,
        variant: LandmarkVariant,
        device: Device,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: onnx_session::build_session(model_path, device)?,
            variant,
        })
    }
}

impl LandmarkPredictor for OnnxLandmarkPredictor {
    fn name(&self) -> &str {
        self.variant.name()
    }

    fn crop_spec(&self) -> CropSpec {
        self.variant.crop_spec()
    }

    fn predict(
        &mut self,
        crops: ArrayView4<'_, f32>,
    ) -> Result<Vec<LandmarkSet<CropSpace>>, Box<dyn std::error::Error>> {
        let input = match self.variant {
            LandmarkVariant::MobileNet => {
                onnx_session::normalize_channels(crops, IMAGENET_MEAN, IMAGENET_STD)
            }
            _ => crops.to_owned(),
        };
        let outputs = onnx_session::run_f32(&mut self.session, input)?;
        decode_landmarks(&outputs, crops.shape()[0], crops.shape()[2] as f64)
    }
}

/// First output holding `n x 136` values, rescaled from `[0, 1]` to
/// `crop_size` pixels.
fn decode_landmarks(
    outputs: &[ArrayD<f32>],
    n: usize,
    crop_size: f64,
) -> Result<Vec<LandmarkSet<CropSpace>>, Box<dyn std::error::Error>> {
    let width = 2 * NUM_LANDMARKS;
    let raw = outputs
        .iter()
        .find(|a| a.len() == n * width)
        .ok_or_else(|| format!("landmark model output has no {n}x{width} tensor"))?;
    let values: Vec<f64> = raw.iter().map(|v| *v as f64 * crop_size).collect();
    values
        .chunks_exact(width)
        .map(|row| LandmarkSet::from_interleaved(row).map_err(Into::into))
        .collect()
}
