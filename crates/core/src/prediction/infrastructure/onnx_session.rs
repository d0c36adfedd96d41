//! ONNX Runtime session construction and tensor plumbing shared by the
//! model adapters.

use std::path::Path;

use ndarray::{Array4, ArrayD, ArrayView4};
use ort::session::Session;

use crate::pipeline::config::Device;

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

pub fn build_session(model_path: &Path, device: Device) -> Result<Session, Box<dyn std::error::Error>> {
    if !model_path.exists() {
        return Err(format!("model file not found: {}", model_path.display()).into());
    }
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut builder = Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?;
    if device == Device::Accelerator {
        let providers = preferred_execution_providers();
        if providers.is_empty() {
            log::warn!("No accelerator execution provider on this platform, using CPU");
        }
        builder = builder.with_execution_providers(providers)?;
    }
    let session = builder.commit_from_file(model_path)?;
    log::info!("Loaded {} ({device:?})", model_path.display());
    Ok(session)
}

/// Runs a single-input model and copies every f32 output out of the session.
pub fn run_f32<D: ndarray::Dimension + 'static>(
    session: &mut Session,
    input: ndarray::Array<f32, D>,
) -> Result<Vec<ArrayD<f32>>, Box<dyn std::error::Error>> {
    let input_value = ort::value::Tensor::from_array(input)?;
    let outputs = session.run(ort::inputs![input_value])?;
    let mut arrays = Vec::with_capacity(outputs.len());
    for i in 0..outputs.len() {
        if let Ok(array) = outputs[i].try_extract_array::<f32>() {
            arrays.push(array.to_owned());
        }
    }
    if arrays.is_empty() {
        return Err("model produced no f32 outputs".into());
    }
    Ok(arrays)
}

/// First output holding exactly `n x width` values, as a matrix.
pub fn select_matrix(
    outputs: &[ArrayD<f32>],
    n: usize,
    width: usize,
) -> Result<ndarray::Array2<f32>, Box<dyn std::error::Error>> {
    let found = outputs
        .iter()
        .find(|a| a.len() == n * width && a.shape().last() == Some(&width))
        .ok_or_else(|| format!("model output has no {n}x{width} tensor"))?;
    let values: Vec<f32> = found.iter().copied().collect();
    Ok(ndarray::Array2::from_shape_vec((n, width), values)?)
}

/// Per-channel `(x - mean) / std` over a `(N, 3, H, W)` batch.
pub fn normalize_channels(crops: ArrayView4<'_, f32>, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let mut out = crops.to_owned();
    for (c, mut channel) in out.axis_iter_mut(ndarray::Axis(1)).enumerate() {
        channel.mapv_inplace(|v| (v - mean[c]) / std[c]);
    }
    out
}
