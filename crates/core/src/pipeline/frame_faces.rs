//! Detections of one loaded batch, flattened across frames, together with
//! the face crops extracted for them.

use ndarray::{s, Array4};

use crate::geometry::crop::{crop_and_resize, CropSpec, CropWindow};
use crate::loading::domain::frame_loader::LoadedFrame;
use crate::prediction::domain::detection::Detection;

/// One crop batch at one [`CropSpec`], row-aligned with the detections.
#[derive(Clone, Debug)]
pub struct FaceCrops {
    pub spec: CropSpec,
    /// `(faces, 3, size, size)`, values in `[0, 1]`.
    pub tensor: Array4<f32>,
    /// Effective box of each crop in frame space.
    pub windows: Vec<CropWindow>,
}

#[derive(Clone, Debug)]
pub struct BatchFaces {
    detections: Vec<Detection>,
    slots: Vec<usize>,
    crops: Vec<FaceCrops>,
}

impl BatchFaces {
    /// `per_frame[i]` holds the detections of batch item `i`, at least one
    /// each (the sentinel for an empty frame).
    pub fn new(per_frame: Vec<Vec<Detection>>) -> Self {
        let mut detections = Vec::new();
        let mut slots = Vec::new();
        for (slot, frame_detections) in per_frame.into_iter().enumerate() {
            slots.extend(std::iter::repeat(slot).take(frame_detections.len()));
            detections.extend(frame_detections);
        }
        Self {
            detections,
            slots,
            crops: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Batch position of the frame each detection came from.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn sentinel_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_sentinel())
            .map(|(i, _)| i)
    }

    pub fn face_count(&self) -> usize {
        self.detections.iter().filter(|d| !d.is_sentinel()).count()
    }

    /// Crops every detection at `spec` unless a batch at that spec exists.
    pub fn extract(&mut self, frames: &[LoadedFrame], spec: CropSpec) {
        if self.crops(spec).is_some() {
            return;
        }
        let crops = extract_crops(frames, &self.detections, &self.slots, spec);
        self.crops.push(crops);
    }

    pub fn crops(&self, spec: CropSpec) -> Option<&FaceCrops> {
        self.crops.iter().find(|c| c.spec == spec)
    }

    pub fn crop_specs(&self) -> impl Iterator<Item = CropSpec> + '_ {
        self.crops.iter().map(|c| c.spec)
    }
}

/// Crops `detections[i]` out of `frames[slots[i]]`. Sentinels get an
/// all-zero crop and a NaN window.
pub fn extract_crops(
    frames: &[LoadedFrame],
    detections: &[Detection],
    slots: &[usize],
    spec: CropSpec,
) -> FaceCrops {
    let size = spec.size as usize;
    let mut tensor = Array4::zeros((detections.len(), 3, size, size));
    let mut windows = Vec::with_capacity(detections.len());
    for (i, (detection, &slot)) in detections.iter().zip(slots).enumerate() {
        let (crop, window) = crop_and_resize(&frames[slot].frame, &detection.bbox, spec);
        tensor.slice_mut(s![i, .., .., ..]).assign(&crop);
        windows.push(window);
    }
    FaceCrops {
        spec,
        tensor,
        windows,
    }
}
