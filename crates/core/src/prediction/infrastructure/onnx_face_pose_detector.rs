/// img2pose face + head-pose detector using ONNX Runtime via `ort`.
///
/// Runs on the full frame (RGB / 255, NCHW), reads boxes, scores and 6-DoF
/// poses, and suppresses overlapping candidates. Thresholding is left to
/// the caller.
use std::path::Path;

use ndarray::{ArrayD, Axis};

use crate::geometry::coords::BBox;
use crate::pipeline::config::Device;
use crate::prediction::domain::detection::{Detection, POSE_DOF};
use crate::prediction::domain::face_pose_detector::FacePoseDetector;
use crate::shared::frame::Frame;

use super::onnx_session;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.6;

pub struct OnnxFacePoseDetector {
    session: ort::session::Session,
}

impl OnnxFacePoseDetector {
    pub fn new(model_path: &Path, device: Device) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: onnx_session::build_session(model_path, device)?,
        })
    }
}

impl FacePoseDetector for OnnxFacePoseDetector {
    fn name(&self) -> &str {
        "img2pose"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let input = frame.to_unit_chw().insert_axis(Axis(0));
        let outputs = onnx_session::run_f32(&mut self.session, input)?;
        let mut candidates = parse_outputs(&outputs)?;
        Ok(nms(&mut candidates, NMS_IOU_THRESH))
    }
}

/// Picks boxes `(N, 4)`, scores `(N)` and poses `(N, 6)` out of the model
/// outputs by shape, tolerating a leading batch axis of 1.
fn parse_outputs(outputs: &[ArrayD<f32>]) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
    let squeeze = |a: &ArrayD<f32>| -> ArrayD<f32> {
        if a.ndim() == 3 && a.shape()[0] == 1 {
            a.index_axis(Axis(0), 0).to_owned()
        } else {
            a.clone()
        }
    };
    let arrays: Vec<ArrayD<f32>> = outputs.iter().map(squeeze).collect();
    let boxes = arrays
        .iter()
        .find(|a| a.ndim() == 2 && a.shape()[1] == 4)
        .ok_or("img2pose output has no (N, 4) box tensor")?;
    let poses = arrays
        .iter()
        .find(|a| a.ndim() == 2 && a.shape()[1] == POSE_DOF)
        .ok_or("img2pose output has no (N, 6) pose tensor")?;
    let scores = arrays
        .iter()
        .find(|a| a.ndim() == 1)
        .ok_or("img2pose output has no score vector")?;

    let n = boxes.shape()[0];
    if scores.len() != n || poses.shape()[0] != n {
        return Err(format!(
            "img2pose output lengths disagree: {n} boxes, {} scores, {} poses",
            scores.len(),
            poses.shape()[0]
        )
        .into());
    }

    Ok((0..n)
        .map(|i| {
            let b = |k: usize| boxes[[i, k]] as f64;
            let pose: [f64; POSE_DOF] = std::array::from_fn(|k| poses[[i, k]] as f64);
            Detection::new(BBox::from_corners(b(0), b(1), b(2), b(3)), pose, scores[[i]] as f64)
        })
        .collect())
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [Detection], iou_thresh: f64) -> Vec<Detection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];
    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i]);
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &Detection, b: &Detection) -> f64 {
    let (a, b) = (&a.bbox, &b.bbox);
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.x2().min(b.x2());
    let y2 = a.y2().min(b.y2());

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.width * a.height + b.width * b.height - inter)
}
