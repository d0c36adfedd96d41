//! Histogram of oriented gradients over a single-channel image.

use ndarray::{Array3, ArrayView2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HogParams {
    pub orientations: usize,
    pub cell_size: usize,
    pub block_size: usize,
}

impl Default for HogParams {
    fn default() -> Self {
        Self {
            orientations: 8,
            cell_size: 8,
            block_size: 2,
        }
    }
}

impl HogParams {
    /// Descriptor length for an image of the given size.
    pub fn descriptor_len(&self, width: usize, height: usize) -> usize {
        let blocks_x = (width / self.cell_size).saturating_sub(self.block_size - 1);
        let blocks_y = (height / self.cell_size).saturating_sub(self.block_size - 1);
        blocks_x * blocks_y * self.block_size * self.block_size * self.orientations
    }
}

const L2HYS_CLIP: f32 = 0.2;
const EPS: f32 = 1e-5;

/// Unsigned-orientation HOG with L2-Hys block normalization. Blocks are
/// emitted row-major, each block as `(cell_row, cell_col, orientation)`.
pub fn hog(image: ArrayView2<'_, f32>, params: &HogParams) -> Vec<f32> {
    let (h, w) = (image.shape()[0], image.shape()[1]);
    let cells = cell_histograms(image, params);
    let (cells_y, cells_x) = (h / params.cell_size, w / params.cell_size);
    let b = params.block_size;
    if cells_y < b || cells_x < b {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(params.descriptor_len(w, h));
    let mut block = Vec::with_capacity(b * b * params.orientations);
    for by in 0..=(cells_y - b) {
        for bx in 0..=(cells_x - b) {
            block.clear();
            for cy in by..by + b {
                for cx in bx..bx + b {
                    block.extend((0..params.orientations).map(|o| cells[[cy, cx, o]]));
                }
            }
            l2_hys(&mut block);
            out.extend_from_slice(&block);
        }
    }
    out
}

/// `(cells_y, cells_x, orientations)` of magnitude-weighted votes averaged
/// over the cell area.
fn cell_histograms(image: ArrayView2<'_, f32>, params: &HogParams) -> Array3<f32> {
    let (h, w) = (image.shape()[0], image.shape()[1]);
    let c = params.cell_size;
    let (cells_y, cells_x) = (h / c, w / c);
    let bin_width = 180.0 / params.orientations as f32;
    let mut hist = Array3::<f32>::zeros((cells_y, cells_x, params.orientations));

    for y in 0..cells_y * c {
        for x in 0..cells_x * c {
            let gy = if y == 0 || y + 1 == h {
                0.0
            } else {
                image[[y + 1, x]] - image[[y - 1, x]]
            };
            let gx = if x == 0 || x + 1 == w {
                0.0
            } else {
                image[[y, x + 1]] - image[[y, x - 1]]
            };
            let magnitude = gx.hypot(gy);
            let angle = gy.atan2(gx).to_degrees().rem_euclid(180.0);
            let bin = ((angle / bin_width) as usize).min(params.orientations - 1);
            hist[[y / c, x / c, bin]] += magnitude;
        }
    }
    let area = (c * c) as f32;
    hist.mapv_inplace(|v| v / area);
    hist
}

fn l2_hys(block: &mut [f32]) {
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + EPS * EPS).sqrt();
    for v in block.iter_mut() {
        *v = (*v / norm).min(L2HYS_CLIP);
    }
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + EPS * EPS).sqrt();
    for v in block.iter_mut() {
        *v /= norm;
    }
}
