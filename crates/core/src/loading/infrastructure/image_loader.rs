use std::path::{Path, PathBuf};

use crate::geometry::letterbox::letterbox_frame;
use crate::loading::domain::frame_loader::{FrameLoader, LoadedFrame};
use crate::shared::error::{AnalyzeError, ConfigError, SendError};
use crate::shared::frame::Frame;

/// Loads image files in input order through the `image` crate.
///
/// With an `output_size` every image is letterboxed to a square of that
/// side; otherwise images keep their size and batches must be uniform,
/// which is checked up front from the file headers.
pub struct ImageLoader {
    paths: Vec<PathBuf>,
    batch_size: usize,
    output_size: Option<u32>,
    cursor: usize,
}

impl ImageLoader {
    pub fn new(
        paths: Vec<PathBuf>,
        batch_size: usize,
        output_size: Option<u32>,
    ) -> Result<Self, AnalyzeError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                option: "batch_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if output_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                option: "output_size",
                reason: "must be at least 1 pixel".into(),
            }
            .into());
        }
        if batch_size > 1 && output_size.is_none() {
            probe_uniform_batches(&paths, batch_size)?;
        }
        Ok(Self {
            paths,
            batch_size,
            output_size,
            cursor: 0,
        })
    }

    fn load(&self, index: usize) -> Result<LoadedFrame, SendError> {
        let path = &self.paths[index];
        let rgb = image::open(path)
            .map_err(|e| -> SendError { format!("{}: {e}", path.display()).into() })?
            .to_rgb8();
        let (w, h) = rgb.dimensions();
        let frame = Frame::new(rgb.into_raw(), w, h, index)?;
        let source = path.display().to_string();
        match self.output_size {
            Some(size) => {
                let (boxed, letterbox) = letterbox_frame(&frame, size)?;
                Ok(LoadedFrame::new(boxed, source, letterbox))
            }
            None => Ok(LoadedFrame::unscaled(frame, source)),
        }
    }
}

fn probe_uniform_batches(paths: &[PathBuf], batch_size: usize) -> Result<(), AnalyzeError> {
    for chunk in paths.chunks(batch_size) {
        let mut dims = chunk.iter().map(|p| probe(p));
        let Some(first) = dims.next() else {
            continue;
        };
        let (expected_width, expected_height) = first?;
        for d in dims {
            let (width, height) = d?;
            if (width, height) != (expected_width, expected_height) {
                return Err(ConfigError::MixedFrameSizes {
                    expected_width,
                    expected_height,
                    width,
                    height,
                }
                .into());
            }
        }
    }
    Ok(())
}

fn probe(path: &Path) -> Result<(u32, u32), AnalyzeError> {
    image::image_dimensions(path)
        .map_err(|e| AnalyzeError::Load(format!("{}: {e}", path.display()).into()))
}

impl FrameLoader for ImageLoader {
    fn next_batch(&mut self) -> Option<Result<Vec<LoadedFrame>, SendError>> {
        if self.cursor >= self.paths.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.paths.len());
        let batch: Result<Vec<_>, _> = (self.cursor..end).map(|i| self.load(i)).collect();
        self.cursor = end;
        Some(batch)
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.paths.len())
    }
}
