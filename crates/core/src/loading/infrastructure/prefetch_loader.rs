use crate::loading::domain::frame_loader::{FrameLoader, LoadedFrame};
use crate::shared::error::SendError;
use crate::shared::video_metadata::VideoMetadata;

pub const DEFAULT_PREFETCH_DEPTH: usize = 2;

type Batch = Result<Vec<LoadedFrame>, SendError>;

/// Decodes batches on a worker thread ahead of the consumer.
///
/// Layout: `inner loader → bounded channel → next_batch()`. The channel
/// bound caps how many decoded batches sit in memory. Dropping the loader
/// closes the channel and joins the worker.
pub struct PrefetchLoader {
    rx: Option<crossbeam_channel::Receiver<Batch>>,
    handle: Option<std::thread::JoinHandle<()>>,
    metadata: Option<VideoMetadata>,
    frame_count: Option<usize>,
}

impl PrefetchLoader {
    pub fn new(mut inner: Box<dyn FrameLoader>, depth: usize) -> Self {
        let metadata = inner.video_metadata();
        let frame_count = inner.frame_count();
        let (tx, rx) = crossbeam_channel::bounded::<Batch>(depth.max(1));

        let handle = std::thread::spawn(move || {
            while let Some(batch) = inner.next_batch() {
                let failed = batch.is_err();
                if tx.send(batch).is_err() || failed {
                    break;
                }
            }
        });

        Self {
            rx: Some(rx),
            handle: Some(handle),
            metadata,
            frame_count,
        }
    }
}

impl FrameLoader for PrefetchLoader {
    fn next_batch(&mut self) -> Option<Batch> {
        self.rx.as_ref()?.recv().ok()
    }

    fn video_metadata(&self) -> Option<VideoMetadata> {
        self.metadata.clone()
    }

    fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }
}

impl Drop for PrefetchLoader {
    fn drop(&mut self) {
        self.rx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Prefetch worker panicked");
            }
        }
    }
}
