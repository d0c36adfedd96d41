use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;

use crate::geometry::letterbox::letterbox_frame;
use crate::loading::domain::frame_loader::{FrameLoader, LoadedFrame};
use crate::shared::error::{AnalyzeError, ConfigError, SendError};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Decodes a video file via ffmpeg-next (libavformat + libavcodec).
///
/// Every `skip_frames`-th frame is kept, carrying its native frame index.
/// Frames are converted to RGB24 and optionally letterboxed.
pub struct VideoLoader {
    ictx: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    metadata: VideoMetadata,
    source: String,
    options: VideoOptions,
    next_index: usize,
    flushing: bool,
    done: bool,
}

// Safety: VideoLoader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for VideoLoader {}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoOptions {
    pub batch_size: usize,
    /// Keep one frame out of this many; `1` keeps every frame.
    pub skip_frames: usize,
    pub output_size: Option<u32>,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            skip_frames: 1,
            output_size: None,
        }
    }
}

impl VideoLoader {
    pub fn open(path: &Path, options: VideoOptions) -> Result<Self, AnalyzeError> {
        if options.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                option: "batch_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if options.skip_frames == 0 {
            return Err(ConfigError::InvalidValue {
                option: "skip_frames",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        Self::open_stream(path, options).map_err(AnalyzeError::Load)
    }

    fn open_stream(path: &Path, options: VideoOptions) -> Result<Self, SendError> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let (width, height) = (decoder.width(), decoder.height());

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames: frame_count(stream.frames(), stream_duration_secs(&stream), fps),
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "Opened {}: {width}x{height} @ {fps:.2} fps, {} frames",
            path.display(),
            metadata.total_frames
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            metadata,
            source: path.display().to_string(),
            options,
            next_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn try_receive(&mut self) -> Option<Result<Frame, SendError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let (w, h) = (self.metadata.width, self.metadata.height);
        let frame = Frame::new(extract_rgb_pixels(&rgb, w, h), w, h, self.next_index);
        self.next_index += 1;
        Some(frame.map_err(Into::into))
    }

    fn decode_next(&mut self) -> Option<Result<Frame, SendError>> {
        if self.done {
            return None;
        }
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }
        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                if let Err(e) = self.decoder.send_eof() {
                    log::debug!("Flushing decoder for {}: {e}", self.source);
                }
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }

    fn prepare(&self, frame: Frame) -> Result<LoadedFrame, SendError> {
        match self.options.output_size {
            Some(size) => {
                let (boxed, letterbox) = letterbox_frame(&frame, size)?;
                Ok(LoadedFrame::new(boxed, self.source.clone(), letterbox))
            }
            None => Ok(LoadedFrame::unscaled(frame, self.source.clone())),
        }
    }
}

impl FrameLoader for VideoLoader {
    fn next_batch(&mut self) -> Option<Result<Vec<LoadedFrame>, SendError>> {
        let mut batch = Vec::with_capacity(self.options.batch_size);
        while batch.len() < self.options.batch_size {
            let frame = match self.decode_next() {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            };
            if frame.index() % self.options.skip_frames != 0 {
                continue;
            }
            match self.prepare(frame) {
                Ok(item) => batch.push(item),
                Err(e) => return Some(Err(e)),
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }

    fn video_metadata(&self) -> Option<VideoMetadata> {
        Some(self.metadata.clone())
    }

    fn frame_count(&self) -> Option<usize> {
        let total = self.metadata.total_frames;
        (total > 0).then(|| total.div_ceil(self.options.skip_frames))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping per-row stride padding.
fn stream_duration_secs(stream: &ffmpeg_next::Stream<'_>) -> f64 {
    let duration = stream.duration();
    let time_base = stream.time_base();
    if duration <= 0 || time_base.denominator() == 0 {
        return 0.0;
    }
    duration as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Container frame count, or an estimate from duration and frame rate when
/// the container does not record one (0 when neither is known).
fn frame_count(reported: i64, duration_secs: f64, fps: f64) -> usize {
    if reported > 0 {
        reported as usize
    } else if duration_secs > 0.0 && fps > 0.0 {
        (duration_secs * fps).round() as usize
    } else {
        0
    }
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    /// Writes an MPEG-4 clip whose frame `i` is a flat gray of `(i * 40) % 256`.
    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();
        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut rgb =
                ffmpeg_next::util::frame::video::Video::new(ffmpeg_next::format::Pixel::RGB24, width, height);
            let stride = rgb.stride(0);
            let value = ((i * 40) % 256) as u8;
            let data = rgb.data_mut(0);
            for row in 0..height as usize {
                for col in 0..width as usize * 3 {
                    data[row * stride + col] = value;
                }
            }
            let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(&mut octx).unwrap();
            }
        }
        encoder.send_eof().unwrap();
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            encoded.write_interleaved(&mut octx).unwrap();
        }
        octx.write_trailer().unwrap();
    }

    fn test_video(dir: &Path, frames: usize) -> PathBuf {
        let path = dir.join("test.mp4");
        create_test_video(&path, frames, 160, 120, 30);
        path
    }

    fn drain_indices(loader: &mut VideoLoader) -> Vec<usize> {
        let mut out = Vec::new();
        while let Some(batch) = loader.next_batch() {
            out.extend(batch.unwrap().iter().map(|f| f.frame.index()));
        }
        out
    }

    #[rstest]
    #[case::reported(120, 10.0, 30.0, 120)]
    #[case::estimated_from_duration(0, 4.0, 25.0, 100)]
    #[case::unknown(0, 0.0, 30.0, 0)]
    #[case::no_frame_rate(0, 4.0, 0.0, 0)]
    fn test_frame_count(
        #[case] reported: i64,
        #[case] duration_secs: f64,
        #[case] fps: f64,
        #[case] expected: usize,
    ) {
        assert_eq!(frame_count(reported, duration_secs, fps), expected);
    }

    #[test]
    fn test_open_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 5);
        let loader = VideoLoader::open(&path, VideoOptions::default()).unwrap();
        let meta = loader.video_metadata().unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_is_load_error() {
        let err = VideoLoader::open(Path::new("/nonexistent/test.mp4"), VideoOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, AnalyzeError::Load(_)));
    }

    #[test]
    fn test_every_frame_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 5);
        let options = VideoOptions {
            batch_size: 2,
            ..VideoOptions::default()
        };
        let mut loader = VideoLoader::open(&path, options).unwrap();
        assert_eq!(drain_indices(&mut loader), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_skip_frames_keeps_native_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 7);
        let options = VideoOptions {
            batch_size: 2,
            skip_frames: 3,
            output_size: None,
        };
        let mut loader = VideoLoader::open(&path, options).unwrap();
        assert_eq!(drain_indices(&mut loader), vec![0, 3, 6]);
    }

    #[test]
    fn test_output_size_letterboxes_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 1);
        let options = VideoOptions {
            output_size: Some(80),
            ..VideoOptions::default()
        };
        let mut loader = VideoLoader::open(&path, options).unwrap();
        let item = &loader.next_batch().unwrap().unwrap()[0];
        assert_eq!((item.frame.width(), item.frame.height()), (80, 80));
        assert_eq!(item.letterbox.original_width, 160);
        assert_eq!(item.letterbox.top, 10.0);
        assert_eq!(item.source, dir.path().join("test.mp4").display().to_string());
    }

    #[test]
    fn test_zero_skip_rejected() {
        let options = VideoOptions {
            skip_frames: 0,
            ..VideoOptions::default()
        };
        let err = VideoLoader::open(Path::new("unused.mp4"), options).err().unwrap();
        assert!(err.to_string().contains("skip_frames"));
    }
}
