use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }

    /// `MM:SS` timestamp of a native frame index, clamped to the duration
    /// when the frame count is known.
    pub fn approx_time(&self, frame: usize) -> String {
        let secs = if self.fps <= 0.0 {
            0.0
        } else if self.total_frames > 0 && frame >= self.total_frames {
            self.duration_secs()
        } else {
            frame as f64 / self.fps
        };
        let minutes = (secs / 60.0).floor() as u64;
        let seconds = (secs % 60.0).floor() as u64;
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn meta(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames,
            codec: "h264".to_string(),
            source_path: None,
        }
    }

    #[test]
    fn test_duration() {
        assert!((meta(30.0, 900).duration_secs() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_zero_fps() {
        assert_eq!(meta(0.0, 1).duration_secs(), 0.0);
    }

    #[rstest]
    #[case::start(0, "00:00")]
    #[case::one_second(30, "00:01")]
    #[case::minute_boundary(1830, "01:01")]
    #[case::past_end(5000, "02:00")]
    fn test_approx_time(#[case] frame: usize, #[case] expected: &str) {
        assert_eq!(meta(30.0, 3600).approx_time(frame), expected);
    }

    #[rstest]
    #[case(0, "00:00")]
    #[case(30, "00:01")]
    #[case(90, "00:03")]
    #[case(1800, "01:00")]
    fn test_approx_time_unknown_frame_count(#[case] frame: usize, #[case] expected: &str) {
        assert_eq!(meta(30.0, 0).approx_time(frame), expected);
    }

    #[test]
    fn test_approx_time_without_frame_rate() {
        assert_eq!(meta(0.0, 0).approx_time(500), "00:00");
    }
}
