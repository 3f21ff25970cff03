pub mod chunk;
pub mod extract;
pub mod pool;

pub use chunk::{cleanup_windows, create_windows, plan_windows};
pub use extract::{
    audio_duration, check_ffmpeg, check_ffprobe, extract_audio, extract_window, wav_duration,
};
pub use pool::{extract_all, ExtractionJob};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions treated as audio-only containers.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "ogg", "oga", "opus", "aac", "wma", "aiff", "aif",
];

/// Whether an input still needs its audio track pulled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    NeedsExtraction,
    AlreadyAudio,
}

/// Classify a path by its extension.
///
/// Pure: the file is not touched, so a missing path is only noticed by the
/// first stage that opens it.
pub fn classify(path: &Path) -> MediaKind {
    let is_audio = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false);

    if is_audio {
        MediaKind::AlreadyAudio
    } else {
        MediaKind::NeedsExtraction
    }
}

/// An input path together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInput {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = classify(&path);
        Self { path, kind }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::AlreadyAudio
    }

    /// File name without extension, used to name every derived output.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    }
}

/// Audio ready for the speech engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    /// True when the artifact lives in the run's scratch directory.
    pub scratch: bool,
}

/// A time window of a longer audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Duration,
    pub end: Duration,
}

impl TimeRange {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// A decoding window written to its own file.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    pub range: TimeRange,
    pub path: PathBuf,
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_audio_extensions() {
        assert_eq!(classify(Path::new("talk.mp3")), MediaKind::AlreadyAudio);
        assert_eq!(classify(Path::new("/a/b/Talk.WAV")), MediaKind::AlreadyAudio);
        assert_eq!(classify(Path::new("song.flac")), MediaKind::AlreadyAudio);
    }

    #[test]
    fn test_classify_video_and_unknown() {
        assert_eq!(classify(Path::new("movie.mp4")), MediaKind::NeedsExtraction);
        assert_eq!(classify(Path::new("movie.mkv")), MediaKind::NeedsExtraction);
        assert_eq!(classify(Path::new("no_extension")), MediaKind::NeedsExtraction);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let path = Path::new("/does/not/exist/clip.m4a");
        assert_eq!(classify(path), classify(path));
        assert_eq!(MediaInput::new(path), MediaInput::new(path));
    }

    #[test]
    fn test_media_input_stem() {
        let input = MediaInput::new("/videos/lecture 01.mp4");
        assert_eq!(input.stem(), "lecture 01");
        assert!(!input.is_audio());
    }

    #[test]
    fn test_time_range_duration() {
        let range = TimeRange {
            start: Duration::from_secs(10),
            end: Duration::from_secs(25),
        };
        assert_eq!(range.duration(), Duration::from_secs(15));
    }
}
