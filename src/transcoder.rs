//! The media transcoder seam: audio extraction and subtitle burn-in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::audio::extract_audio;
use crate::config::{AudioFormat, Config};
use crate::error::Result;
use crate::mux::{mux_subtitles, SubtitleStyle};

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write a mono 16 kHz copy of the input's audio track to `output`.
    async fn extract_audio(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()>;

    /// Burn `subtitles` into the video stream of `video`, copying its audio.
    async fn mux_subtitles(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
        style: &SubtitleStyle,
    ) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Transcoder backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ffmpeg_path.clone())
            .with_timeout(config.transcoder_timeout_secs.map(Duration::from_secs))
    }

    /// Bound every ffmpeg invocation; the child is killed on expiry.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()> {
        extract_audio(&self.binary, input, output, format, self.timeout).await
    }

    async fn mux_subtitles(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
        style: &SubtitleStyle,
    ) -> Result<()> {
        mux_subtitles(&self.binary, video, subtitles, output, style, self.timeout).await
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = Config {
            ffmpeg_path: PathBuf::from("/opt/bin/ffmpeg"),
            transcoder_timeout_secs: Some(30),
            ..Config::default()
        };

        let transcoder = FfmpegTranscoder::from_config(&config);
        assert_eq!(transcoder.binary(), Path::new("/opt/bin/ffmpeg"));
        assert_eq!(transcoder.timeout, Some(Duration::from_secs(30)));
        assert_eq!(transcoder.name(), "ffmpeg");
    }
}
