pub mod srt;
pub mod vtt;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::transcribe::Segment;
use std::path::Path;
use std::time::Duration;

pub use srt::{parse_srt, SrtFormatter};
pub use vtt::VttFormatter;

/// Serializes an ordered segment sequence. Cue numbers are derived from
/// position, so they are always 1-based and contiguous.
pub trait SubtitleFormatter {
    fn format(&self, segments: &[Segment]) -> String;
    fn extension(&self) -> &'static str;
}

pub fn create_formatter(format: OutputFormat) -> Box<dyn SubtitleFormatter> {
    match format {
        OutputFormat::Srt => Box::new(SrtFormatter),
        OutputFormat::Vtt => Box::new(VttFormatter),
    }
}

/// Serialize `segments` and write them to `path` as UTF-8.
pub async fn write_subtitles(path: &Path, segments: &[Segment], format: OutputFormat) -> Result<()> {
    let content = create_formatter(format).format(segments);
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// Split a duration into (hours, minutes, seconds, millis), rounding to the
/// nearest millisecond. Hours are not wrapped.
pub(crate) fn timestamp_parts(d: Duration) -> (u128, u128, u128, u128) {
    let total_millis = (d.as_nanos() + 500_000) / 1_000_000;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let seconds = (total_millis % 60_000) / 1_000;
    let millis = total_millis % 1_000;
    (hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_parts_rounds_to_millis() {
        assert_eq!(timestamp_parts(Duration::from_micros(1_499)), (0, 0, 0, 1));
        assert_eq!(timestamp_parts(Duration::from_micros(1_500)), (0, 0, 0, 2));
        assert_eq!(timestamp_parts(Duration::from_micros(999_600)), (0, 0, 1, 0));
    }

    #[test]
    fn test_timestamp_parts_does_not_wrap_hours() {
        let (hours, minutes, _, _) = timestamp_parts(Duration::from_secs(100 * 3600 + 120));
        assert_eq!(hours, 100);
        assert_eq!(minutes, 2);
    }

    #[test]
    fn test_create_formatter_factory() {
        assert_eq!(create_formatter(OutputFormat::Srt).extension(), "srt");
        assert_eq!(create_formatter(OutputFormat::Vtt).extension(), "vtt");
    }

    #[tokio::test]
    async fn test_write_subtitles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let segments = vec![Segment::new(0.0, 1.5, "Hola")];

        write_subtitles(&path, &segments, OutputFormat::Srt).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "1\n00:00:00,000 --> 00:00:01,500\nHola\n\n");
    }
}
