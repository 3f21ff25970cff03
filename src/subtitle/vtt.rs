// WebVTT subtitle format
use super::{timestamp_parts, SubtitleFormatter};
use crate::transcribe::Segment;
use std::time::Duration;

pub struct VttFormatter;

impl SubtitleFormatter for VttFormatter {
    fn format(&self, segments: &[Segment]) -> String {
        let mut output = String::from("WEBVTT\n\n");

        for (i, segment) in segments.iter().enumerate() {
            output.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                format_timestamp(segment.start),
                format_timestamp(segment.end),
                segment.text
            ));
        }

        output
    }

    fn extension(&self) -> &'static str {
        "vtt"
    }
}

fn format_timestamp(d: Duration) -> String {
    let (hours, minutes, seconds, millis) = timestamp_parts(d);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(Duration::from_millis(1500)),
            "00:00:01.500"
        );
    }

    #[test]
    fn test_vtt_format() {
        let segments = vec![Segment::new(1.5, 4.0, "Hello, world!")];

        let output = VttFormatter.format(&segments);

        assert!(output.starts_with("WEBVTT\n\n1\n"));
        assert!(output.contains("00:00:01.500 --> 00:00:04.000\nHello, world!\n\n"));
    }

    #[test]
    fn test_vtt_empty() {
        assert_eq!(VttFormatter.format(&[]), "WEBVTT\n\n");
    }
}
