// SRT subtitle format
use super::{timestamp_parts, SubtitleFormatter};
use crate::error::{AutosubError, Result};
use crate::transcribe::Segment;
use regex::Regex;
use std::time::Duration;

pub struct SrtFormatter;

impl SubtitleFormatter for SrtFormatter {
    fn format(&self, segments: &[Segment]) -> String {
        let mut output = String::new();

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
        "srt"
    }
}

/// `HH:MM:SS,mmm`, hours widening past two digits when needed.
pub fn format_timestamp(d: Duration) -> String {
    let (hours, minutes, seconds, millis) = timestamp_parts(d);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn timing_regex() -> Regex {
    Regex::new(r"^\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("timing pattern is valid")
}

fn captured_duration(caps: &regex::Captures<'_>, first: usize) -> Option<Duration> {
    let field = |i: usize| caps.get(first + i)?.as_str().parse::<u64>().ok();
    let (h, m, s, ms) = (field(0)?, field(1)?, field(2)?, field(3)?);
    Some(Duration::from_millis(
        ((h * 60 + m) * 60 + s) * 1000 + ms,
    ))
}

fn is_cue_start(lines: &[&str], at: usize, timing: &Regex) -> bool {
    match (lines.get(at), lines.get(at + 1)) {
        (Some(index), Some(times)) => {
            index.trim().parse::<usize>().is_ok() && timing.is_match(times)
        }
        _ => false,
    }
}

/// Parse SRT content back into segments.
///
/// Text runs until a blank line that is followed by the next cue (or by
/// the end of input), so empty and multi-paragraph texts survive.
pub fn parse_srt(content: &str) -> Result<Vec<Segment>> {
    let timing = timing_regex();
    let content = content.replace("\r\n", "\n");
    let lines: Vec<&str> = content.split('\n').collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        if lines[i].trim().parse::<usize>().is_err() {
            return Err(AutosubError::SubtitleParse {
                line: i + 1,
                message: format!("expected cue number, found '{}'", lines[i]),
            });
        }

        let times = lines.get(i + 1).copied().unwrap_or_default();
        let caps = timing.captures(times).ok_or_else(|| AutosubError::SubtitleParse {
            line: i + 2,
            message: format!("expected timing line, found '{}'", times),
        })?;
        let (start, end) = match (captured_duration(&caps, 1), captured_duration(&caps, 5)) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(AutosubError::SubtitleParse {
                    line: i + 2,
                    message: "timestamp out of range".to_string(),
                })
            }
        };

        let text_start = i + 2;
        let mut text_end = text_start;
        while text_end < lines.len() {
            if lines[text_end].is_empty() {
                let rest_blank = lines[text_end..].iter().all(|l| l.trim().is_empty());
                if rest_blank || is_cue_start(&lines, text_end + 1, &timing) {
                    break;
                }
            }
            text_end += 1;
        }

        segments.push(Segment {
            start,
            end,
            text: lines[text_start..text_end].join("\n"),
        });
        i = text_end + 1;
    }

    Ok(segments)
}
