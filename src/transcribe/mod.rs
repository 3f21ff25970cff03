pub mod consistency;
pub mod whisper;

pub use whisper::WhisperClient;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A timestamped unit of recognized (or translated) speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl Segment {
    /// Build a segment from engine seconds. Negative or non-finite values
    /// become zero and `end` is raised to `start` if needed.
    pub fn new(start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        let start = secs_to_duration(start_secs);
        let end = secs_to_duration(end_secs).max(start);
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Make start times non-decreasing and every end at least its start.
pub fn enforce_monotonic(segments: &mut [Segment]) {
    let mut floor = Duration::ZERO;
    for segment in segments.iter_mut() {
        if segment.start < floor {
            segment.start = floor;
        }
        if segment.end < segment.start {
            segment.end = segment.start;
        }
        floor = segment.start;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub segments: Vec<Segment>,
    /// Language reported by the engine, if any.
    pub language: Option<String>,
    /// Windows whose output repeated itself, so the window after each was
    /// decoded without the earlier text as context.
    pub conditioning_resets: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Speech to text in the spoken language.
    #[default]
    Transcribe,
    /// Speech to English text.
    Translate,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Transcribe => write!(f, "transcribe"),
            Task::Translate => write!(f, "translate"),
        }
    }
}

impl std::str::FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            _ => Err(format!(
                "Unknown task: {}. Use 'transcribe' or 'translate'",
                s
            )),
        }
    }
}

/// Everything the speech engine is allowed to be told.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscribeOptions {
    pub task: Task,
    /// Spoken language; `None` lets the engine detect it.
    pub language: Option<String>,
    /// Condition each decoding window on the text decoded so far for the
    /// same input.
    pub condition_on_previous_text: bool,
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Recognize speech in one audio file. Segments come back ordered with
    /// non-decreasing timestamps.
    async fn transcribe(&self, audio: &Path, options: &TranscribeOptions) -> Result<Transcript>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_new_clamps() {
        let seg = Segment::new(-1.0, 2.5, "x");
        assert_eq!(seg.start, Duration::ZERO);
        assert_eq!(seg.end, Duration::from_millis(2500));

        let seg = Segment::new(5.0, 3.0, "y");
        assert_eq!(seg.end, seg.start);

        let seg = Segment::new(f64::NAN, f64::INFINITY, "z");
        assert_eq!(seg.start, Duration::ZERO);
    }

    #[test]
    fn test_enforce_monotonic() {
        let mut segments = vec![
            Segment::new(0.0, 2.0, "a"),
            Segment::new(5.0, 6.0, "b"),
            Segment::new(4.5, 4.8, "c"),
        ];
        enforce_monotonic(&mut segments);

        assert_eq!(segments[2].start, Duration::from_secs(5));
        assert_eq!(segments[2].end, Duration::from_secs(5));
        assert!(segments.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn test_task_parsing() {
        assert_eq!("transcribe".parse::<Task>().unwrap(), Task::Transcribe);
        assert_eq!("Translate".parse::<Task>().unwrap(), Task::Translate);
        assert!("summarize".parse::<Task>().is_err());
    }

    #[test]
    fn test_default_options() {
        let options = TranscribeOptions::default();
        assert_eq!(options.task, Task::Transcribe);
        assert!(options.language.is_none());
        assert!(!options.condition_on_previous_text);
    }
}
