use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

use super::extract::extract_window;
use super::{AudioWindow, TimeRange};

/// Plan fixed-length decoding windows covering the whole audio.
pub fn plan_windows(total_duration: Duration, window: Duration) -> Vec<TimeRange> {
    let mut windows = Vec::new();
    if window.is_zero() {
        return windows;
    }

    let mut current = Duration::ZERO;
    while current < total_duration {
        let end = (current + window).min(total_duration);
        windows.push(TimeRange {
            start: current,
            end,
        });
        current = end;
    }

    windows
}

/// Write each planned window to its own WAV file under `output_dir`.
pub async fn create_windows(
    ffmpeg: &Path,
    source_audio: &Path,
    ranges: &[TimeRange],
    output_dir: &Path,
) -> Result<Vec<AudioWindow>> {
    tokio::fs::create_dir_all(output_dir).await?;

    let mut windows = Vec::with_capacity(ranges.len());

    for (index, range) in ranges.iter().enumerate() {
        let path = output_dir.join(format!("window_{:04}.wav", index));

        debug!(
            "Creating window {}: {:?} to {:?}",
            index, range.start, range.end
        );

        extract_window(ffmpeg, source_audio, &path, range.start, range.end).await?;

        windows.push(AudioWindow {
            range: range.clone(),
            path,
            index,
        });
    }

    Ok(windows)
}

/// Remove window files, logging instead of failing.
pub fn cleanup_windows(windows: &[AudioWindow]) {
    for window in windows {
        if window.path.exists() {
            if let Err(e) = std::fs::remove_file(&window.path) {
                warn!(
                    "Failed to remove window file {}: {}",
                    window.path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_windows_exact_multiple() {
        let windows = plan_windows(Duration::from_secs(1200), Duration::from_secs(600));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, Duration::ZERO);
        assert_eq!(windows[0].end, Duration::from_secs(600));
        assert_eq!(windows[1].end, Duration::from_secs(1200));
    }

    #[test]
    fn test_plan_windows_remainder() {
        let windows = plan_windows(Duration::from_secs(1300), Duration::from_secs(600));
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].start, Duration::from_secs(1200));
        assert_eq!(windows[2].duration(), Duration::from_secs(100));
    }

    #[test]
    fn test_plan_windows_shorter_than_window() {
        let windows = plan_windows(Duration::from_secs(42), Duration::from_secs(600));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, Duration::from_secs(42));
    }

    #[test]
    fn test_plan_windows_empty() {
        assert!(plan_windows(Duration::ZERO, Duration::from_secs(600)).is_empty());
        assert!(plan_windows(Duration::from_secs(10), Duration::ZERO).is_empty());
    }

    #[test]
    fn test_cleanup_windows_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window_0000.wav");
        std::fs::write(&path, b"x").unwrap();

        let windows = vec![AudioWindow {
            range: TimeRange {
                start: Duration::ZERO,
                end: Duration::from_secs(1),
            },
            path: path.clone(),
            index: 0,
        }];
        cleanup_windows(&windows);

        assert!(!path.exists());
    }
}
