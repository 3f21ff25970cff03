use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::config::AudioFormat;
use crate::error::{AutosubError, Result};

/// Sample rate expected by the speech engine.
pub const SAMPLE_RATE: u32 = 16_000;

/// Check if FFmpeg is installed and accessible.
pub async fn check_ffmpeg(binary: &Path) -> Result<()> {
    check_binary(binary, "FFmpeg").await
}

/// Check if FFprobe is installed and accessible.
pub async fn check_ffprobe(binary: &Path) -> Result<()> {
    check_binary(binary, "FFprobe").await
}

async fn check_binary(binary: &Path, name: &str) -> Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .await
        .map_err(|e| {
            AutosubError::Config(format!(
                "{name} not found at {}. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux). Error: {e}",
                binary.display()
            ))
        })?;

    if !output.status.success() {
        return Err(AutosubError::Config(format!("{name} check failed")));
    }

    debug!("{} is available", name);
    Ok(())
}

/// Run a transcoder command, optionally bounded by a timeout.
///
/// Returns the stderr text on failure so callers can wrap it in the right
/// error variant.
pub(crate) async fn run_command(
    mut cmd: Command,
    timeout: Option<Duration>,
) -> std::result::Result<Vec<u8>, String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Executing: {:?}", cmd);

    let child = cmd.spawn().map_err(|e| format!("failed to spawn: {e}"))?;
    let waiting = child.wait_with_output();

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, waiting)
            .await
            .map_err(|_| format!("timed out after {}s", limit.as_secs()))?,
        None => waiting.await,
    }
    .map_err(|e| format!("failed to wait: {e}"))?;

    if !output.status.success() {
        return Err(stderr_tail(&output.stderr));
    }

    Ok(output.stdout)
}

/// Last few lines of stderr; ffmpeg prints its banner first.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}

/// Extract a mono 16 kHz audio track from a video/audio file.
pub async fn extract_audio(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    format: AudioFormat,
    timeout: Option<Duration>,
) -> Result<()> {
    if !input.exists() {
        return Err(AutosubError::InputNotFound(input.display().to_string()));
    }

    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-y", "-i"])
        .arg(input)
        .args(["-vn", "-ac", "1", "-ar"])
        .arg(SAMPLE_RATE.to_string())
        .args(format.codec_args())
        .arg(output);

    run_command(cmd, timeout).await.map_err(|stderr| {
        AutosubError::ExtractionFailure(format!("{}: {}", input.display(), stderr))
    })?;

    if !output.exists() {
        return Err(AutosubError::ExtractionFailure(format!(
            "{}: output file was not created",
            input.display()
        )));
    }

    debug!("Audio extracted to {}", output.display());
    Ok(())
}

/// Extract a window of audio between start and end times as WAV.
pub async fn extract_window(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    start: Duration,
    end: Duration,
) -> Result<()> {
    let duration = end.saturating_sub(start);
    if duration.is_zero() {
        return Err(AutosubError::ExtractionFailure(
            "Window duration is zero".to_string(),
        ));
    }

    let start_secs = format!("{:.3}", start.as_secs_f64());
    let duration_secs = format!("{:.3}", duration.as_secs_f64());

    debug!(
        "Extracting window: start={}, duration={}",
        start_secs, duration_secs
    );

    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-y", "-ss"])
        .arg(&start_secs)
        .arg("-t")
        .arg(&duration_secs)
        .arg("-i")
        .arg(input)
        .args(["-vn", "-ac", "1", "-ar"])
        .arg(SAMPLE_RATE.to_string())
        .args(AudioFormat::Wav.codec_args())
        .arg(output);

    run_command(cmd, None).await.map_err(|stderr| {
        AutosubError::ExtractionFailure(format!("window of {}: {}", input.display(), stderr))
    })?;

    Ok(())
}

/// Duration of a WAV file read from its header.
pub fn wav_duration(path: &Path) -> Option<Duration> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    let frames = reader.duration() as f64;
    Some(Duration::from_secs_f64(frames / spec.sample_rate as f64))
}

/// Duration of any audio file; WAV headers are read directly, everything
/// else goes through FFprobe.
pub async fn audio_duration(ffprobe: &Path, path: &Path) -> Result<Duration> {
    if let Some(duration) = wav_duration(path) {
        return Ok(duration);
    }

    let mut cmd = Command::new(ffprobe);
    cmd.args([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .arg(path);

    let stdout = run_command(cmd, None)
        .await
        .map_err(|stderr| AutosubError::TranscriptionFailure(format!("FFprobe failed: {stderr}")))?;

    let duration_str = String::from_utf8_lossy(&stdout);
    let duration_secs: f64 = duration_str.trim().parse().map_err(|e| {
        AutosubError::TranscriptionFailure(format!(
            "Failed to parse duration '{}': {e}",
            duration_str.trim()
        ))
    })?;

    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return Err(AutosubError::TranscriptionFailure(format!(
            "Invalid duration reported for {}",
            path.display()
        )));
    }

    Ok(Duration::from_secs_f64(duration_secs))
}
