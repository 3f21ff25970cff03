//! Burning subtitles into a copy of the source video.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::warn;

use crate::audio::extract::run_command;
use crate::error::{AutosubError, Result};

/// ASS style overrides handed to the `subtitles` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub outline_colour: String,
    pub border_style: u8,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            outline_colour: "&H40000000".to_string(),
            border_style: 3,
        }
    }
}

impl SubtitleStyle {
    pub fn force_style(&self) -> String {
        format!(
            "OutlineColour={},BorderStyle={}",
            self.outline_colour, self.border_style
        )
    }
}

/// Where the subtitled copy of `input` should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutput {
    pub path: PathBuf,
    /// The default path was the input itself or was already taken.
    pub renamed: bool,
}

/// Compute `<output_dir>/<stem>.mp4`, falling back to
/// `<output_dir>/<stem>-subtitled.mp4` (then `-subtitled-2`, ...) when that
/// would be the input file or `claim` reports the path as taken.
///
/// `claim` is called on each candidate that is not the input and must
/// return true when the caller accepts it as free.
pub fn video_output_path<F>(input: &Path, output_dir: &Path, mut claim: F) -> VideoOutput
where
    F: FnMut(&Path) -> bool,
{
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let default = output_dir.join(format!("{stem}.mp4"));
    if !is_same_file(input, &default) && claim(&default) {
        return VideoOutput {
            path: default,
            renamed: false,
        };
    }

    let mut path = output_dir.join(format!("{stem}-subtitled.mp4"));
    let mut n = 2;
    while is_same_file(input, &path) || !claim(&path) {
        path = output_dir.join(format!("{stem}-subtitled-{n}.mp4"));
        n += 1;
    }

    warn!(
        "{} would overwrite an existing input or output. Renaming the output file to {}",
        default.display(),
        path.display()
    );
    VideoOutput {
        path,
        renamed: true,
    }
}

/// Both paths exist and resolve to the same file.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Escape a path for use as a filtergraph option value.
///
/// Two levels apply: the option value (`\`, `'`, `:`) and the filtergraph
/// itself (`,`, `;`, `[`, `]`).
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\\\\\"),
            '\'' => escaped.push_str("\\\\\\'"),
            ':' => escaped.push_str("\\\\:"),
            ',' | ';' | '[' | ']' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// The `-vf` argument that burns `subtitles` into the picture.
pub fn subtitle_filter(subtitles: &Path, style: &SubtitleStyle) -> String {
    format!(
        "subtitles={}:force_style='{}'",
        escape_filter_path(subtitles),
        style.force_style()
    )
}

/// Arguments for burning `subtitles` into `video`. The audio track is
/// re-encoded to AAC so any source codec fits the MP4 container.
pub fn mux_args(video: &Path, subtitles: &Path, output: &Path, style: &SubtitleStyle) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        video.as_os_str().to_owned(),
        "-vf".into(),
        subtitle_filter(subtitles, style).into(),
        "-c:a".into(),
        "aac".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Run ffmpeg to produce `output` with burned-in subtitles.
pub async fn mux_subtitles(
    ffmpeg: &Path,
    video: &Path,
    subtitles: &Path,
    output: &Path,
    style: &SubtitleStyle,
    timeout: Option<Duration>,
) -> Result<()> {
    if !video.exists() {
        return Err(AutosubError::InputNotFound(video.display().to_string()));
    }

    let mut cmd = Command::new(ffmpeg);
    cmd.args(mux_args(video, subtitles, output, style));

    run_command(cmd, timeout).await.map_err(|stderr| {
        AutosubError::MuxingFailure(format!("{}: {}", video.display(), stderr))
    })?;

    Ok(())
}
