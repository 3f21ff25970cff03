use crate::audio::{audio_duration, cleanup_windows, create_windows, plan_windows, AudioWindow, TimeRange};
use crate::error::{AutosubError, Result};
use crate::transcribe::consistency::{is_degenerate, prompt_tail, PROMPT_CHARS};
use crate::transcribe::{enforce_monotonic, Segment, SpeechEngine, Task, TranscribeOptions, Transcript};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Maximum file size for Whisper API (25 MB).
const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// OpenAI Whisper API client.
///
/// Audio longer than one window (or larger than the upload limit) is cut
/// into windows with FFmpeg and sent one window at a time, in order.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    window: Duration,
    condition_window: Duration,
}

impl WhisperClient {
    /// Create a new Whisper client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            model: "whisper-1".to_string(),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            window: Duration::from_secs(600),
            condition_window: Duration::from_secs(30),
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at another API root (e.g. a local mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Binaries and window length used to split long audio.
    pub fn with_windowing(mut self, ffmpeg: PathBuf, ffprobe: PathBuf, window: Duration) -> Self {
        self.ffmpeg = ffmpeg;
        self.ffprobe = ffprobe;
        self.window = window;
        self
    }

    /// Window length used when each window is conditioned on the text
    /// before it. Shorter than the plain window so that conditioning
    /// applies to ordinary-length audio too.
    pub fn with_condition_window(mut self, window: Duration) -> Self {
        self.condition_window = window;
        self
    }

    fn window_for(&self, options: &TranscribeOptions) -> Duration {
        if options.condition_on_previous_text {
            self.window.min(self.condition_window)
        } else {
            self.window
        }
    }

    fn endpoint(&self, task: Task) -> String {
        match task {
            Task::Transcribe => format!("{}/audio/transcriptions", self.base_url),
            Task::Translate => format!("{}/audio/translations", self.base_url),
        }
    }

    /// Build the multipart form for the API request.
    async fn build_form(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        prompt: Option<&str>,
    ) -> Result<Form> {
        let file_bytes = fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let mime_type = match audio_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") | Some("oga") | Some("opus") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "application/octet-stream",
        };

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_type)?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        // The translations endpoint always produces English and takes no
        // language hint or timestamp granularity.
        if options.task == Task::Transcribe {
            form = form.text("timestamp_granularities[]", "segment");
            if let Some(ref lang) = options.language {
                form = form.text("language", lang.clone());
            }
        }

        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt.to_string());
        }

        Ok(form)
    }

    /// Make the API request. There is no retry: a failure is surfaced as is.
    async fn call_api(&self, task: Task, form: Form) -> Result<WhisperResponse> {
        let response = self
            .client
            .post(self.endpoint(task))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);

        if status.is_success() {
            let body = response.text().await?;
            debug!("Whisper API response: {}", truncate(&body, 500));
            let parsed: WhisperResponse = serde_json::from_str(&body)?;
            return Ok(parsed);
        }

        let error_body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
            Ok(api_error) => format!(
                "{} ({})",
                api_error.error.message,
                api_error.error.r#type.unwrap_or_default()
            ),
            Err(_) => error_body,
        };

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AutosubError::Auth(format!("Whisper API: {message}")));
        }

        Err(AutosubError::Api(format!(
            "Whisper API error ({}): {}",
            status, message
        )))
    }

    /// Convert a Whisper API response into segments placed on the timeline
    /// of the whole file.
    fn parse_response(&self, response: WhisperResponse, range: &TimeRange) -> Transcript {
        let offset = range.start.as_secs_f64();
        let mut segments = Vec::new();

        match response.segments {
            Some(api_segments) => {
                for seg in api_segments {
                    segments.push(Segment::new(
                        offset + seg.start,
                        offset + seg.end,
                        seg.text.trim(),
                    ));
                }
            }
            None if !response.text.trim().is_empty() => {
                segments.push(Segment::new(
                    offset,
                    range.end.as_secs_f64(),
                    response.text.trim(),
                ));
            }
            None => {}
        }

        Transcript {
            segments,
            language: response.language,
            ..Default::default()
        }
    }

    /// Split the audio into windows unless it can be sent whole.
    async fn plan(
        &self,
        audio: &Path,
        scratch: &Path,
        window: Duration,
    ) -> Result<(Vec<AudioWindow>, bool)> {
        let duration = audio_duration(&self.ffprobe, audio).await?;
        let size = fs::metadata(audio).await?.len();

        if duration <= window && size <= MAX_FILE_SIZE {
            let whole = AudioWindow {
                range: TimeRange {
                    start: Duration::ZERO,
                    end: duration,
                },
                path: audio.to_path_buf(),
                index: 0,
            };
            return Ok((vec![whole], false));
        }

        let ranges = plan_windows(duration, window);
        debug!(
            "Splitting {} ({:.1}s) into {} windows",
            audio.display(),
            duration.as_secs_f64(),
            ranges.len()
        );
        let windows = create_windows(&self.ffmpeg, audio, &ranges, scratch).await?;
        Ok((windows, true))
    }

    async fn transcribe_windows(
        &self,
        windows: &[AudioWindow],
        options: &TranscribeOptions,
    ) -> Result<Transcript> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut language = None;
        let mut context = String::new();
        let mut condition = options.condition_on_previous_text;
        let mut resets = Vec::new();

        for window in windows {
            let prompt = if condition && !context.is_empty() {
                Some(prompt_tail(&context, PROMPT_CHARS))
            } else {
                None
            };

            debug!(
                "Transcribing window {} ({:?}..{:?}) with{} prompt",
                window.index,
                window.range.start,
                window.range.end,
                if prompt.is_some() { "" } else { "out" }
            );

            let form = self
                .build_form(&window.path, options, prompt.as_deref())
                .await?;
            let response = self.call_api(options.task, form).await?;
            let transcript = self.parse_response(response, &window.range);

            if options.condition_on_previous_text {
                // A looping window must not seed the next one.
                condition = !is_degenerate(&transcript.segments);
                if !condition {
                    debug!("Window {} repeats itself, dropping context", window.index);
                    resets.push(window.index);
                    context.clear();
                }
            }

            if condition {
                for seg in &transcript.segments {
                    context.push(' ');
                    context.push_str(&seg.text);
                }
            }

            if language.is_none() {
                language = transcript.language;
            }
            segments.extend(transcript.segments);
        }

        enforce_monotonic(&mut segments);
        Ok(Transcript {
            segments,
            language,
            conditioning_resets: resets,
        })
    }
}

#[async_trait]
impl SpeechEngine for WhisperClient {
    async fn transcribe(&self, audio: &Path, options: &TranscribeOptions) -> Result<Transcript> {
        if !audio.exists() {
            return Err(AutosubError::InputNotFound(audio.display().to_string()));
        }

        // Window files live only for this call.
        let scratch = tempfile::Builder::new().prefix("autosub-windows").tempdir()?;
        let window = self.window_for(options);
        let (windows, split) = self.plan(audio, scratch.path(), window).await?;

        let result = self.transcribe_windows(&windows, options).await;
        if split {
            cleanup_windows(&windows);
        }

        let transcript = result?;
        debug!(
            "Whisper returned {} segments for {}",
            transcript.segments.len(),
            audio.display()
        );
        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}
