use crate::audio::{extract_all, AudioArtifact, ExtractionJob, MediaInput};
use crate::config::{AudioFormat, OutputFormat};
use crate::diagnostics::quietly;
use crate::error::{AutosubError, Result};
use crate::mux::{video_output_path, SubtitleStyle, VideoOutput};
use crate::subtitle::write_subtitles;
use crate::transcoder::Transcoder;
use crate::transcribe::{enforce_monotonic, Segment, SpeechEngine, TranscribeOptions};
use crate::translate::Translator;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Configuration for the subtitle generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving every persisted output.
    pub output_dir: PathBuf,
    /// Keep the subtitle file in `output_dir`.
    pub output_srt: bool,
    /// Keep the extracted audio in `output_dir`.
    pub output_audio: bool,
    /// Produce a copy of each video with burned-in subtitles.
    pub output_video: bool,
    /// Subtitle file format.
    pub format: OutputFormat,
    /// Container for persisted audio. Scratch audio is always WAV.
    pub audio_format: AudioFormat,
    /// Options handed to the speech engine.
    pub transcribe: TranscribeOptions,
    /// Target language for translation (optional).
    pub translate_to: Option<String>,
    /// Concurrent audio extraction processes.
    pub extract_workers: usize,
    /// Style of burned-in subtitles.
    pub style: SubtitleStyle,
    /// Show progress bars.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            output_srt: true,
            output_audio: false,
            output_video: false,
            format: OutputFormat::default(),
            audio_format: AudioFormat::default(),
            transcribe: TranscribeOptions::default(),
            translate_to: None,
            extract_workers: crate::config::default_extract_workers(),
            style: SubtitleStyle::default(),
            show_progress: true,
        }
    }
}

/// Pipeline stages, in the order every input goes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Transcription,
    Translation,
    Serialization,
    Muxing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extraction => write!(f, "extraction"),
            Stage::Transcription => write!(f, "transcription"),
            Stage::Translation => write!(f, "translation"),
            Stage::Serialization => write!(f, "subtitle writing"),
            Stage::Muxing => write!(f, "muxing"),
        }
    }
}

/// Why an input dropped out of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    pub message: String,
}

/// Everything derived from one input.
#[derive(Debug)]
pub struct RunItem {
    pub input: MediaInput,
    pub audio: Option<AudioArtifact>,
    pub segments: Vec<Segment>,
    pub language: Option<String>,
    pub subtitle: Option<PathBuf>,
    pub video: Option<VideoOutput>,
    pub failure: Option<Failure>,
}

impl RunItem {
    fn new(input: MediaInput) -> Self {
        Self {
            input,
            audio: None,
            segments: Vec::new(),
            language: None,
            subtitle: None,
            video: None,
            failure: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    fn fail(&mut self, stage: Stage, error: &AutosubError) {
        warn!("{} failed for {}: {}", stage, self.input.path.display(), error);
        self.failure = Some(Failure {
            stage,
            message: error.to_string(),
        });
    }
}

/// The outcome of one batch.
#[derive(Debug)]
pub struct PipelineRun {
    pub items: Vec<RunItem>,
    pub elapsed: Duration,
    scratch: TempDir,
}

impl PipelineRun {
    pub fn succeeded(&self) -> impl Iterator<Item = &RunItem> {
        self.items.iter().filter(|item| item.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RunItem> {
        self.items.iter().filter(|item| !item.is_ok())
    }

    /// Process-scoped directory holding files nobody asked to keep. It is
    /// removed when the run is dropped.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn is_scratch(&self, path: &Path) -> bool {
        path.starts_with(self.scratch.path())
    }
}

/// Hands out `<dir>/<stem>.<ext>`, suffixing `-2`, `-3`, ... when the name
/// is already taken by an input of the batch or an earlier output.
///
/// Paths are compared in canonical form, so a different spelling of an
/// input's location still counts as that input.
#[derive(Default)]
struct OutputNames {
    used: HashSet<PathBuf>,
}

impl OutputNames {
    fn key(path: &Path) -> PathBuf {
        if let Ok(canonical) = path.canonicalize() {
            return canonical;
        }
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => parent
                .canonicalize()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| path.to_path_buf()),
            _ => path.to_path_buf(),
        }
    }

    /// Claim `path`. Returns false if it was already taken.
    fn claim(&mut self, path: &Path) -> bool {
        self.used.insert(Self::key(path))
    }

    fn allocate(&mut self, dir: &Path, stem: &str, ext: &str) -> PathBuf {
        let mut candidate = dir.join(format!("{stem}.{ext}"));
        let mut n = 2;
        while !self.claim(&candidate) {
            candidate = dir.join(format!("{stem}-{n}.{ext}"));
            n += 1;
        }
        candidate
    }
}

/// Expand paths and wildcard patterns into existing files, keeping order and
/// dropping duplicates.
pub fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for pattern in patterns {
        let mut matched: Vec<PathBuf> = match glob::glob(pattern) {
            Ok(entries) => entries.filter_map(|e| e.ok()).filter(|p| p.is_file()).collect(),
            Err(e) => {
                debug!("'{}' is not a valid pattern: {}", pattern, e);
                Vec::new()
            }
        };

        // A literal name containing glob metacharacters
        if matched.is_empty() && Path::new(pattern).is_file() {
            matched.push(PathBuf::from(pattern));
        }

        for path in matched {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }

    paths
}

/// Translate all segment texts of one input with a single batched call and
/// write the results back by position. Timing is untouched.
pub async fn translate_segments(
    translator: &dyn Translator,
    segments: &mut [Segment],
    target_lang: &str,
) -> Result<()> {
    if segments.is_empty() {
        return Ok(());
    }

    let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
    let translated = translator.translate_batch(&texts, target_lang).await?;

    if translated.len() != segments.len() {
        return Err(AutosubError::TranslationFailure(format!(
            "sent {} texts but got {} translations back",
            segments.len(),
            translated.len()
        )));
    }

    for (segment, text) in segments.iter_mut().zip(translated) {
        segment.text = text;
    }

    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} extracted ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Runs a batch of inputs through extraction, transcription, optional
/// translation, subtitle writing and optional muxing.
///
/// Each stage finishes for the whole batch before the next one starts. A
/// failure only removes its own input from later stages.
pub struct Pipeline {
    config: PipelineConfig,
    transcoder: Arc<dyn Transcoder>,
    engine: Arc<dyn SpeechEngine>,
    translator: Option<Arc<dyn Translator>>,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        transcoder: Arc<dyn Transcoder>,
        engine: Arc<dyn SpeechEngine>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Self {
        Self {
            config,
            transcoder,
            engine,
            translator,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a flag that stops the run at the next input or stage boundary.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Mark every input still in flight as cancelled. Returns true if the
    /// run should stop.
    fn check_cancelled(&self, items: &mut [RunItem], stage: Stage) -> bool {
        if !self.is_cancelled() {
            return false;
        }
        for item in items.iter_mut().filter(|i| i.is_ok()) {
            item.fail(stage, &AutosubError::Cancelled);
        }
        true
    }

    /// Process a batch. Only run-wide preconditions return `Err`; per-input
    /// failures are recorded on the returned items.
    pub async fn run(&self, paths: Vec<PathBuf>) -> Result<PipelineRun> {
        let start_time = Instant::now();

        if paths.is_empty() {
            return Err(AutosubError::InputNotFound(
                "no input files".to_string(),
            ));
        }

        if let Some(ref target) = self.config.translate_to {
            if self.translator.is_none() {
                return Err(AutosubError::MissingCredential(format!(
                    "translation to '{}' requested but no translation credential is configured",
                    target
                )));
            }
        }

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let scratch = tempfile::Builder::new().prefix("autosub-").tempdir()?;
        debug!("Using temp directory: {:?}", scratch.path());

        let mut items: Vec<RunItem> = paths
            .into_iter()
            .map(|p| RunItem::new(MediaInput::new(p)))
            .collect();
        // Inputs are never valid output targets.
        let mut names = OutputNames::default();
        for item in &items {
            names.claim(&item.input.path);
        }

        self.extract_stage(&mut items, scratch.path(), &mut names)
            .await;
        self.transcribe_stage(&mut items).await;

        if let Some(ref target) = self.config.translate_to {
            self.translate_stage(&mut items, target).await;
        }

        self.write_stage(&mut items, scratch.path(), &mut names)
            .await;

        if self.config.output_video {
            self.mux_stage(&mut items, &mut names).await;
        }

        Ok(PipelineRun {
            items,
            elapsed: start_time.elapsed(),
            scratch,
        })
    }

    async fn extract_stage(&self, items: &mut [RunItem], scratch: &Path, names: &mut OutputNames) {
        if self.check_cancelled(items, Stage::Extraction) {
            return;
        }

        let mut jobs = Vec::new();

        for (key, item) in items.iter_mut().enumerate() {
            if !item.input.path.exists() {
                let error = AutosubError::InputNotFound(item.input.path.display().to_string());
                item.fail(Stage::Extraction, &error);
                continue;
            }

            if item.input.is_audio() {
                debug!("{} is already audio, skipping extraction", item.input.path.display());
                item.audio = Some(AudioArtifact {
                    path: item.input.path.clone(),
                    scratch: false,
                });
                continue;
            }

            let (dir, format) = if self.config.output_audio {
                (self.config.output_dir.as_path(), self.config.audio_format)
            } else {
                (scratch, AudioFormat::Wav)
            };
            let output = names.allocate(dir, &item.input.stem(), format.extension());

            jobs.push(ExtractionJob {
                key,
                input: item.input.path.clone(),
                output,
                format,
            });
        }

        if jobs.is_empty() {
            return;
        }

        let progress = self.config.show_progress.then(|| bar(jobs.len()));
        let keys: Vec<usize> = jobs.iter().map(|j| j.key).collect();
        let mut results = extract_all(
            self.transcoder.clone(),
            jobs,
            self.config.extract_workers,
            progress,
        )
        .await;

        for key in keys {
            let item = &mut items[key];
            match results.remove(&key) {
                Some(Ok(path)) => {
                    item.audio = Some(AudioArtifact {
                        scratch: !self.config.output_audio,
                        path,
                    });
                }
                Some(Err(e)) => item.fail(Stage::Extraction, &e),
                None => item.fail(
                    Stage::Extraction,
                    &AutosubError::ExtractionFailure("no result from worker pool".to_string()),
                ),
            }
        }
    }

    async fn transcribe_stage(&self, items: &mut [RunItem]) {
        for item in items.iter_mut().filter(|i| i.is_ok()) {
            if self.is_cancelled() {
                item.fail(Stage::Transcription, &AutosubError::Cancelled);
                continue;
            }

            let Some(audio) = item.audio.clone() else {
                continue;
            };

            info!(
                "Generating subtitles for {}... This might take a while.",
                item.input.path.display()
            );
            let pb = self
                .config
                .show_progress
                .then(|| spinner(format!("Transcribing {}", item.input.path.display())));
            let started = Instant::now();

            let result = quietly(self.engine.transcribe(&audio.path, &self.config.transcribe)).await;

            match result {
                Ok(mut transcript) => {
                    enforce_monotonic(&mut transcript.segments);
                    if let Some(pb) = pb {
                        pb.finish_with_message(format!(
                            "✓ {} segments from {}",
                            transcript.segments.len(),
                            item.input.path.display()
                        ));
                    }
                    if !transcript.conditioning_resets.is_empty() {
                        warn!(
                            "Transcription of {} repeated itself in window(s) {:?}; the window after each was decoded without earlier text",
                            item.input.path.display(),
                            transcript.conditioning_resets
                        );
                    }
                    info!(
                        "Transcribed {} in {:.2}s: {} segments",
                        item.input.path.display(),
                        started.elapsed().as_secs_f64(),
                        transcript.segments.len()
                    );
                    item.segments = transcript.segments;
                    item.language = transcript.language;
                }
                Err(e) => {
                    if let Some(pb) = pb {
                        pb.finish_and_clear();
                    }
                    item.fail(
                        Stage::Transcription,
                        &AutosubError::TranscriptionFailure(e.to_string()),
                    );
                }
            }
        }
    }

    async fn translate_stage(&self, items: &mut [RunItem], target: &str) {
        let Some(translator) = self.translator.as_deref() else {
            return;
        };

        for item in items.iter_mut().filter(|i| i.is_ok()) {
            if self.is_cancelled() {
                item.fail(Stage::Translation, &AutosubError::Cancelled);
                continue;
            }

            info!(
                "Translating {} segments of {} to {}",
                item.segments.len(),
                item.input.path.display(),
                target
            );

            if let Err(e) = translate_segments(translator, &mut item.segments, target).await {
                let error = match e {
                    AutosubError::TranslationFailure(_) => e,
                    other => AutosubError::TranslationFailure(other.to_string()),
                };
                item.fail(Stage::Translation, &error);
            }
        }
    }

    async fn write_stage(&self, items: &mut [RunItem], scratch: &Path, names: &mut OutputNames) {
        let dir = if self.config.output_srt {
            self.config.output_dir.as_path()
        } else {
            scratch
        };

        for item in items.iter_mut().filter(|i| i.is_ok()) {
            let path = names.allocate(dir, &item.input.stem(), self.config.format.extension());

            match write_subtitles(&path, &item.segments, self.config.format).await {
                Ok(()) => {
                    if self.config.output_srt {
                        info!("Saved subtitles to {}", path.display());
                    }
                    item.subtitle = Some(path);
                }
                Err(e) => item.fail(Stage::Serialization, &e),
            }
        }
    }

    async fn mux_stage(&self, items: &mut [RunItem], names: &mut OutputNames) {
        for item in items.iter_mut().filter(|i| i.is_ok()) {
            if self.is_cancelled() {
                item.fail(Stage::Muxing, &AutosubError::Cancelled);
                continue;
            }

            if item.input.is_audio() {
                debug!("{} has no video track, skipping", item.input.path.display());
                continue;
            }

            let Some(subtitle) = item.subtitle.clone() else {
                continue;
            };

            info!("Adding subtitles to {}...", item.input.path.display());
            let output = video_output_path(&item.input.path, &self.config.output_dir, |path| {
                names.claim(path)
            });

            let result = self
                .transcoder
                .mux_subtitles(&item.input.path, &subtitle, &output.path, &self.config.style)
                .await;

            match result {
                Ok(()) => {
                    let shown = output
                        .path
                        .canonicalize()
                        .unwrap_or_else(|_| output.path.clone());
                    info!("Saved subtitled video to {}.", shown.display());
                    item.video = Some(output);
                }
                Err(e) => {
                    let error = match e {
                        AutosubError::MuxingFailure(_) => e,
                        other => AutosubError::MuxingFailure(other.to_string()),
                    };
                    item.fail(Stage::Muxing, &error);
                }
            }
        }
    }
}

/// Print a per-input status summary.
pub fn print_summary(run: &PipelineRun) {
    let ok = run.succeeded().count();
    let failed = run.failed().count();

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Subtitle Generation Complete              ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    for item in &run.items {
        match &item.failure {
            None => {
                println!(
                    "  {} {}",
                    style("✓").green().bold(),
                    item.input.path.display()
                );
                if let Some(ref subtitle) = item.subtitle {
                    if !run.is_scratch(subtitle) {
                        println!("      Subtitles: {}", subtitle.display());
                    }
                }
                if let Some(ref audio) = item.audio {
                    if !audio.scratch && audio.path != item.input.path {
                        println!("      Audio:     {}", audio.path.display());
                    }
                }
                if let Some(ref video) = item.video {
                    println!("      Video:     {}", video.path.display());
                }
                println!("      Segments:  {}", item.segments.len());
            }
            Some(failure) => {
                println!(
                    "  {} {}",
                    style("✗").red().bold(),
                    item.input.path.display()
                );
                println!(
                    "      {} failed: {}",
                    failure.stage,
                    style(&failure.message).red()
                );
            }
        }
    }

    println!();
    println!(
        "  {} succeeded, {} failed in {:.2}s",
        ok,
        failed,
        run.elapsed.as_secs_f64()
    );
    println!("═══════════════════════════════════════════════════════════════");
}
