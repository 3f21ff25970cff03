use anyhow::{Context, Result};
use autosub::audio::{check_ffmpeg, check_ffprobe};
use autosub::config::{AudioFormat, Config, OutputFormat};
use autosub::diagnostics;
use autosub::transcoder::FfmpegTranscoder;
use autosub::transcribe::{Task, TranscribeOptions, WhisperClient};
use autosub::translate::{DeepLTranslator, Translator};
use autosub::{print_summary, resolve_inputs, Pipeline, PipelineConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Parser)]
#[command(name = "autosub")]
#[command(version, about = "Batch subtitle generation for audio and video files")]
#[command(
    long_about = "Transcribe audio and video files with OpenAI Whisper, optionally translate the \
                  subtitles with DeepL, and burn them into the video with FFmpeg."
)]
struct Cli {
    /// Input files or wildcard patterns
    #[arg(required = true)]
    paths: Vec<String>,

    /// Directory for every persisted output
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Keep the subtitle file
    #[arg(short = 's', long)]
    output_srt: bool,

    /// Keep the extracted audio
    #[arg(short = 'a', long)]
    output_audio: bool,

    /// Burn subtitles into a copy of each video
    #[arg(short = 'v', long)]
    output_video: bool,

    /// Subtitle format: srt, vtt
    #[arg(long, default_value = "srt")]
    format: String,

    /// Format of kept audio: mp3, wav
    #[arg(long, default_value = "mp3")]
    audio_format: String,

    /// transcribe (spoken language) or translate (to English)
    #[arg(long, default_value = "transcribe")]
    task: String,

    /// Spoken language code (e.g., en, ja, es); detected when omitted
    #[arg(short, long)]
    language: Option<String>,

    /// Speech model name
    #[arg(short, long)]
    model: Option<String>,

    /// Condition each audio window on the text decoded before it
    #[arg(long)]
    enhance_consistency: bool,

    /// Translate subtitles to this language (e.g., de, fr, zh)
    #[arg(long)]
    translate_to: Option<String>,

    /// Concurrent audio extraction processes
    #[arg(long)]
    extract_workers: Option<usize>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "autosub=debug" } else { "autosub=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(filter_fn(diagnostics::allows));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let paths = resolve_inputs(&cli.paths);
    if paths.is_empty() {
        eprintln!("No input files matched: {}", cli.paths.join(" "));
        std::process::exit(1);
    }
    if paths.len() > 1 {
        println!("Processing {} files:", paths.len());
        for (i, path) in paths.iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
    }

    let format: OutputFormat = cli.format.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let audio_format: AudioFormat = cli
        .audio_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let task: Task = cli.task.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(ref model) = cli.model {
        config.whisper_model = model.clone();
    }
    if let Some(workers) = cli.extract_workers {
        config.extract_workers = workers;
    }
    config
        .validate(cli.translate_to.is_some())
        .context("Configuration validation failed")?;

    let mut language = cli.language.clone();
    if config.whisper_model.ends_with(".en") && language.as_deref() != Some("en") {
        warn!(
            "{} is an English-only model, forcing English detection.",
            config.whisper_model
        );
        language = Some("en".to_string());
    }

    // Nothing to keep means nothing to show; fall back to the subtitle file.
    let output_srt = cli.output_srt || !cli.output_video;

    check_ffmpeg(&config.ffmpeg_path).await?;
    check_ffprobe(&config.ffprobe_path).await?;

    let api_key = config
        .openai_api_key
        .clone()
        .context("OpenAI API key is not configured")?;
    let engine = WhisperClient::new(api_key)
        .with_model(config.whisper_model.clone())
        .with_windowing(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
            Duration::from_secs(config.window_secs),
        )
        .with_condition_window(Duration::from_secs(config.condition_window_secs));
    let transcoder = FfmpegTranscoder::from_config(&config);
    let translator: Option<Arc<dyn Translator>> = match (&cli.translate_to, &config.deepl_auth_key)
    {
        (Some(_), Some(key)) => Some(Arc::new(DeepLTranslator::new(key.clone()))),
        _ => None,
    };

    info!("Model:    {}", config.whisper_model);
    info!("Task:     {}", task);
    info!("Output:   {}", cli.output_dir.display());
    info!("Workers:  {}", config.extract_workers);
    if let Some(ref target) = cli.translate_to {
        info!("Translate to: {}", target);
    }

    let pipeline_config = PipelineConfig {
        output_dir: cli.output_dir,
        output_srt,
        output_audio: cli.output_audio,
        output_video: cli.output_video,
        format,
        audio_format,
        transcribe: TranscribeOptions {
            task,
            language,
            condition_on_previous_text: cli.enhance_consistency,
        },
        translate_to: cli.translate_to,
        extract_workers: config.extract_workers,
        show_progress: !cli.no_progress,
        ..Default::default()
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nInterrupted, finishing the current step...");
            cancelled.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let pipeline = Pipeline::new(
        pipeline_config,
        Arc::new(transcoder),
        Arc::new(engine),
        translator,
    )
    .with_cancel_flag(cancelled);

    let run = pipeline.run(paths).await?;
    print_summary(&run);

    Ok(())
}
