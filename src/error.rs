use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutosubError {
    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Audio extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailure(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Translation failed: {0}")]
    TranslationFailure(String),

    #[error("Adding subtitles to video failed: {0}")]
    MuxingFailure(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid subtitle at line {line}: {message}")]
    SubtitleParse { line: usize, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AutosubError>;
