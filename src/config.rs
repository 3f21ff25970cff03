use crate::error::{AutosubError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the DeepL API key.
pub const DEEPL_AUTH_KEY_VAR: &str = "DEEPL_AUTH_KEY";

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Srt,
    Vtt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "srt" => Ok(OutputFormat::Srt),
            "vtt" => Ok(OutputFormat::Vtt),
            _ => Err(format!("Unknown format: {}. Use 'srt' or 'vtt'", s)),
        }
    }
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
        }
    }
}

/// Container used for extracted audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(format!("Unknown audio format: {}. Use 'mp3' or 'wav'", s)),
        }
    }
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    /// FFmpeg codec arguments for this container.
    pub fn codec_args(&self) -> &'static [&'static str] {
        match self {
            AudioFormat::Mp3 => &["-acodec", "libmp3lame", "-q:a", "4"],
            AudioFormat::Wav => &["-acodec", "pcm_s16le"],
        }
    }
}

/// Half the available cores, never less than one.
pub fn default_extract_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(1))
        .unwrap_or(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub deepl_auth_key: Option<String>,
    pub whisper_model: String,
    pub extract_workers: usize,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub transcoder_timeout_secs: Option<u64>,
    pub window_secs: u64,
    /// Window length when consistency conditioning is on.
    pub condition_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            deepl_auth_key: None,
            whisper_model: "whisper-1".to_string(),
            extract_workers: default_extract_workers(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            transcoder_timeout_secs: None,
            window_secs: 600,
            condition_window_secs: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents)?;
            }
        }

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override fields from environment-style lookups.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var(OPENAI_API_KEY_VAR).filter(|k| !k.is_empty()) {
            self.openai_api_key = Some(key);
        }
        if let Some(key) = var(DEEPL_AUTH_KEY_VAR).filter(|k| !k.is_empty()) {
            self.deepl_auth_key = Some(key);
        }
        if let Some(workers) = var("AUTOSUB_EXTRACT_WORKERS").and_then(|w| w.parse().ok()) {
            self.extract_workers = workers;
        }
        if let Some(path) = var("AUTOSUB_FFMPEG") {
            self.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(path) = var("AUTOSUB_FFPROBE") {
            self.ffprobe_path = PathBuf::from(path);
        }
        if let Some(secs) = var("AUTOSUB_TRANSCODER_TIMEOUT").and_then(|s| s.parse().ok()) {
            self.transcoder_timeout_secs = Some(secs);
        }
    }

    /// Check the preconditions that must hold before any engine is called.
    pub fn validate(&self, needs_translation: bool) -> Result<()> {
        if self.openai_api_key.is_none() {
            return Err(AutosubError::Config(format!(
                "{} not set. Export it with: export {}=sk-...",
                OPENAI_API_KEY_VAR, OPENAI_API_KEY_VAR
            )));
        }

        if needs_translation && self.deepl_auth_key.is_none() {
            return Err(AutosubError::MissingCredential(format!(
                "DeepL auth key not found in environment variable {}",
                DEEPL_AUTH_KEY_VAR
            )));
        }

        if self.extract_workers == 0 {
            return Err(AutosubError::Config(
                "Extract workers must be greater than 0".to_string(),
            ));
        }

        if self.window_secs == 0 || self.condition_window_secs == 0 {
            return Err(AutosubError::Config(
                "Window length must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("autosub").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_key() -> Config {
        Config {
            openai_api_key: Some("sk-test".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("srt".parse::<OutputFormat>().unwrap(), OutputFormat::Srt);
        assert_eq!("VTT".parse::<OutputFormat>().unwrap(), OutputFormat::Vtt);
        assert!("json".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_audio_format_parsing() {
        assert_eq!("mp3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!("WAV".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert!("ogg".parse::<AudioFormat>().is_err());
        assert_eq!(AudioFormat::Wav.codec_args(), &["-acodec", "pcm_s16le"]);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.extract_workers >= 1);
        assert_eq!(config.whisper_model, "whisper-1");
        assert_eq!(config.window_secs, 600);
        assert_eq!(config.condition_window_secs, 30);
        assert!(config.transcoder_timeout_secs.is_none());
    }

    #[test]
    fn test_validate_missing_openai_key() {
        let config = Config::default();
        assert!(matches!(
            config.validate(false),
            Err(AutosubError::Config(_))
        ));
    }

    #[test]
    fn test_validate_missing_deepl_key() {
        let config = with_key();
        assert!(config.validate(false).is_ok());
        assert!(matches!(
            config.validate(true),
            Err(AutosubError::MissingCredential(_))
        ));

        let config = Config {
            deepl_auth_key: Some("key:fx".to_string()),
            ..with_key()
        };
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_validate_zero_workers() {
        let config = Config {
            extract_workers: 0,
            ..with_key()
        };
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_validate_zero_condition_window() {
        let config = Config {
            condition_window_secs: 0,
            ..with_key()
        };
        assert!(matches!(config.validate(false), Err(AutosubError::Config(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DEEPL_AUTH_KEY", "abc:fx"),
            ("AUTOSUB_EXTRACT_WORKERS", "3"),
            ("AUTOSUB_FFMPEG", "/opt/ffmpeg"),
            ("AUTOSUB_TRANSCODER_TIMEOUT", "90"),
            ("OPENAI_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.deepl_auth_key.as_deref(), Some("abc:fx"));
        assert_eq!(config.extract_workers, 3);
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.transcoder_timeout_secs, Some(90));
        // Empty values do not count as credentials
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_parse_partial_config_file() {
        let config: Config =
            toml::from_str("extract_workers = 2\nwindow_secs = 300\ncondition_window_secs = 20\n")
                .unwrap();
        assert_eq!(config.extract_workers, 2);
        assert_eq!(config.window_secs, 300);
        assert_eq!(config.condition_window_secs, 20);
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
    }
}
