//! Configuration loading and validation.
//!
//! TOML file with per-section defaults, plus a small set of environment
//! overrides for deployment.

use crate::defaults;
use crate::error::{Result, SpeechgateError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub segmenter: SegmenterConfig,
    pub backend: BackendConfig,
    pub server: ServerConfig,
}

/// Audio frame format and classification configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    pub vad_threshold: f32,
}

/// Segment boundary policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Silence duration before the buffered utterance is flushed.
    pub silence_threshold_ms: u32,
    /// Maximum chunk duration before a mid-utterance flush. Zero disables.
    pub chunk_duration_ms: u32,
    /// Maximum chunk size in bytes before a mid-utterance flush. Zero disables.
    pub chunk_size_bytes: usize,
}

/// Transcription backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

/// Producer-facing server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
            vad_threshold: defaults::VAD_THRESHOLD,
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: defaults::SILENCE_THRESHOLD_MS,
            chunk_duration_ms: defaults::CHUNK_DURATION_MS,
            chunk_size_bytes: 0,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:9000/asr".to_string(),
            request_timeout_ms: defaults::BACKEND_TIMEOUT_MS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: defaults::LISTEN_ADDR.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpeechgateError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                SpeechgateError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it doesn't exist.
    ///
    /// Invalid TOML still returns an error; only a missing file falls back.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(SpeechgateError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - SPEECHGATE_BACKEND_URL → backend.endpoint
    /// - SPEECHGATE_LISTEN_ADDR → server.listen_addr
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("SPEECHGATE_BACKEND_URL") {
            if !endpoint.is_empty() {
                self.backend.endpoint = endpoint;
            }
        }

        if let Ok(addr) = std::env::var("SPEECHGATE_LISTEN_ADDR") {
            if !addr.is_empty() {
                self.server.listen_addr = addr;
            }
        }

        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(SpeechgateError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        if self.audio.frame_duration_ms == 0 {
            return Err(SpeechgateError::ConfigInvalidValue {
                key: "audio.frame_duration_ms".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        if self.segmenter.silence_threshold_ms < self.audio.frame_duration_ms {
            return Err(SpeechgateError::ConfigInvalidValue {
                key: "segmenter.silence_threshold_ms".to_string(),
                message: "must be at least one frame duration".to_string(),
            });
        }
        if self.segmenter.chunk_duration_ms == 0 && self.segmenter.chunk_size_bytes == 0 {
            return Err(SpeechgateError::ConfigInvalidValue {
                key: "segmenter.chunk_duration_ms".to_string(),
                message: "at least one chunking criterion must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.frame_duration_ms, 30);
        assert_eq!(config.segmenter.silence_threshold_ms, 1000);
        assert_eq!(config.segmenter.chunk_duration_ms, 3000);
        assert_eq!(config.segmenter.chunk_size_bytes, 0);
        assert_eq!(config.backend.request_timeout_ms, 10_000);
        assert_eq!(config.server.listen_addr, "127.0.0.1:8765");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [audio]
            sample_rate = 8000
            frame_duration_ms = 20

            [segmenter]
            silence_threshold_ms = 600
            chunk_size_bytes = 32000

            [backend]
            endpoint = "ws://asr.example.com/se"
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 8000);
        assert_eq!(config.audio.frame_duration_ms, 20);
        assert_eq!(config.segmenter.silence_threshold_ms, 600);
        assert_eq!(config.segmenter.chunk_size_bytes, 32000);
        assert_eq!(config.backend.endpoint, "ws://asr.example.com/se");
        // Unspecified fields keep defaults
        assert_eq!(config.audio.vad_threshold, 0.02);
    }

    #[test]
    fn test_load_missing_file_returns_not_found() {
        let result = Config::load(Path::new("/nonexistent/speechgate.toml"));
        assert!(matches!(
            result,
            Err(SpeechgateError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_or_default_falls_back_for_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/speechgate.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_still_rejects_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not = valid toml =").unwrap();

        let result = Config::load_or_default(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_frame_duration() {
        let mut config = Config::default();
        config.audio.frame_duration_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(SpeechgateError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_silence_threshold_below_one_frame() {
        let mut config = Config::default();
        config.segmenter.silence_threshold_ms = 10; // below 30ms frame
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_no_chunking_criterion() {
        let mut config = Config::default();
        config.segmenter.chunk_duration_ms = 0;
        config.segmenter.chunk_size_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_size_only_chunking() {
        let mut config = Config::default();
        config.segmenter.chunk_duration_ms = 0;
        config.segmenter.chunk_size_bytes = 48_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_backend_url() {
        std::env::set_var("SPEECHGATE_BACKEND_URL", "ws://override:1234/asr");
        let config = Config::default().with_env_overrides();
        std::env::remove_var("SPEECHGATE_BACKEND_URL");

        assert_eq!(config.backend.endpoint, "ws://override:1234/asr");
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        std::env::set_var("SPEECHGATE_LISTEN_ADDR", "");
        let config = Config::default().with_env_overrides();
        std::env::remove_var("SPEECHGATE_LISTEN_ADDR");

        assert_eq!(config.server.listen_addr, defaults::LISTEN_ADDR);
    }
}
