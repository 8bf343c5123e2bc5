//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration file (tts.toml)
//! - Environment variables (with TTS_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Command-line flags (applied by `main` after loading)
//! 2. Environment variables (TTS_MODELS__DIR, TTS_SYNTHESIS__MAX_ATTEMPTS, etc.)
//! 3. Configuration file (tts.toml)
//! 4. Default values (defined in the Default impl)

use crate::error::{TtsError, TtsResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    pub engine: EngineConfig,
    pub synthesis: SynthesisConfig,
    pub stream: StreamConfig,
}

/// Where voice models live and which one is used when `-l` is omitted.
///
/// ## Fields:
/// - `dir`: directory holding `L.onnx` + `L.onnx.json` pairs
/// - `default_language`: language tag used without an explicit `-l`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    pub default_language: String,
}

/// Settings for the external `piper` synthesizer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Binary name or path; bare names are looked up on PATH
    pub piper_bin: String,
    /// Read size for one PCM chunk from the engine's output
    pub chunk_bytes: usize,
}

/// Retry and placeholder behaviour of a single synthesis job.
///
/// ## Fields:
/// - `max_attempts`: how many times a failing synthesis is tried (3 in production)
/// - `retry_cooldown_ms`: fixed pause between two attempts, no backoff
/// - `placeholder_sample_rate`: sample rate written into the empty WAV created
///   before synthesis starts; the final file always uses the model's own rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    pub max_attempts: u32,
    pub retry_cooldown_ms: u64,
    pub placeholder_sample_rate: u32,
}

/// Stream-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Directory for auto-named outputs and base for relative job paths
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Upper bound on waiting for the worker after the control channel closes
    pub shutdown_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                dir: PathBuf::from("models"),
                default_language: "ru".to_string(),
            },
            engine: EngineConfig {
                piper_bin: "piper".to_string(),
                chunk_bytes: 4096,
            },
            synthesis: SynthesisConfig {
                max_attempts: 3,
                retry_cooldown_ms: 200,
                placeholder_sample_rate: 22050,
            },
            stream: StreamConfig {
                output_dir: None,
                shutdown_timeout_secs: 5,
            },
        }
    }
}

impl SynthesisConfig {
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }
}

impl StreamConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from tts.toml (if it exists)
    /// 3. Override with environment variables prefixed with TTS_
    ///
    /// ## Environment Variable Examples:
    /// - `TTS_MODELS__DIR=/opt/voices`: Override the models directory
    /// - `TTS_SYNTHESIS__MAX_ATTEMPTS=5`: Override the retry limit
    /// - `TTS_STREAM__OUTPUT_DIR=/tmp/speech`: Default stream output directory
    pub fn load() -> TtsResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("tts").required(false))
            .add_source(
                config::Environment::with_prefix("TTS")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - At least one synthesis attempt is allowed
    /// - Engine chunks and placeholder sample rate are non-zero
    /// - The models directory is named
    pub fn validate(&self) -> TtsResult<()> {
        if self.synthesis.max_attempts == 0 {
            return Err(TtsError::Config("synthesis.max_attempts must be greater than 0".to_string()));
        }

        if self.synthesis.placeholder_sample_rate == 0 {
            return Err(TtsError::Config("synthesis.placeholder_sample_rate cannot be 0".to_string()));
        }

        if self.engine.chunk_bytes == 0 {
            return Err(TtsError::Config("engine.chunk_bytes must be greater than 0".to_string()));
        }

        if self.models.dir.as_os_str().is_empty() {
            return Err(TtsError::Config("models.dir must not be empty".to_string()));
        }

        if self.models.default_language.trim().is_empty() {
            return Err(TtsError::Config("models.default_language must not be empty".to_string()));
        }

        Ok(())
    }

    /// Render the effective configuration as TOML (for `--print-config`).
    pub fn to_toml(&self) -> TtsResult<String> {
        toml::to_string_pretty(self).map_err(|e| TtsError::Config(e.to_string()))
    }
}
