//! # Error Handling
//!
//! Defines the error taxonomy shared by the control protocol, the synthesis
//! orchestrator and the stream processor.
//!
//! ## Propagation policy:
//! - **Protocol / Decode / EmptyText**: reject one control line, the stream keeps running
//! - **ModelNotFound / ModelLoad / Io**: abort the current job only
//! - **SynthesisFailed**: every retry attempt failed or produced no audio
//! - **Config**: startup problems, reported before any job runs
//!
//! Every variant renders a human-readable message; the stream processor
//! writes exactly that message after the `ERROR:` prefix.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which half of a voice model is missing from the model store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFileKind {
    /// The `L.onnx` weights file
    Weights,
    /// The `L.onnx.json` sidecar configuration
    Configuration,
}

impl fmt::Display for ModelFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFileKind::Weights => write!(f, "model"),
            ModelFileKind::Configuration => write!(f, "model configuration"),
        }
    }
}

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(TtsError::Protocol { line: line.to_string() });
/// ```
#[derive(Debug, Error)]
pub enum TtsError {
    /// Control line has more than one `|` separator
    #[error("malformed command (expected `<base64>[|<path>]`): {line}")]
    Protocol { line: String },

    /// Payload is not valid base64 or not valid UTF-8 once decoded
    #[error("failed to decode payload: {0}")]
    Decode(String),

    /// Payload decoded to nothing but whitespace
    #[error("decoded text is empty")]
    EmptyText,

    /// Weights or sidecar configuration is absent from the model store
    #[error("{kind} {} not found", .path.display())]
    ModelNotFound { path: PathBuf, kind: ModelFileKind },

    /// Files exist but the engine refused to load them
    #[error("failed to load voice model for '{language}': {reason}")]
    ModelLoad { language: String, reason: String },

    /// Placeholder or final WAV file could not be written
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// All attempts are exhausted or produced empty audio
    #[error("synthesis failed after {attempts} attempt(s): {reason}")]
    SynthesisFailed { attempts: u32, reason: String },

    /// Configuration file or environment variable problems
    #[error("configuration error: {0}")]
    Config(String),
}

impl TtsError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TtsError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading can fail for missing files, invalid syntax or
/// values that don't deserialize into `AppConfig`.
impl From<config::ConfigError> for TtsError {
    fn from(err: config::ConfigError) -> Self {
        TtsError::Config(err.to_string())
    }
}

/// Loose conversion for glue code that works with `anyhow`.
impl From<anyhow::Error> for TtsError {
    fn from(err: anyhow::Error) -> Self {
        TtsError::Config(format!("{:#}", err))
    }
}

/// Shorthand for `Result<T, TtsError>`.
pub type TtsResult<T> = Result<T, TtsError>;
