//! # Control Protocol
//!
//! One control line is one of:
//!
//! ```text
//! <base64(utf8(text))>[|<destination path>]
//! exit
//! ```
//!
//! Whitespace inside the base64 payload is stripped before decoding, so
//! payloads wrapped at 76 columns still decode. The `exit` token is matched
//! case-insensitively after trimming.

use crate::error::{TtsError, TtsResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::PathBuf;

const SEPARATOR: char = '|';
const EXIT_TOKEN: &str = "exit";

/// One decoded synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub text: String,
    /// `None` means the processor picks a name
    pub destination: Option<PathBuf>,
}

/// Classification of one raw control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLine {
    Blank,
    Exit,
    Job(Job),
}

impl ControlLine {
    /// Classify `line`; only job lines can fail.
    pub fn parse(line: &str) -> TtsResult<Self> {
        let line = line.trim();
        if line.is_empty() {
            Ok(ControlLine::Blank)
        } else if line.eq_ignore_ascii_case(EXIT_TOKEN) {
            Ok(ControlLine::Exit)
        } else {
            JobDecoder::decode_line(line).map(ControlLine::Job)
        }
    }
}

pub struct JobDecoder;

impl JobDecoder {
    /// Parse `payload[|path]` into a `Job`.
    ///
    /// ## Errors:
    /// - `Protocol` when the line has two or more separators
    /// - `Decode` when the payload is not base64 or not UTF-8
    /// - `EmptyText` when the text is only whitespace
    pub fn decode_line(line: &str) -> TtsResult<Job> {
        let line = line.trim();
        let mut parts = line.split(SEPARATOR);
        let payload = parts.next().unwrap_or_default();
        let destination = parts.next();
        if parts.next().is_some() {
            return Err(TtsError::Protocol {
                line: line.to_string(),
            });
        }

        let text = Self::decode_payload(payload)?;
        let destination = destination
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);

        Ok(Job { text, destination })
    }

    /// Decode a base64 payload into trimmed, non-empty UTF-8 text.
    pub fn decode_payload(payload: &str) -> TtsResult<String> {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| TtsError::Decode(format!("invalid base64: {}", e)))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| TtsError::Decode(format!("payload is not UTF-8: {}", e)))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(TtsError::EmptyText);
        }
        Ok(text.to_string())
    }
}
