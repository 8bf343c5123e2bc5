//! # Text Input Module
//!
//! Turns raw bytes from stdin or the control channel into text.
//!
//! ## Key Components:
//! - **Encoding Detector**: BOM sniffing, UTF-16 heuristic, Cyrillic code page scoring
//! - **Input Text**: BOM stripping and "characters lost upstream" detection

pub mod encoding;     // Which encoding produced these bytes
pub mod input;        // Post-processing of decoded stdin text

pub use encoding::{DetectedEncoding, EncodingDetector};
pub use input::{InputDiagnostic, InputText};
