//! # Audio Module
//!
//! PCM accumulation and WAV framing for synthesized speech.
//!
//! ## Audio Format:
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers
//! - **Sample Rate**: whatever the loaded voice model reports

pub mod buffer;       // PCM payload collected from engine chunks
pub mod wav;          // RIFF/WAVE writer and header reader

pub use buffer::AudioBuffer;
pub use wav::{WavSpec, WavWriter};
