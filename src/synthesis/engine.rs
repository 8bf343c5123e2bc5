//! # Voice Engine Seam
//!
//! The speech synthesizer itself is an opaque collaborator. This module pins
//! down the capability the rest of the crate relies on:
//!
//! - `VoiceEngine::load(weights, config)` produces a `VoiceModel`
//! - `VoiceModel::synthesize(text)` produces a lazy, finite, non-restartable
//!   sequence of PCM chunks that may fail mid-iteration
//!
//! ## Thread Safety:
//! Models are `Send` but deliberately not `Sync`: a model is moved onto the
//! single synthesis worker and never shared between concurrent callers.

use anyhow::Result;
use std::path::Path;

/// One piece of engine output: raw little-endian 16-bit mono PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub pcm: Vec<u8>,
}

impl AudioChunk {
    pub fn new(pcm: Vec<u8>) -> Self {
        Self { pcm }
    }

    #[cfg(test)]
    pub fn from_samples(samples: &[i16]) -> Self {
        Self {
            pcm: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        }
    }
}

/// Lazy chunk sequence borrowed from a model for the duration of one attempt.
pub type ChunkStream<'a> = Box<dyn Iterator<Item = Result<AudioChunk>> + 'a>;

/// A loaded synthesis model for one language/voice.
pub trait VoiceModel: Send {
    /// Language tag the model was loaded for
    fn language(&self) -> &str;

    /// Engine-reported sample rate; authoritative for WAV framing
    fn sample_rate(&self) -> u32;

    /// Start synthesizing `text`. Errors may surface here or from any
    /// item of the returned stream.
    fn synthesize(&mut self, text: &str) -> Result<ChunkStream<'_>>;
}

/// Loads voice models from weight and configuration files.
pub trait VoiceEngine: Send {
    fn load(&self, language: &str, weights: &Path, config: &Path) -> Result<Box<dyn VoiceModel>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_from_samples_is_little_endian() {
        let chunk = AudioChunk::from_samples(&[1, -1, 256]);
        assert_eq!(chunk.pcm, vec![0x01, 0x00, 0xFF, 0xFF, 0x00, 0x01]);
    }
}
