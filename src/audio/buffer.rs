//! # Audio Buffer Management
//!
//! Accumulates the raw 16-bit little-endian mono PCM produced by the voice
//! engine for one job. Chunks are appended in the order the engine yields
//! them; nothing is resampled or re-encoded on the way to the WAV file.
//!
//! An empty buffer after the engine's chunk sequence is exhausted is a
//! synthesis failure, never a valid "silent" result.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Bytes per 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Growing PCM payload for one synthesis attempt.
#[derive(Debug, Default, Clone)]
pub struct AudioBuffer {
    /// Raw sample bytes, exactly as the engine produced them
    bytes: Vec<u8>,

    /// Number of chunks appended so far
    chunks: usize,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one engine chunk of raw PCM bytes.
    pub fn append_chunk(&mut self, pcm: &[u8]) {
        self.bytes.extend_from_slice(pcm);
        self.chunks += 1;
    }

    /// Discard everything collected by a failed attempt.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.chunks = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Number of complete 16-bit samples in the payload.
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_SAMPLE
    }

    /// Duration of the payload at the given sample rate (mono).
    ///
    /// ## Calculation:
    /// Duration = number_of_samples / sample_rate
    pub fn duration_seconds(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.sample_count() as f64 / sample_rate as f64
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the payload into signed samples; a trailing odd byte is ignored.
    pub fn samples(&self) -> Vec<i16> {
        let mut cursor = Cursor::new(&self.bytes);
        let mut samples = Vec::with_capacity(self.sample_count());
        while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
            samples.push(sample);
        }
        samples
    }

    /// Largest absolute sample value, 0 for an empty buffer.
    pub fn peak(&self) -> u16 {
        self.samples()
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}
