//! # WAV Container Emission
//!
//! Writes canonical 44-byte-header RIFF/WAVE files for PCM audio. Tests read
//! the header back with `WavInfo`.
//!
//! ## Layout (all integers little-endian):
//! ```text
//! "RIFF" <36 + data_size:u32> "WAVE"
//! "fmt " <16:u32> <1:u16 PCM> <channels:u16> <sample_rate:u32>
//!        <byte_rate:u32> <block_align:u16> <bits_per_sample:u16>
//! "data" <data_size:u32> <samples...>
//! ```
//!
//! Writing twice to the same path (placeholder first, final audio second)
//! truncates the file, so the second write fully replaces the first.

use crate::error::{TtsError, TtsResult};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(test)]
use byteorder::ReadBytesExt;
#[cfg(test)]
use std::io::{BufReader, Read, Seek, SeekFrom};

/// PCM format code in the `fmt ` chunk.
pub const WAVE_FORMAT_PCM: u16 = 1;

/// Size of the header that precedes the sample data.
#[cfg(test)]
pub const HEADER_LEN: u64 = 44;

/// Sample format of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// Mono 16-bit PCM, the only format the voice engine produces.
    pub fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// sample_rate × channels × bytes_per_sample
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bytes_per_sample() as u32
    }

    /// channels × bytes_per_sample
    pub fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }
}

/// Serializes PCM buffers into WAV files.
pub struct WavWriter;

impl WavWriter {
    /// Write `pcm` to `path` as a complete WAV file, creating parent
    /// directories on demand and replacing any existing file.
    pub fn write(path: &Path, pcm: &[u8], spec: WavSpec) -> TtsResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TtsError::io(parent, e))?;
        }

        let file = File::create(path).map_err(|e| TtsError::io(path, e))?;
        let mut out = BufWriter::new(file);
        Self::encode(&mut out, pcm, spec)
            .and_then(|_| out.flush())
            .map_err(|e| TtsError::io(path, e))?;

        tracing::debug!(
            path = %path.display(),
            data_bytes = pcm.len(),
            sample_rate = spec.sample_rate,
            "wrote WAV file"
        );
        Ok(())
    }

    /// Write a well-formed WAV with zero audio frames.
    pub fn write_placeholder(path: &Path, sample_rate: u32) -> TtsResult<()> {
        Self::write(path, &[], WavSpec::mono16(sample_rate))
    }

    /// Encode header and samples into any writer.
    pub fn encode<W: Write>(out: &mut W, pcm: &[u8], spec: WavSpec) -> io::Result<()> {
        let data_size = u32::try_from(pcm.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "PCM payload exceeds 4 GiB")
        })?;
        let riff_size = data_size.checked_add(36).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "PCM payload exceeds 4 GiB")
        })?;

        out.write_all(b"RIFF")?;
        out.write_u32::<LittleEndian>(riff_size)?;
        out.write_all(b"WAVE")?;

        out.write_all(b"fmt ")?;
        out.write_u32::<LittleEndian>(16)?;
        out.write_u16::<LittleEndian>(WAVE_FORMAT_PCM)?;
        out.write_u16::<LittleEndian>(spec.channels)?;
        out.write_u32::<LittleEndian>(spec.sample_rate)?;
        out.write_u32::<LittleEndian>(spec.byte_rate())?;
        out.write_u16::<LittleEndian>(spec.block_align())?;
        out.write_u16::<LittleEndian>(spec.bits_per_sample)?;

        out.write_all(b"data")?;
        out.write_u32::<LittleEndian>(data_size)?;
        out.write_all(pcm)?;
        Ok(())
    }
}

/// Header facts recovered from an existing WAV file.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavInfo {
    pub spec: WavSpec,
    pub audio_format: u16,
    pub riff_size: u32,
    pub data_size: u32,
}

#[cfg(test)]
impl WavInfo {
    pub fn read_from_path(path: &Path) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader)
    }

    /// Parse the RIFF header, skipping any chunk that is not `fmt ` or `data`.
    pub fn read<R: Read + Seek>(reader: &mut R) -> io::Result<Self> {
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag)?;
        if &tag != b"RIFF" {
            return Err(invalid("missing RIFF tag"));
        }
        let riff_size = reader.read_u32::<LittleEndian>()?;
        reader.read_exact(&mut tag)?;
        if &tag != b"WAVE" {
            return Err(invalid("missing WAVE tag"));
        }

        let mut fmt: Option<(u16, WavSpec)> = None;
        loop {
            reader.read_exact(&mut tag)?;
            let size = reader.read_u32::<LittleEndian>()?;
            match &tag {
                b"fmt " => {
                    let audio_format = reader.read_u16::<LittleEndian>()?;
                    let channels = reader.read_u16::<LittleEndian>()?;
                    let sample_rate = reader.read_u32::<LittleEndian>()?;
                    let _byte_rate = reader.read_u32::<LittleEndian>()?;
                    let _block_align = reader.read_u16::<LittleEndian>()?;
                    let bits_per_sample = reader.read_u16::<LittleEndian>()?;
                    if size > 16 {
                        reader.seek(SeekFrom::Current(i64::from(size - 16)))?;
                    }
                    fmt = Some((
                        audio_format,
                        WavSpec {
                            sample_rate,
                            channels,
                            bits_per_sample,
                        },
                    ));
                }
                b"data" => {
                    let (audio_format, spec) = fmt.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
                    return Ok(Self {
                        spec,
                        audio_format,
                        riff_size,
                        data_size: size,
                    });
                }
                _ => {
                    reader.seek(SeekFrom::Current(i64::from(size) + i64::from(size & 1)))?;
                }
            }
        }
    }

    /// Number of sample frames in the data chunk.
    pub fn frame_count(&self) -> u32 {
        match self.spec.block_align() {
            0 => 0,
            align => self.data_size / align as u32,
        }
    }

    /// True for a placeholder file: valid framing, no audio.
    pub fn is_empty(&self) -> bool {
        self.data_size == 0
    }
}

#[cfg(test)]
fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
