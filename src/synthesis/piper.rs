//! # Piper Voice Engine
//!
//! Runs the `piper` command-line synthesizer as a child process per
//! synthesis call:
//!
//! ```text
//! piper --model L.onnx --config L.onnx.json --output-raw
//! ```
//!
//! ## Process Protocol:
//! - The text goes to the child's stdin as a single line, then stdin is closed
//! - Raw 16-bit mono PCM is read from stdout in `chunk_bytes` pieces
//! - The child's stderr is discarded; its exit status is checked once stdout
//!   reaches EOF, so a crash surfaces as an error from the chunk stream
//!
//! The sample rate comes from the sidecar's `audio.sample_rate`.

use super::engine::{AudioChunk, ChunkStream, VoiceEngine, VoiceModel};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct VoiceSidecar {
    audio: SidecarAudio,
}

#[derive(Debug, Deserialize)]
struct SidecarAudio {
    sample_rate: u32,
}

/// Read the sample rate out of a voice's `.onnx.json` sidecar.
pub fn read_sample_rate(config: &Path) -> Result<u32> {
    let raw = fs::read_to_string(config)
        .with_context(|| format!("reading {}", config.display()))?;
    let sidecar: VoiceSidecar = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", config.display()))?;
    if sidecar.audio.sample_rate == 0 {
        return Err(anyhow!("{}: audio.sample_rate is 0", config.display()));
    }
    Ok(sidecar.audio.sample_rate)
}

pub struct PiperEngine {
    binary: String,
    chunk_bytes: usize,
}

impl PiperEngine {
    pub fn new(binary: impl Into<String>, chunk_bytes: usize) -> Self {
        Self {
            binary: binary.into(),
            chunk_bytes: chunk_bytes.max(2),
        }
    }
}

impl VoiceEngine for PiperEngine {
    fn load(&self, language: &str, weights: &Path, config: &Path) -> Result<Box<dyn VoiceModel>> {
        let binary = which::which(&self.binary)
            .with_context(|| format!("piper executable `{}` not found", self.binary))?;
        let sample_rate = read_sample_rate(config)?;
        debug!(binary = %binary.display(), sample_rate, "piper voice ready");

        Ok(Box::new(PiperVoice {
            language: language.to_string(),
            binary,
            weights: weights.to_path_buf(),
            config: config.to_path_buf(),
            sample_rate,
            chunk_bytes: self.chunk_bytes,
        }))
    }
}

struct PiperVoice {
    language: String,
    binary: PathBuf,
    weights: PathBuf,
    config: PathBuf,
    sample_rate: u32,
    chunk_bytes: usize,
}

impl VoiceModel for PiperVoice {
    fn language(&self) -> &str {
        &self.language
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(&mut self, text: &str) -> Result<ChunkStream<'_>> {
        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.weights)
            .arg("--config")
            .arg(&self.config)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning {}", self.binary.display()))?;

        // Piper treats every input line as an utterance.
        let line = text.replace(['\r', '\n'], " ");
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin
                .write_all(line.as_bytes())
                .and_then(|_| stdin.write_all(b"\n")),
            None => Err(ErrorKind::BrokenPipe.into()),
        };

        match (child.stdout.take(), written) {
            (Some(stdout), Ok(())) => Ok(Box::new(PiperOutput {
                child,
                stdout,
                chunk_bytes: self.chunk_bytes,
                finished: false,
            })),
            (stdout, written) => {
                drop(stdout);
                let _ = child.kill();
                let _ = child.wait();
                Err(match written {
                    Err(e) => anyhow::Error::from(e).context("writing text to piper"),
                    Ok(()) => anyhow!("piper stdout unavailable"),
                })
            }
        }
    }
}

/// Chunk reader over one running piper process.
struct PiperOutput {
    child: Child,
    stdout: ChildStdout,
    chunk_bytes: usize,
    finished: bool,
}

impl PiperOutput {
    fn fill(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl Iterator for PiperOutput {
    type Item = Result<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buf = vec![0u8; self.chunk_bytes];
        match self.fill(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                buf.truncate(n);
                return Some(Ok(AudioChunk::new(buf)));
            }
            Err(e) => {
                self.finished = true;
                return Some(Err(anyhow::Error::from(e).context("reading piper output")));
            }
        }

        self.finished = true;
        match self.child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(anyhow!("piper exited with {}", status))),
            Err(e) => Some(Err(anyhow::Error::from(e).context("waiting for piper"))),
        }
    }
}

impl Drop for PiperOutput {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_sidecar(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("ru.onnx.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_sidecar_sample_rate() {
        let dir = tempdir().unwrap();
        let path = write_sidecar(
            dir.path(),
            r#"{"audio":{"sample_rate":22050,"quality":"medium"},"espeak":{"voice":"ru"}}"#,
        );
        assert_eq!(read_sample_rate(&path).unwrap(), 22050);
    }

    #[test]
    fn test_sidecar_without_rate_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_sidecar(dir.path(), r#"{"audio":{}}"#);
        assert!(read_sample_rate(&path).is_err());

        let path = write_sidecar(dir.path(), "not json");
        assert!(read_sample_rate(&path).is_err());
    }

    #[test]
    fn test_missing_binary_fails_load() {
        let dir = tempdir().unwrap();
        let config = write_sidecar(dir.path(), r#"{"audio":{"sample_rate":22050}}"#);
        let engine = PiperEngine::new("definitely-not-a-piper-binary-3f9a", 4096);
        let err = engine
            .load("ru", &dir.path().join("ru.onnx"), &config)
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("not found"));
    }

    #[cfg(unix)]
    fn fake_piper(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("piper");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn fake_voice(dir: &Path, body: &str, chunk_bytes: usize) -> Box<dyn VoiceModel> {
        let binary = fake_piper(dir, body);
        let config = write_sidecar(dir, r#"{"audio":{"sample_rate":16000}}"#);
        fs::write(dir.join("ru.onnx"), b"weights").unwrap();
        PiperEngine::new(binary.to_string_lossy(), chunk_bytes)
            .load("ru", &dir.join("ru.onnx"), &config)
            .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_streams_stdout_in_chunks() {
        let dir = tempdir().unwrap();
        let mut voice = fake_voice(dir.path(), "cat > /dev/null\nprintf 'abcdefghij'", 4);
        assert_eq!(voice.sample_rate(), 16000);

        let chunks: Vec<AudioChunk> = voice
            .synthesize("привет")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.pcm.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        let pcm: Vec<u8> = chunks.into_iter().flat_map(|c| c.pcm).collect();
        assert_eq!(pcm, b"abcdefghij".to_vec());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_surfaces_as_stream_error() {
        let dir = tempdir().unwrap();
        let mut voice = fake_voice(dir.path(), "cat > /dev/null\nprintf 'ab'\nexit 3", 4096);

        let items: Vec<Result<AudioChunk>> = voice.synthesize("text").unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
