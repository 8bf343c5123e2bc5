//! # Synthesis Orchestrator
//!
//! Drives the voice engine for one job, from model selection to the final
//! WAV file.
//!
//! ## Job Steps:
//! 1. **Model**: reuse the cached model or load the one for the job's language
//! 2. **Destination**: caller's path, or an auto-generated name
//! 3. **Placeholder**: write a valid zero-sample WAV before synthesis starts,
//!    so anyone polling for the file sees a well-formed (silent) file
//! 4. **Attempts**: drain the engine's chunk stream up to `max_attempts` times,
//!    with engine-side diagnostics muted for the duration of each attempt
//! 5. **Final file**: rewrite the destination with the real audio at the
//!    model's own sample rate
//!
//! A failed job leaves the placeholder in place. Its empty data chunk is how
//! callers tell "attempted and failed" apart from a successful file.

use super::cache::VoiceModelCache;
use super::engine::VoiceModel;
use super::retry::RetryPolicy;
use crate::audio::{AudioBuffer, WavSpec, WavWriter};
use crate::error::{TtsError, TtsResult};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::subscriber::NoSubscriber;
use tracing::{debug, info, warn};

/// How destinations without an explicit path are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// `output_<language>.wav` (single-shot use)
    PerLanguage,
    /// `output_<epoch-millis>.wav` (stream use)
    Timestamped,
}

/// Resolves job destinations against an optional output directory.
#[derive(Debug, Clone)]
pub struct OutputNaming {
    dir: Option<PathBuf>,
    scheme: NamingScheme,
    last_stamp: i64,
}

impl OutputNaming {
    /// Names relative to the current directory, one file per language.
    pub fn single_shot() -> Self {
        Self::new(None, NamingScheme::PerLanguage)
    }

    /// Timestamped names inside `dir` (current directory when `None`).
    pub fn stream(dir: Option<PathBuf>) -> Self {
        Self::new(dir, NamingScheme::Timestamped)
    }

    pub fn new(dir: Option<PathBuf>, scheme: NamingScheme) -> Self {
        Self {
            dir,
            scheme,
            last_stamp: 0,
        }
    }

    /// Final path for a job. Relative paths are placed under the output
    /// directory when one is set; absolute paths are kept as they are.
    pub fn resolve(&mut self, requested: Option<&Path>, language: &str) -> PathBuf {
        match requested {
            Some(path) => self.anchor(path),
            None => {
                let name = match self.scheme {
                    NamingScheme::PerLanguage => format!("output_{}.wav", language),
                    NamingScheme::Timestamped => format!("output_{}.wav", self.next_stamp()),
                };
                self.anchor(Path::new(&name))
            }
        }
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) if !path.is_absolute() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Current epoch milliseconds, bumped so no two calls share a stamp.
    fn next_stamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let stamp = if now <= self.last_stamp {
            self.last_stamp + 1
        } else {
            now
        };
        self.last_stamp = stamp;
        stamp
    }
}

/// Facts about a successfully written file.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    pub path: PathBuf,
    pub data_bytes: usize,
    pub sample_rate: u32,
    pub attempts: u32,
    pub audio_seconds: f64,
}

pub struct SynthesisOrchestrator {
    cache: VoiceModelCache,
    retry: RetryPolicy,
    naming: OutputNaming,
    placeholder_sample_rate: u32,
}

impl SynthesisOrchestrator {
    pub fn new(
        cache: VoiceModelCache,
        retry: RetryPolicy,
        naming: OutputNaming,
        placeholder_sample_rate: u32,
    ) -> Self {
        Self {
            cache,
            retry,
            naming,
            placeholder_sample_rate,
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &VoiceModelCache {
        &self.cache
    }

    /// Synthesize `text` in `language` into a WAV file.
    ///
    /// ## Returns:
    /// - **Ok(SynthesisOutcome)**: the file holds the full audio
    /// - **Err(ModelNotFound | ModelLoad)**: nothing was written
    /// - **Err(Io)**: the placeholder or final file could not be written
    /// - **Err(SynthesisFailed)**: the placeholder stays, with zero frames
    pub fn synthesize(
        &mut self,
        text: &str,
        language: &str,
        destination: Option<&Path>,
    ) -> TtsResult<SynthesisOutcome> {
        let started = Instant::now();
        let model = self.cache.ensure(language)?;
        let path = self.naming.resolve(destination, language);

        info!(path = %path.display(), language, chars = text.chars().count(), "synthesizing");
        WavWriter::write_placeholder(&path, self.placeholder_sample_rate)?;

        let mut buffer = AudioBuffer::new();
        let mut attempt = 0;
        let mut last_error = String::from("engine produced no audio");

        loop {
            attempt += 1;
            buffer.clear();
            debug!(attempt, max_attempts = self.retry.max_attempts(), "synthesis attempt");

            let result = tracing::subscriber::with_default(NoSubscriber::default(), || {
                drain(model.as_mut(), text, &mut buffer)
            });

            match result {
                Ok(()) if !buffer.is_empty() => {
                    debug!(
                        attempt,
                        chunks = buffer.chunk_count(),
                        bytes = buffer.len(),
                        peak = buffer.peak(),
                        "processed audio chunks"
                    );
                    break;
                }
                Ok(()) => {
                    last_error = String::from("engine produced no audio");
                    warn!(attempt, "synthesis attempt produced no audio");
                }
                Err(e) => {
                    last_error = format!("{:#}", e);
                    warn!(attempt, error = %last_error, "synthesis attempt failed");
                }
            }

            if !self.retry.should_retry(attempt) {
                warn!(attempts = attempt, path = %path.display(), "all synthesis attempts exhausted");
                return Err(TtsError::SynthesisFailed {
                    attempts: attempt,
                    reason: last_error,
                });
            }
            self.retry.wait();
        }

        let sample_rate = model.sample_rate();
        WavWriter::write(&path, buffer.as_bytes(), WavSpec::mono16(sample_rate))?;

        let outcome = SynthesisOutcome {
            audio_seconds: buffer.duration_seconds(sample_rate),
            data_bytes: buffer.len(),
            path,
            sample_rate,
            attempts: attempt,
        };
        info!(
            path = %outcome.path.display(),
            bytes = outcome.data_bytes,
            attempts = outcome.attempts,
            "{:.2}s of audio in {}ms",
            outcome.audio_seconds,
            started.elapsed().as_millis()
        );
        Ok(outcome)
    }
}

/// Consume one chunk stream to the end, or up to its first error.
fn drain(model: &mut dyn VoiceModel, text: &str, buffer: &mut AudioBuffer) -> anyhow::Result<()> {
    for chunk in model.synthesize(text)? {
        buffer.append_chunk(&chunk?.pcm);
    }
    Ok(())
}
