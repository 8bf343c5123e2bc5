//! Scripted stand-in for the voice engine, used by the unit tests.

use super::engine::{AudioChunk, ChunkStream, VoiceEngine, VoiceModel};
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// What one `synthesize` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Yield `chunks` chunks of `samples` samples each
    Ok,
    /// Fail before the first chunk
    FailAtStart,
    /// Yield one chunk, then fail
    FailMidStream,
    /// Finish without yielding any audio
    Empty,
    Panic,
    /// Block the calling thread for the duration, then behave like `Ok`
    Slow(Duration),
}

#[derive(Debug, Default)]
struct RecorderState {
    loads: Vec<String>,
    texts: Vec<String>,
}

/// Read side of what the engine observed.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<RecorderState>>);

impl Recorder {
    pub fn loads(&self) -> Vec<String> {
        self.0.lock().unwrap().loads.clone()
    }

    pub fn synth_calls(&self) -> usize {
        self.0.lock().unwrap().texts.len()
    }
}

#[derive(Clone)]
pub struct ScriptedEngine {
    sample_rate: u32,
    chunks: usize,
    samples: usize,
    script: Arc<Mutex<VecDeque<Behavior>>>,
    fallback: Behavior,
    load_error: Option<String>,
    recorder: Recorder,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            chunks: 3,
            samples: 100,
            script: Arc::default(),
            fallback: Behavior::Ok,
            load_error: None,
            recorder: Recorder::default(),
        }
    }
}

impl ScriptedEngine {
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Play `script` call by call, then behave like `fallback`.
    pub fn scripted(mut self, script: &[Behavior], fallback: Behavior) -> Self {
        self.script = Arc::new(Mutex::new(script.iter().copied().collect()));
        self.fallback = fallback;
        self
    }

    pub fn always(self, behavior: Behavior) -> Self {
        self.scripted(&[], behavior)
    }

    pub fn failing_load(mut self, reason: &str) -> Self {
        self.load_error = Some(reason.to_string());
        self
    }

    /// Bytes of audio one successful call produces.
    pub fn output_len(&self) -> usize {
        self.chunks * self.samples * 2
    }
}

impl VoiceEngine for ScriptedEngine {
    fn load(&self, language: &str, weights: &Path, config: &Path) -> Result<Box<dyn VoiceModel>> {
        if let Some(reason) = &self.load_error {
            return Err(anyhow!("{}", reason));
        }
        assert!(weights.is_file() && config.is_file());
        self.recorder.0.lock().unwrap().loads.push(language.to_string());
        Ok(Box::new(ScriptedModel {
            language: language.to_string(),
            engine: self.clone(),
        }))
    }
}

struct ScriptedModel {
    language: String,
    engine: ScriptedEngine,
}

impl VoiceModel for ScriptedModel {
    fn language(&self) -> &str {
        &self.language
    }

    fn sample_rate(&self) -> u32 {
        self.engine.sample_rate
    }

    fn synthesize(&mut self, text: &str) -> Result<ChunkStream<'_>> {
        self.engine.recorder.0.lock().unwrap().texts.push(text.to_string());
        let behavior = self
            .engine
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.engine.fallback);
        // Real engines log on their own; the orchestrator must keep this quiet.
        tracing::warn!(language = %self.language, "scripted engine diagnostic");

        let chunk = AudioChunk::from_samples(&vec![1000i16; self.engine.samples]);
        if let Behavior::Slow(delay) = behavior {
            std::thread::sleep(delay);
        }
        match behavior {
            Behavior::Ok | Behavior::Slow(_) => Ok(Box::new(
                std::iter::repeat(chunk)
                    .take(self.engine.chunks)
                    .map(Ok::<AudioChunk, anyhow::Error>),
            )),
            Behavior::FailAtStart => Err(anyhow!("engine refused to start")),
            Behavior::FailMidStream => Ok(Box::new(
                vec![Ok(chunk), Err(anyhow!("onnx runtime error mid-stream"))]
                    .into_iter(),
            )),
            Behavior::Empty => Ok(Box::new(std::iter::empty::<Result<AudioChunk>>())),
            Behavior::Panic => panic!("engine crashed"),
        }
    }
}

/// Temporary models directory with both files for every language.
pub fn model_dir(languages: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for language in languages {
        fs::write(dir.path().join(format!("{}.onnx", language)), b"weights").unwrap();
        fs::write(
            dir.path().join(format!("{}.onnx.json", language)),
            br#"{"audio":{"sample_rate":16000}}"#,
        )
        .unwrap();
    }
    dir
}
