//! # Synthesis Module
//!
//! Everything between "text in a language" and "a WAV file on disk".
//!
//! ## Components:
//! - **engine**: the `VoiceEngine` / `VoiceModel` seam over the synthesizer
//! - **piper**: production engine backed by the `piper` executable
//! - **store**: `L.onnx` + `L.onnx.json` lookup in the models directory
//! - **cache**: single loaded model, reloaded on language change
//! - **retry**: attempt limit and cool-down
//! - **orchestrator**: one job, from placeholder to final file

pub mod cache;
pub mod engine;
pub mod orchestrator;
pub mod piper;
pub mod retry;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::VoiceModelCache;
pub use orchestrator::{OutputNaming, SynthesisOrchestrator, SynthesisOutcome};
pub use piper::PiperEngine;
pub use retry::RetryPolicy;
pub use store::ModelStore;
