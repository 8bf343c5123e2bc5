//! # Model Store
//!
//! A directory of voice models. Each language tag `L` is exactly two files:
//!
//! - `L.onnx`: model weights
//! - `L.onnx.json`: sidecar configuration
//!
//! A language is available only when both files are present.

use crate::error::{ModelFileKind, TtsError, TtsResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const WEIGHTS_EXT: &str = "onnx";
const CONFIG_SUFFIX: &str = ".onnx.json";

/// Paths for one language's model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub language: String,
    pub weights: PathBuf,
    pub config: PathBuf,
}

/// Read-only view over the models directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Expected file paths for `language`, whether or not they exist.
    pub fn files_for(&self, language: &str) -> ModelFiles {
        ModelFiles {
            language: language.to_string(),
            weights: self.dir.join(format!("{}.{}", language, WEIGHTS_EXT)),
            config: self.dir.join(format!("{}{}", language, CONFIG_SUFFIX)),
        }
    }

    /// Resolve `language` to existing files.
    ///
    /// ## Errors:
    /// `ModelNotFound` naming the weights file if it is missing, otherwise
    /// naming the configuration file if that one is missing.
    pub fn resolve(&self, language: &str) -> TtsResult<ModelFiles> {
        let files = self.files_for(language);
        if !files.weights.is_file() {
            return Err(TtsError::ModelNotFound {
                path: files.weights,
                kind: ModelFileKind::Weights,
            });
        }
        if !files.config.is_file() {
            return Err(TtsError::ModelNotFound {
                path: files.config,
                kind: ModelFileKind::Configuration,
            });
        }
        Ok(files)
    }

    /// Sorted language tags that have both weights and configuration.
    ///
    /// A missing models directory lists as empty.
    pub fn list_languages(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut languages = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(WEIGHTS_EXT) || !path.is_file() {
                continue;
            }
            let Some(language) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if self.files_for(language).config.is_file() {
                languages.push(language.to_string());
            }
        }
        languages.sort();
        Ok(languages)
    }
}
