//! # Voice Model Cache
//!
//! Holds at most one loaded voice model, keyed by language tag. Loading a
//! model takes seconds, so the cache reloads only when the requested
//! language differs from the loaded one.
//!
//! ## State Transitions:
//! Empty → Loaded(L) → Loaded(L') (evict + load) → Empty (evict)

use super::engine::{VoiceEngine, VoiceModel};
use super::store::ModelStore;
use crate::error::{TtsError, TtsResult};
use std::time::Instant;
use tracing::info;

pub struct VoiceModelCache {
    store: ModelStore,
    engine: Box<dyn VoiceEngine>,
    current: Option<Box<dyn VoiceModel>>,
    loads: u64,
}

impl VoiceModelCache {
    pub fn new(store: ModelStore, engine: Box<dyn VoiceEngine>) -> Self {
        Self {
            store,
            engine,
            current: None,
            loads: 0,
        }
    }

    /// Language of the loaded model, if any.
    pub fn current_language(&self) -> Option<&str> {
        self.current.as_ref().map(|m| m.language())
    }

    /// How many times a model has been loaded over the cache's lifetime.
    #[cfg(test)]
    pub fn load_count(&self) -> u64 {
        self.loads
    }

    /// Return the model for `language`, loading it if needed.
    ///
    /// ## Errors:
    /// - `ModelNotFound` when weights or configuration is missing (checked
    ///   before the engine is asked to load anything)
    /// - `ModelLoad` when the engine rejects the files
    ///
    /// A failed load leaves the cache empty.
    pub fn ensure(&mut self, language: &str) -> TtsResult<&mut Box<dyn VoiceModel>> {
        if self.current_language() != Some(language) {
            self.evict();
            let model = self.load(language)?;
            return Ok(self.current.insert(model));
        }

        self.current.as_mut().ok_or_else(|| TtsError::ModelLoad {
            language: language.to_string(),
            reason: "model vanished from cache".to_string(),
        })
    }

    /// Drop the loaded model, freeing its resources.
    pub fn evict(&mut self) {
        if let Some(model) = self.current.take() {
            info!(language = model.language(), "unloading voice model");
        }
    }

    fn load(&mut self, language: &str) -> TtsResult<Box<dyn VoiceModel>> {
        let files = self.store.resolve(language)?;
        info!(language, weights = %files.weights.display(), "loading voice model");
        let start = Instant::now();

        let model = self
            .engine
            .load(language, &files.weights, &files.config)
            .map_err(|e| TtsError::ModelLoad {
                language: language.to_string(),
                reason: format!("{:#}", e),
            })?;

        self.loads += 1;
        info!(
            language,
            sample_rate = model.sample_rate(),
            loads = self.loads,
            "voice model loaded in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::testing::{model_dir, ScriptedEngine};

    #[test]
    fn test_reload_only_on_language_change() {
        let dir = model_dir(&["ru", "en"]);
        let engine = ScriptedEngine::default();
        let recorder = engine.recorder();
        let mut cache = VoiceModelCache::new(ModelStore::new(dir.path()), Box::new(engine));

        assert_eq!(cache.current_language(), None);
        cache.ensure("ru").unwrap();
        cache.ensure("ru").unwrap();
        assert_eq!(cache.load_count(), 1);
        assert_eq!(cache.current_language(), Some("ru"));

        cache.ensure("en").unwrap();
        assert_eq!(cache.load_count(), 2);
        assert_eq!(cache.current_language(), Some("en"));
        assert_eq!(recorder.loads(), vec!["ru".to_string(), "en".to_string()]);
    }

    #[test]
    fn test_missing_model_leaves_cache_empty() {
        let dir = model_dir(&["ru"]);
        let mut cache =
            VoiceModelCache::new(ModelStore::new(dir.path()), Box::new(ScriptedEngine::default()));
        cache.ensure("ru").unwrap();

        let Err(err) = cache.ensure("de") else {
            panic!("expected ModelNotFound for de");
        };
        assert!(matches!(err, TtsError::ModelNotFound { .. }));
        assert_eq!(cache.current_language(), None);
    }

    #[test]
    fn test_engine_load_failure_is_model_load() {
        let dir = model_dir(&["ru"]);
        let engine = ScriptedEngine::default().failing_load("corrupt weights");
        let mut cache = VoiceModelCache::new(ModelStore::new(dir.path()), Box::new(engine));

        let Err(err) = cache.ensure("ru") else {
            panic!("expected the engine load to fail");
        };
        match err {
            TtsError::ModelLoad { language, reason } => {
                assert_eq!(language, "ru");
                assert!(reason.contains("corrupt weights"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cache.load_count(), 0);
    }

    #[test]
    fn test_evict() {
        let dir = model_dir(&["ru"]);
        let mut cache =
            VoiceModelCache::new(ModelStore::new(dir.path()), Box::new(ScriptedEngine::default()));
        cache.ensure("ru").unwrap();
        cache.evict();
        assert_eq!(cache.current_language(), None);
        cache.ensure("ru").unwrap();
        assert_eq!(cache.load_count(), 2);
    }
}
