//! Read-through translation lookup.
//!
//! A cached value is returned as is. On a miss (or when the cache cannot be
//! read) the engines are tried in registry order until one answers; that
//! answer is written back and returned. When every engine fails the caller
//! gets the original word back and an error event goes to the notifier.

use crate::cache::CacheStore;
use crate::engines::EngineRegistry;
use crate::invoker::EngineInvoker;
use crate::notifier::NotifierHandle;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A normalized (word, target language) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub word: String,
    pub language: String,
}

impl TranslationRequest {
    /// Trim and lowercase both parts; `None` if either ends up empty
    pub fn normalize(word: &str, language: &str) -> Option<Self> {
        let word = word.trim().to_lowercase();
        let language = language.trim().to_lowercase();
        if word.is_empty() || language.is_empty() {
            return None;
        }
        Some(Self { word, language })
    }
}

pub struct Resolver {
    store: Arc<dyn CacheStore>,
    invoker: Arc<dyn EngineInvoker>,
    engines: Arc<EngineRegistry>,
    notifier: NotifierHandle,
}

impl Resolver {
    pub fn new(
        store: Arc<dyn CacheStore>,
        invoker: Arc<dyn EngineInvoker>,
        engines: Arc<EngineRegistry>,
        notifier: NotifierHandle,
    ) -> Self {
        Self {
            store,
            invoker,
            engines,
            notifier,
        }
    }

    /// Translation for an already normalized request. Never fails: the worst
    /// case answer is the word itself.
    pub async fn resolve(&self, request: &TranslationRequest) -> String {
        match self.store.get(&request.language, &request.word).await {
            Ok(Some(cached)) => {
                debug!("Cache hit for '{}' ({})", request.word, request.language);
                return cached;
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Cache read failed for '{}' ({}), treating as miss: {}",
                request.word, request.language, e
            ),
        }

        self.fetch(request).await
    }

    async fn fetch(&self, request: &TranslationRequest) -> String {
        let engines = self.engines.snapshot();

        for engine in engines.iter() {
            match self
                .invoker
                .invoke(&request.word, &request.language, engine)
                .await
            {
                Ok(translation) => {
                    if let Err(e) = self
                        .store
                        .set(&request.language, &request.word, &translation)
                        .await
                    {
                        warn!(
                            "Failed to cache translation of '{}' ({}): {}",
                            request.word, request.language, e
                        );
                    }
                    return translation;
                }
                Err(e) => warn!(
                    "Engine {} failed for '{}' ({}): {}",
                    engine, request.word, request.language, e
                ),
            }
        }

        error!(
            "Failed to translate '{}' (to {}) in all {} engines",
            request.word,
            request.language,
            engines.len()
        );
        self.notifier.error(format!(
            "{} (to {}) failed to translate in all engines",
            request.word, request.language
        ));

        request.word.clone()
    }
}
