//! Process-resident translation client: cache → provider chain → persist.
//! The simple cache is restored from durable storage once at startup and the
//! full snapshot is flushed after every new resolved translation.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::cache::LookupCaches;
use super::{prepare_query, ProviderChain, TranslationResult, VocabDetail};
use crate::error::{StorageError, TranslateError};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::storage::{KvStore, TRANSLATION_CACHE_KEY};

pub struct TranslationService {
    caches: LookupCaches,
    chain: ProviderChain,
    store: Arc<dyn KvStore>,
    metrics: Arc<MetricsRegistry>,
    /// Held across snapshot and write so flushes land in order.
    flush: AsyncMutex<()>,
}

impl TranslationService {
    /// Build the service, seeding the simple cache from `translationCache`.
    pub fn restore(
        chain: ProviderChain,
        store: Arc<dyn KvStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let caches = LookupCaches::new();
        match store.get(TRANSLATION_CACHE_KEY) {
            Ok(Some(Value::Object(map))) => {
                for (word, value) in map {
                    if let Value::String(text) = value {
                        caches.simple.insert(&word, text);
                    }
                }
                info!(entries = caches.simple.len(), "translation cache restored");
            }
            Ok(Some(other)) => {
                warn!(kind = ?other, "persisted translation cache has unexpected shape, ignoring");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to load translation cache"),
        }
        Self {
            caches,
            chain,
            store,
            metrics,
            flush: AsyncMutex::new(()),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.caches.simple.len()
    }

    pub async fn translate(&self, word: &str) -> Result<TranslationResult, TranslateError> {
        let Some(clean) = prepare_query(word)? else {
            return Ok(TranslationResult::miss(word.trim()));
        };

        if let Some(hit) = self.caches.simple.get(&clean) {
            self.metrics.incr(metric_names::CACHE_HIT);
            debug!(word = %clean, "process cache hit");
            return Ok(TranslationResult::found(clean, hit));
        }
        self.metrics.incr(metric_names::CACHE_MISS);

        let span = self.metrics.span(metric_names::PROVIDER_TRANSLATE);
        let translated = self.chain.translate(&clean).await;
        span.finish();

        match translated {
            Some(text) => {
                if self.caches.simple.insert(&clean, text.clone()) {
                    self.persist().await;
                }
                Ok(TranslationResult::found(clean, text))
            }
            None => Ok(TranslationResult::miss(clean)),
        }
    }

    /// Best effort: `None` on any unrecoverable failure.
    pub async fn translate_detailed(&self, word: &str) -> Option<VocabDetail> {
        let clean = match prepare_query(word) {
            Ok(Some(clean)) => clean,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "detail lookup rejected");
                return None;
            }
        };

        if let Some(hit) = self.caches.detail.get(&clean) {
            self.metrics.incr(metric_names::CACHE_HIT);
            return Some(hit);
        }

        let span = self.metrics.span(metric_names::PROVIDER_DETAIL);
        let detail = self.chain.lookup_detail(&clean).await;
        span.finish();

        if let Some(detail) = &detail {
            self.caches.detail.insert(&clean, detail.clone());
            if !detail.translation.is_empty() && self.caches.simple.insert(&clean, detail.translation.clone()) {
                self.persist().await;
            }
        }
        detail
    }

    /// Write the full simple-cache snapshot. The snapshot is taken under the
    /// flush lock, so every write is a superset of the one before it.
    async fn persist(&self) {
        let _flush = self.flush.lock().await;
        let snapshot: HashMap<String, String> = self.caches.simple.snapshot();
        let entries = snapshot.len();
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let value = serde_json::to_value(snapshot)?;
            store.set(TRANSLATION_CACHE_KEY, value)
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(entries, "translation cache persisted"),
            Ok(Err(e)) => warn!(error = %e, "failed to persist translation cache"),
            Err(e) => warn!(error = %e, "cache persist task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::translate::testing::ScriptedTranslator;
    use serde_json::json;

    fn service(provider: Arc<ScriptedTranslator>, store: Arc<MemoryStore>) -> TranslationService {
        TranslationService::restore(
            ProviderChain::new(vec![provider as Arc<dyn crate::translate::Translator>]),
            store,
            Arc::new(MetricsRegistry::new()),
        )
    }

    #[tokio::test]
    async fn short_words_never_reach_providers() {
        let provider = Arc::new(ScriptedTranslator::with(&[("a", "一")]));
        let svc = service(provider.clone(), Arc::new(MemoryStore::new()));

        let result = svc.translate(" A ").await.unwrap();
        assert_eq!(result.translated_text, None);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let provider = Arc::new(ScriptedTranslator::with(&[("cat", "猫")]));
        let svc = service(provider.clone(), Arc::new(MemoryStore::new()));

        let first = svc.translate("Cat").await.unwrap();
        let second = svc.translate("cat ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.translated_text.as_deref(), Some("猫"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn resolved_translations_are_persisted_and_restored() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedTranslator::with(&[("cat", "猫"), ("dog", "狗")]));
        let svc = service(provider, store.clone());
        svc.translate("cat").await.unwrap();
        svc.translate("dog").await.unwrap();

        assert_eq!(
            store.get(TRANSLATION_CACHE_KEY).unwrap(),
            Some(json!({"cat": "猫", "dog": "狗"}))
        );

        let offline = Arc::new(ScriptedTranslator::default());
        let restored = service(offline.clone(), store);
        assert_eq!(restored.cached_entries(), 2);
        let hit = restored.translate("dog").await.unwrap();
        assert_eq!(hit.translated_text.as_deref(), Some("狗"));
        assert_eq!(offline.calls(), 0);
    }

    /// Slow to write small snapshots, fast for larger ones.
    struct LaggingStore {
        inner: MemoryStore,
    }

    impl KvStore for LaggingStore {
        fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
            if value.as_object().is_some_and(|m| m.len() == 1) {
                std::thread::sleep(std::time::Duration::from_millis(300));
            }
            self.inner.set(key, value)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn later_flush_is_never_overwritten_by_an_earlier_one() {
        let store = Arc::new(LaggingStore {
            inner: MemoryStore::new(),
        });
        let provider = Arc::new(ScriptedTranslator::with(&[("cat", "猫"), ("dog", "狗")]));
        let svc = TranslationService::restore(
            ProviderChain::new(vec![provider as Arc<dyn crate::translate::Translator>]),
            store.clone(),
            Arc::new(MetricsRegistry::new()),
        );

        let (cat, dog) = tokio::join!(svc.translate("cat"), svc.translate("dog"));
        assert!(cat.is_ok() && dog.is_ok());
        assert_eq!(svc.cached_entries(), 2);
        assert_eq!(
            store.get(TRANSLATION_CACHE_KEY).unwrap(),
            Some(json!({"cat": "猫", "dog": "狗"}))
        );
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedTranslator::default());
        let svc = service(provider.clone(), store.clone());
        assert_eq!(svc.translate("zzz").await.unwrap().translated_text, None);
        assert_eq!(svc.translate("zzz").await.unwrap().translated_text, None);
        assert_eq!(provider.calls(), 2);
        assert_eq!(store.get(TRANSLATION_CACHE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_request_is_flagged() {
        let svc = service(Arc::new(ScriptedTranslator::default()), Arc::new(MemoryStore::new()));
        let long = "y".repeat(2000);
        assert!(matches!(svc.translate(&long).await, Err(TranslateError::InvalidInput(_))));
        assert_eq!(svc.translate_detailed(&long).await, None);
    }

    #[tokio::test]
    async fn detail_is_cached_per_word() {
        let mut scripted = ScriptedTranslator::default();
        scripted.details.insert(
            "cat".into(),
            VocabDetail {
                word: "cat".into(),
                translation: "猫".into(),
                ..Default::default()
            },
        );
        let provider = Arc::new(scripted);
        let svc = service(provider.clone(), Arc::new(MemoryStore::new()));

        assert!(svc.translate_detailed("cat").await.is_some());
        assert!(svc.translate_detailed("CAT").await.is_some());
        assert_eq!(provider.detail_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        // the detail's translation also feeds the simple cache
        assert_eq!(svc.translate("cat").await.unwrap().translated_text.as_deref(), Some("猫"));
        assert_eq!(provider.calls(), 0);
    }
}
