//! Append-only translation caches.
//! Key: normalized (trimmed, lower-cased) word. No eviction, no TTL: the key
//! space is the words one user looks up in one session.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{normalize_word, VocabDetail};

pub struct TranslationCache<V> {
    inner: Mutex<HashMap<String, V>>,
}

impl<V: Clone> TranslationCache<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the cache from a persisted snapshot.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, V)>) -> Self {
        let cache = Self::new();
        {
            let mut map = cache.inner.lock();
            for (key, value) in entries {
                map.insert(normalize_word(&key), value);
            }
        }
        cache
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().get(&normalize_word(key)).cloned()
    }

    /// Insert a value. Values are immutable once computed: an existing entry
    /// is kept and `false` is returned.
    pub fn insert(&self, key: &str, value: V) -> bool {
        let mut map = self.inner.lock();
        let key = normalize_word(key);
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full copy of the current contents, for persistence.
    pub fn snapshot(&self) -> HashMap<String, V> {
        self.inner.lock().clone()
    }
}

impl<V: Clone> Default for TranslationCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The simple (word → translation) and detail (word → record) caches of one
/// execution context. Instances never share state.
#[derive(Default)]
pub struct LookupCaches {
    pub simple: TranslationCache<String>,
    pub detail: TranslationCache<VocabDetail>,
}

impl LookupCaches {
    pub fn new() -> Self {
        Self::default()
    }
}
