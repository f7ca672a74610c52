//! Runtime settings: provider endpoints from the environment, note-service
//! settings and the enable flag from the durable store.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use crate::error::{AppendError, StorageError};
use crate::storage::KvStore;

pub const ENABLE_KEY: &str = "enableExtension";
pub const API_KEY_KEY: &str = "obsidianApiKey";
pub const API_BASE_KEY: &str = "obsidianApiBase";
pub const NOTE_PATH_KEY: &str = "obsidianNotePath";

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:27124";
pub const DEFAULT_NOTE_PATH: &str = "Vocab-2.md";
pub const DEFAULT_GOOGLE_BASE: &str = "https://translate.googleapis.com";
pub const DEFAULT_LIBRE_BASE: &str = "https://libretranslate.de";

/// Process-level settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub google_base: String,
    pub libre_base: String,
    pub http_timeout: Duration,
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            google_base: DEFAULT_GOOGLE_BASE.into(),
            libre_base: DEFAULT_LIBRE_BASE.into(),
            http_timeout: Duration::from_secs(10),
            db_path: PathBuf::from("vocab-lens.db"),
        }
    }
}

impl Settings {
    /// Defaults overridden by `VOCAB_LENS_GOOGLE_BASE`, `VOCAB_LENS_LIBRE_BASE`
    /// and `VOCAB_LENS_DB`.
    pub fn from_env() -> Self {
        let mut s = Self::default();
        if let Ok(v) = std::env::var("VOCAB_LENS_GOOGLE_BASE") {
            s.google_base = v;
        }
        if let Ok(v) = std::env::var("VOCAB_LENS_LIBRE_BASE") {
            s.libre_base = v;
        }
        if let Ok(v) = std::env::var("VOCAB_LENS_DB") {
            s.db_path = PathBuf::from(v);
        }
        s
    }
}

/// Note-service settings as edited on the options form.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub note_path: String,
}

impl Default for NoteSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.into(),
            note_path: DEFAULT_NOTE_PATH.into(),
        }
    }
}

impl NoteSettings {
    pub fn load(store: &dyn KvStore) -> Result<Self, StorageError> {
        Ok(Self {
            api_key: store.get_string(API_KEY_KEY)?,
            api_base: store
                .get_string(API_BASE_KEY)?
                .unwrap_or_else(|| DEFAULT_API_BASE.into()),
            note_path: store
                .get_string(NOTE_PATH_KEY)?
                .unwrap_or_else(|| DEFAULT_NOTE_PATH.into()),
        })
    }

    /// Same checks, same order, same messages as the options form.
    pub fn validate(&self) -> Result<(), AppendError> {
        if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(AppendError::ConfigurationMissing("Please enter an API key".into()));
        }
        if self.api_base.trim().is_empty() {
            return Err(AppendError::ConfigurationMissing(
                "Please enter an API base URL".into(),
            ));
        }
        if self.note_path.trim().is_empty() {
            return Err(AppendError::ConfigurationMissing("Please enter a note path".into()));
        }
        Ok(())
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<(), AppendError> {
        self.validate()?;
        let write = |key: &str, value: &str| {
            store.set(key, json!(value.trim())).map_err(|e| {
                warn!(key, error = %e, "settings write failed");
                AppendError::ConfigurationMissing(format!("could not save settings: {e}"))
            })
        };
        write(API_KEY_KEY, self.api_key.as_deref().unwrap_or_default())?;
        write(API_BASE_KEY, &self.api_base)?;
        write(NOTE_PATH_KEY, &self.note_path)
    }
}

/// Persisted enable flag, `true` when never set.
pub fn load_enabled(store: &dyn KvStore) -> bool {
    store.get_bool(ENABLE_KEY, true).unwrap_or_else(|e| {
        warn!(error = %e, "enable flag unreadable, defaulting to enabled");
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn note_settings_defaults() {
        let store = MemoryStore::new();
        let s = NoteSettings::load(&store).unwrap();
        assert_eq!(s, NoteSettings::default());
        assert!(matches!(s.validate(), Err(AppendError::ConfigurationMissing(m)) if m == "Please enter an API key"));
    }

    #[test]
    fn save_then_load() {
        let store = MemoryStore::new();
        let s = NoteSettings {
            api_key: Some(" key ".into()),
            api_base: "http://localhost:1234".into(),
            note_path: "Words.md".into(),
        };
        s.save(&store).unwrap();
        let loaded = NoteSettings::load(&store).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("key"));
        assert_eq!(loaded.note_path, "Words.md");
    }

    #[test]
    fn save_rejects_blank_note_path() {
        let store = MemoryStore::new();
        let s = NoteSettings {
            api_key: Some("k".into()),
            note_path: " ".into(),
            ..Default::default()
        };
        assert!(matches!(s.save(&store), Err(AppendError::ConfigurationMissing(m)) if m == "Please enter a note path"));
    }

    #[test]
    fn enabled_by_default() {
        let store = MemoryStore::new();
        assert!(load_enabled(&store));
        store.set(ENABLE_KEY, json!(false)).unwrap();
        assert!(!load_enabled(&store));
    }
}
