//! Translation provider client: result types, the provider trait, input
//! normalization, and the fallback chain shared by both execution contexts.

pub mod cache;
pub mod google;
pub mod libre;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TranslateError;

/// Inputs shorter than this (in chars, after normalization) are a deliberate no-op.
pub const MIN_WORD_CHARS: usize = 2;
/// Longer inputs are rejected as malformed requests.
pub const MAX_QUERY_CHARS: usize = 1000;

/// Outcome of a simple lookup. `translated_text == None` means "no translation
/// found", which is distinct from a transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub source_word: String,
    pub translated_text: Option<String>,
}

impl TranslationResult {
    pub fn miss(source_word: impl Into<String>) -> Self {
        Self {
            source_word: source_word.into(),
            translated_text: None,
        }
    }

    pub fn found(source_word: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_word: source_word.into(),
            translated_text: Some(text.into()),
        }
    }
}

/// Meanings of the word grouped by part of speech.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definition {
    pub pos: String,
    pub meanings: Vec<String>,
    pub definition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynonymGroup {
    pub pos: String,
    pub words: Vec<String>,
}

/// Rich lexical record for the detail popup. Missing data degrades to empty
/// fields, never to an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabDetail {
    pub word: String,
    pub translation: String,
    pub phonetic: String,
    pub definitions: Vec<Definition>,
    pub examples: Vec<String>,
    pub synonyms: Vec<SynonymGroup>,
    pub alternatives: Vec<String>,
}

/// Cache key / query form of a selection: trimmed and lower-cased.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Normalizes `word` and classifies it. `Ok(None)` for inputs too short to
/// translate, `Err` for malformed requests.
pub fn prepare_query(word: &str) -> Result<Option<String>, TranslateError> {
    let clean = normalize_word(word);
    let chars = clean.chars().count();
    if chars < MIN_WORD_CHARS {
        return Ok(None);
    }
    if chars > MAX_QUERY_CHARS {
        return Err(TranslateError::InvalidInput(format!(
            "query of {chars} chars exceeds {MAX_QUERY_CHARS}"
        )));
    }
    if clean.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return Err(TranslateError::InvalidInput(
            "query contains control characters".into(),
        ));
    }
    Ok(Some(clean))
}

/// A remote translation service (adapter for different backends).
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Translate an already-normalized word. `Ok(None)` when the provider
    /// answered but had nothing usable.
    async fn translate(&self, word: &str) -> Result<Option<String>, TranslateError>;

    /// Expanded lexical lookup. Providers without one return `Ok(None)`.
    async fn lookup_detail(&self, word: &str) -> Result<Option<VocabDetail>, TranslateError> {
        let _ = word;
        Ok(None)
    }
}

/// Ordered list of providers: each failure is logged and swallowed, and only
/// exhaustion of every provider yields a miss.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Translator>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn Translator>>) -> Self {
        Self { providers }
    }

    /// Provider A (nested-array endpoint) with Provider B as fallback.
    pub fn from_settings(settings: &crate::config::Settings) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(settings.http_timeout)
            .build()?;
        Ok(Self::new(vec![
            Arc::new(google::GoogleTranslator::new(http.clone(), &settings.google_base)),
            Arc::new(libre::LibreTranslator::new(http, &settings.libre_base)),
        ]))
    }

    pub async fn translate(&self, word: &str) -> Option<String> {
        for provider in &self.providers {
            match provider.translate(word).await {
                Ok(Some(text)) => {
                    debug!(provider = provider.name(), word, "provider translated");
                    return Some(text);
                }
                Ok(None) => {
                    warn!(provider = provider.name(), word, "provider returned no translation");
                }
                Err(e) => {
                    warn!(provider = provider.name(), word, error = %e, "provider failed, falling back");
                }
            }
        }
        None
    }

    pub async fn lookup_detail(&self, word: &str) -> Option<VocabDetail> {
        for provider in &self.providers {
            match provider.lookup_detail(word).await {
                Ok(Some(detail)) => return Some(detail),
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = provider.name(), word, error = %e, "detail lookup failed");
                }
            }
        }
        None
    }
}
