//! Page-side translation client: page-local cache, then the privileged
//! context over the channel, then a direct provider fetch when the channel
//! is down.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::{AckReply, AppendPayload, Dispatch, DispatchClient};
use crate::error::{ChannelError, TranslateError};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::translate::cache::LookupCaches;
use crate::translate::{prepare_query, ProviderChain, TranslationResult, VocabDetail};

pub struct PageTranslator {
    caches: LookupCaches,
    dispatch: DispatchClient,
    direct: ProviderChain,
    metrics: Arc<MetricsRegistry>,
}

impl PageTranslator {
    pub fn new(dispatch: DispatchClient, direct: ProviderChain, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            caches: LookupCaches::new(),
            dispatch,
            direct,
            metrics,
        }
    }

    /// Inputs under two chars resolve to a miss without any I/O.
    pub async fn translate(&self, word: &str) -> Result<TranslationResult, TranslateError> {
        let Some(clean) = prepare_query(word)? else {
            return Ok(TranslationResult::miss(word.trim()));
        };

        if let Some(hit) = self.caches.simple.get(&clean) {
            self.metrics.incr(metric_names::CACHE_HIT);
            debug!(word = %clean, "page cache hit");
            return Ok(TranslationResult::found(clean, hit));
        }
        self.metrics.incr(metric_names::CACHE_MISS);

        let translated = match self.dispatch.translate(&clean).await {
            Dispatch::Answered(answer) => answer,
            Dispatch::Unavailable => {
                info!(word = %clean, "channel unavailable, fetching directly");
                self.direct.translate(&clean).await
            }
        };

        match translated {
            Some(text) => {
                self.caches.simple.insert(&clean, text.clone());
                Ok(TranslationResult::found(clean, text))
            }
            None => Ok(TranslationResult::miss(clean)),
        }
    }

    /// Detail lookups only go through the privileged context.
    pub async fn lookup_detail(&self, word: &str) -> Option<VocabDetail> {
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

        match self.dispatch.lookup_detail(&clean).await {
            Dispatch::Answered(Some(detail)) => {
                self.caches.detail.insert(&clean, detail.clone());
                Some(detail)
            }
            Dispatch::Answered(None) | Dispatch::Unavailable => None,
        }
    }

    pub async fn append(&self, payload: AppendPayload) -> Result<AckReply, ChannelError> {
        self.dispatch.append(payload).await
    }
}
