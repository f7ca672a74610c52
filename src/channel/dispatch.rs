//! Page-side dispatch over the channel: per-attempt timeouts, retry with
//! linear backoff for simple lookups, port-then-message for detail lookups.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{AckReply, AppendPayload, PageRequest, Reply, Runtime, TRANSLATE_PORT};
use crate::error::ChannelError;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::translate::VocabDetail;

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub translate_timeout: Duration,
    pub detail_timeout: Duration,
    pub max_attempts: u32,
    /// Backoff before attempt `n + 1` is `backoff_step * n`.
    pub backoff_step: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            translate_timeout: Duration::from_millis(3000),
            detail_timeout: Duration::from_millis(5000),
            max_attempts: 3,
            backoff_step: Duration::from_millis(250),
        }
    }
}

/// Outcome of a channel lookup. `Unavailable` means the privileged context
/// never answered and the caller should fetch directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<T> {
    Answered(T),
    Unavailable,
}

#[derive(Clone)]
pub struct DispatchClient {
    runtime: Arc<dyn Runtime>,
    policy: DispatchPolicy,
    metrics: Arc<MetricsRegistry>,
}

impl DispatchClient {
    pub fn new(runtime: Arc<dyn Runtime>, policy: DispatchPolicy, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            runtime,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Each attempt opens its own port. An answer, even `translation: null`,
    /// ends the loop.
    pub async fn translate(&self, word: &str) -> Dispatch<Option<String>> {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            let request = PageRequest::Translate {
                word: word.to_string(),
            };
            match self.over_port(request, self.policy.translate_timeout).await {
                Ok(Reply::Translation(reply)) => {
                    if let Some(error) = &reply.error {
                        debug!(word, error = %error, "privileged context reported a failed lookup");
                    }
                    return Dispatch::Answered(reply.translation);
                }
                Ok(other) => {
                    warn!(word, attempt, kind = other.kind(), "unexpected reply on translate port");
                }
                Err(e) => {
                    warn!(word, attempt, error = %e, "translate port attempt failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff_step * attempt).await;
            }
        }
        Dispatch::Unavailable
    }

    /// One port attempt, then a single one-shot message. No retry.
    pub async fn lookup_detail(&self, word: &str) -> Dispatch<Option<VocabDetail>> {
        let request = PageRequest::FetchVocabDetail {
            word: word.to_string(),
        };
        match self.over_port(request.clone(), self.policy.detail_timeout).await {
            Ok(Reply::Detail(reply)) => return Dispatch::Answered(reply.detail),
            Ok(other) => warn!(word, kind = other.kind(), "unexpected reply on detail port"),
            Err(e) => warn!(word, error = %e, "detail port failed, falling back to message"),
        }

        match self.one_shot(request, Some(self.policy.detail_timeout)).await {
            Ok(Reply::Detail(reply)) => Dispatch::Answered(reply.detail),
            Ok(other) => {
                warn!(word, kind = other.kind(), "unexpected reply to detail message");
                Dispatch::Unavailable
            }
            Err(e) => {
                warn!(word, error = %e, "detail message failed");
                Dispatch::Unavailable
            }
        }
    }

    pub async fn append(&self, payload: AppendPayload) -> Result<AckReply, ChannelError> {
        match self.one_shot(PageRequest::ObsidianAppend { payload }, None).await? {
            Reply::Ack(ack) => Ok(ack),
            other => Err(ChannelError::UnexpectedReply(other.kind())),
        }
    }

    async fn over_port(&self, request: PageRequest, timeout: Duration) -> Result<Reply, ChannelError> {
        let span = self.metrics.span(metric_names::CHANNEL_ROUND_TRIP);
        let mut port = self.runtime.connect(TRANSLATE_PORT)?;
        port.post(request)?;
        let outcome = tokio::time::timeout(timeout, port.recv()).await;
        port.disconnect();
        match outcome {
            Ok(Some(reply)) => {
                span.finish();
                Ok(reply)
            }
            Ok(None) => Err(ChannelError::Closed),
            Err(_) => {
                self.metrics.incr(metric_names::CHANNEL_TIMEOUT);
                Err(ChannelError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    async fn one_shot(&self, request: PageRequest, timeout: Option<Duration>) -> Result<Reply, ChannelError> {
        let call = self.runtime.send_message(request);
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    self.metrics.incr(metric_names::CHANNEL_TIMEOUT);
                    Err(ChannelError::Timeout(limit.as_millis() as u64))
                }
            },
            None => call.await,
        }
    }
}
