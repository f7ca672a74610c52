//! Selection tracking: debounce triggers, the single-sentence guard, and the
//! de-duplication memory.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::timings;
use crate::cancellation::TimerSlot;

static SENTENCE_TERMINATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?。？！]").expect("terminator pattern is valid"));

/// At most one sentence terminator, Latin or CJK, after whitespace is
/// collapsed. Empty text is never a sentence.
pub fn is_single_sentence(text: &str) -> bool {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return false;
    }
    SENTENCE_TERMINATOR.find_iter(&cleaned).count() <= 1
}

/// First whitespace-separated token, or the whole text if there is none.
pub fn first_token(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    PointerUp,
    SelectionChange,
}

impl Trigger {
    pub fn debounce(self) -> Duration {
        match self {
            Trigger::PointerUp => timings::POINTER_UP_DEBOUNCE,
            Trigger::SelectionChange => timings::SELECTION_CHANGE_DEBOUNCE,
        }
    }
}

/// Per-page tracker state. Both triggers share one debounce slot, so either
/// one resets the other.
#[derive(Default)]
pub struct SelectionTracker {
    /// Last text a translation was requested for.
    pub last_requested: String,
    /// Selection the visible tooltip belongs to.
    pub active: String,
    pub debounce: TimerSlot,
    pub hide_check: TimerSlot,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dedup check and bookkeeping. `false` if `text` equals the previous
    /// request.
    pub fn begin_request(&mut self, text: &str) -> bool {
        if text == self.last_requested {
            return false;
        }
        self.last_requested = text.to_string();
        self.active = text.trim().to_string();
        true
    }

    pub fn forget(&mut self) {
        self.last_requested.clear();
        self.active.clear();
    }

    pub fn cancel_timers(&mut self) {
        self.debounce.cancel();
        self.hide_check.cancel();
    }
}
