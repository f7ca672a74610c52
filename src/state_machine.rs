//! Presenter state machines: tooltip `Absent → Loading → Resolved` and popup
//! `Closed → Loading → Loaded | Error → Closed`. Transitions are validated
//! and every accepted change is published on a watch channel.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::translate::VocabDetail;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TooltipState {
    Absent,
    Loading { word: String },
    Resolved { word: String, meaning: String },
}

impl TooltipState {
    pub fn word(&self) -> Option<&str> {
        match self {
            TooltipState::Absent => None,
            TooltipState::Loading { word } | TooltipState::Resolved { word, .. } => Some(word),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, TooltipState::Absent)
    }

    /// A new word tears the tooltip down and rebuilds it. The same word only
    /// moves forward: a resolved tooltip never goes back to loading.
    pub fn can_transition_to(&self, next: &TooltipState) -> bool {
        match (self, next) {
            (_, TooltipState::Absent) => true,
            (TooltipState::Absent, _) => true,
            (TooltipState::Resolved { word: a, .. }, TooltipState::Loading { word: b }) => a != b,
            (TooltipState::Loading { word: a }, TooltipState::Loading { word: b }) => a != b,
            (_, TooltipState::Resolved { .. }) => true,
        }
    }
}

impl std::fmt::Display for TooltipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TooltipState::Absent => write!(f, "absent"),
            TooltipState::Loading { word } => write!(f, "loading({word})"),
            TooltipState::Resolved { word, meaning } => write!(f, "resolved({word}, {meaning})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PopupState {
    Closed,
    Loading { word: String },
    Loaded { word: String, detail: Box<VocabDetail> },
    Error { word: String, message: String },
}

impl PopupState {
    pub fn word(&self) -> Option<&str> {
        match self {
            PopupState::Closed => None,
            PopupState::Loading { word }
            | PopupState::Loaded { word, .. }
            | PopupState::Error { word, .. } => Some(word),
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, PopupState::Closed)
    }

    pub fn can_transition_to(&self, next: &PopupState) -> bool {
        match (self, next) {
            (_, PopupState::Closed) => true,
            (PopupState::Closed, PopupState::Loading { .. }) => true,
            (PopupState::Loading { word: a }, PopupState::Loaded { word: b, .. })
            | (PopupState::Loading { word: a }, PopupState::Error { word: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for PopupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PopupState::Closed => write!(f, "closed"),
            PopupState::Loading { word } => write!(f, "loading({word})"),
            PopupState::Loaded { word, .. } => write!(f, "loaded({word})"),
            PopupState::Error { word, message } => write!(f, "error({word}, {message})"),
        }
    }
}

/// What subscribers see after every accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiSnapshot {
    pub enabled: bool,
    pub tooltip: TooltipState,
    pub popup: PopupState,
}

/// Owned by the page session; mutated only under its lock.
pub struct StateMachine {
    current: UiSnapshot,
    tx: watch::Sender<UiSnapshot>,
}

impl StateMachine {
    pub fn new(enabled: bool) -> Self {
        let current = UiSnapshot {
            enabled,
            tooltip: TooltipState::Absent,
            popup: PopupState::Closed,
        };
        let (tx, _rx) = watch::channel(current.clone());
        Self { current, tx }
    }

    pub fn tooltip(&self) -> &TooltipState {
        &self.current.tooltip
    }

    pub fn popup(&self) -> &PopupState {
        &self.current.popup
    }

    pub fn enabled(&self) -> bool {
        self.current.enabled
    }

    pub fn set_tooltip(&mut self, next: TooltipState) -> bool {
        if self.current.tooltip == next {
            return true;
        }
        if !self.current.tooltip.can_transition_to(&next) {
            warn!(from = %self.current.tooltip, to = %next, "invalid tooltip transition");
            return false;
        }
        debug!(from = %self.current.tooltip, to = %next, "tooltip_transition");
        self.current.tooltip = next;
        self.publish();
        true
    }

    pub fn set_popup(&mut self, next: PopupState) -> bool {
        if self.current.popup == next {
            return true;
        }
        if !self.current.popup.can_transition_to(&next) {
            warn!(from = %self.current.popup, to = %next, "invalid popup transition");
            return false;
        }
        debug!(from = %self.current.popup, to = %next, "popup_transition");
        self.current.popup = next;
        self.publish();
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.current.enabled != enabled {
            self.current.enabled = enabled;
            self.publish();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiSnapshot> {
        self.tx.subscribe()
    }

    fn publish(&self) {
        self.tx.send_replace(self.current.clone());
    }
}
