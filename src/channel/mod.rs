//! Page ↔ privileged-context messaging.
//!
//! Requests travel either over a short-lived duplex [`port::Port`] (one
//! outstanding request per port) or as a one-shot message. Replies are plain
//! values; the JSON shapes match the extension's wire messages.

pub mod dispatch;
pub mod port;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::translate::VocabDetail;

pub use dispatch::{Dispatch, DispatchClient, DispatchPolicy};
pub use port::{Port, PortPeer, Runtime};

/// Name of the port the page opens for lookups.
pub const TRANSLATE_PORT: &str = "vocab-translate-port";

/// Page → privileged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageRequest {
    #[serde(rename = "TRANSLATE_REQUEST")]
    Translate { word: String },
    #[serde(rename = "FETCH_VOCAB_DETAIL")]
    FetchVocabDetail { word: String },
    #[serde(rename = "OBSIDIAN_APPEND")]
    ObsidianAppend { payload: AppendPayload },
}

impl PageRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            PageRequest::Translate { .. } => "TRANSLATE_REQUEST",
            PageRequest::FetchVocabDetail { .. } => "FETCH_VOCAB_DETAIL",
            PageRequest::ObsidianAppend { .. } => "OBSIDIAN_APPEND",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendPayload {
    pub selected_text: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateReply {
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailReply {
    pub detail: Option<VocabDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{ok: true}` or `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckReply {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Privileged → page reply to a [`PageRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Translation(TranslateReply),
    Detail(DetailReply),
    Ack(AckReply),
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Translation(_) => "translation",
            Reply::Detail(_) => "detail",
            Reply::Ack(_) => "ack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipKind {
    #[default]
    Info,
    Success,
    Error,
}

/// Privileged → page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackgroundMessage {
    #[serde(rename = "SHOW_CHIP")]
    ShowChip {
        #[serde(default)]
        message: Option<String>,
        #[serde(rename = "chipType", default)]
        chip_type: ChipKind,
    },
    #[serde(rename = "EXTENSION_TOGGLE")]
    ExtensionToggle { enabled: bool },
    #[serde(rename = "TRANSLATE_SELECTION")]
    TranslateSelection {
        #[serde(rename = "selectedText", default)]
        selected_text: Option<String>,
    },
}

/// Reply to `TRANSLATE_SELECTION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReply {
    pub ok: bool,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A message delivered to one tab, with a reply slot when the sender waits.
#[derive(Debug)]
pub struct TabEnvelope {
    pub message: BackgroundMessage,
    pub reply: Option<oneshot::Sender<SelectionReply>>,
}

impl TabEnvelope {
    pub fn notify(message: BackgroundMessage) -> Self {
        Self {
            message,
            reply: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_requests_use_wire_tags() {
        let req = PageRequest::Translate { word: "cat".into() };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"type": "TRANSLATE_REQUEST", "word": "cat"})
        );

        let append: PageRequest = serde_json::from_value(json!({
            "type": "OBSIDIAN_APPEND",
            "payload": {"selectedText": "hello", "pageTitle": "T", "url": "https://a.b/c"}
        }))
        .unwrap();
        assert_eq!(append.kind(), "OBSIDIAN_APPEND");
    }

    #[test]
    fn replies_serialize_flat() {
        let miss = Reply::Translation(TranslateReply {
            translation: None,
            error: Some("boom".into()),
        });
        assert_eq!(
            serde_json::to_value(&miss).unwrap(),
            json!({"translation": null, "error": "boom"})
        );
        assert_eq!(
            serde_json::to_value(Reply::Ack(AckReply::ok())).unwrap(),
            json!({"ok": true})
        );
    }

    #[test]
    fn background_messages_parse() {
        let chip: BackgroundMessage =
            serde_json::from_value(json!({"type": "SHOW_CHIP", "message": "Saving...", "chipType": "info"}))
                .unwrap();
        assert_eq!(
            chip,
            BackgroundMessage::ShowChip {
                message: Some("Saving...".into()),
                chip_type: ChipKind::Info
            }
        );

        let toggle: BackgroundMessage =
            serde_json::from_value(json!({"type": "EXTENSION_TOGGLE", "enabled": false})).unwrap();
        assert_eq!(toggle, BackgroundMessage::ExtensionToggle { enabled: false });

        let sel: BackgroundMessage =
            serde_json::from_value(json!({"type": "TRANSLATE_SELECTION"})).unwrap();
        assert_eq!(sel, BackgroundMessage::TranslateSelection { selected_text: None });
    }
}
