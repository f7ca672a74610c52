//! Detail popup presenter: tabbed lexical record opened from the tooltip.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::defer::{Cx, Deferred, TimerKey};
use super::surface::{ensure_styles, NodeContent, NodeId, NodeKind, Pane, PopupContent, PopupTab, PopupView};
use super::timings;
use crate::cancellation::{Generation, TimerSlot};
use crate::geometry::{self, Rect};
use crate::state_machine::PopupState;
use crate::translate::VocabDetail;

pub const DETAIL_ERROR: &str = "Could not fetch detailed information.";
pub const SAVE_LABEL: &str = "Save to Obsidian";
pub const SAVED_LABEL: &str = "✓ Saved!";
pub const SPEECH_LANG: &str = "en-US";
pub const SPEECH_RATE: f32 = 0.9;

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

#[derive(Default)]
pub struct PopupPresenter {
    node: Option<NodeId>,
    /// Tooltip rectangle captured when the popup was opened.
    anchor: Option<Rect>,
    content: Option<PopupContent>,
    detail: Option<VocabDetail>,
    pub(crate) save_revert: TimerSlot,
    generation: Generation,
}

impl PopupPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount the loading popup next to `anchor` and return the generation the
    /// detail fetch must present in [`PopupPresenter::finish`].
    pub(crate) fn open(&mut self, cx: &mut Cx<'_>, word: &str, anchor: Option<Rect>) -> u64 {
        if self.node.is_some() {
            self.close(cx);
        }
        ensure_styles(cx.surface);

        let id = cx.surface.mount(
            NodeKind::Popup,
            NodeContent::Popup(PopupView::Loading { word: word.to_string() }),
        );
        self.node = Some(id);
        self.anchor = anchor;
        self.position(cx);
        cx.surface.show(id);

        let generation = self.generation.advance();
        cx.ui.set_popup(PopupState::Loading { word: word.to_string() });
        debug!(word, generation, "popup opened");
        generation
    }

    /// Apply a detail fetch. Results for a closed or replaced popup are
    /// dropped without touching the surface.
    pub(crate) fn finish(&mut self, cx: &mut Cx<'_>, generation: u64, word: &str, detail: Option<VocabDetail>) -> bool {
        let Some(id) = self.node else {
            debug!(word, "detail arrived after popup closed, discarded");
            return false;
        };
        if self.generation.current() != generation || cx.ui.popup() != &(PopupState::Loading { word: word.to_string() }) {
            debug!(word, generation, "stale detail discarded");
            return false;
        }

        match detail {
            Some(detail) => {
                let content = build_content(&detail);
                cx.surface
                    .update(id, NodeContent::Popup(PopupView::Content(Box::new(content.clone()))));
                // content is taller than the placeholder
                self.position(cx);
                self.content = Some(content);
                cx.ui.set_popup(PopupState::Loaded {
                    word: word.to_string(),
                    detail: Box::new(detail.clone()),
                });
                self.detail = Some(detail);
            }
            None => {
                cx.surface.update(
                    id,
                    NodeContent::Popup(PopupView::Error {
                        word: word.to_string(),
                        message: DETAIL_ERROR.to_string(),
                    }),
                );
                cx.ui.set_popup(PopupState::Error {
                    word: word.to_string(),
                    message: DETAIL_ERROR.to_string(),
                });
            }
        }
        true
    }

    fn position(&self, cx: &Cx<'_>) {
        let Some(id) = self.node else { return };
        let size = cx.surface.measure(id).map(|r| r.size()).unwrap_or_default();
        let at = geometry::place_popup(self.anchor, size, cx.surface.viewport());
        cx.surface.place(id, at);
    }

    pub(crate) fn close(&mut self, cx: &mut Cx<'_>) {
        self.save_revert.cancel();
        if let Some(id) = self.node.take() {
            cx.surface.fade_out(id);
            cx.timers.after(timings::POPUP_EXIT, Deferred::RemoveNode(id));
        }
        self.forget();
        cx.ui.set_popup(PopupState::Closed);
    }

    /// Drop all references after the surface was purged.
    pub(crate) fn purge(&mut self) {
        self.save_revert.cancel();
        self.node = None;
        self.forget();
    }

    fn forget(&mut self) {
        self.anchor = None;
        self.content = None;
        self.detail = None;
        // any fetch still in flight is now stale
        self.generation.advance();
    }

    pub(crate) fn select_tab(&mut self, cx: &mut Cx<'_>, tab: PopupTab) -> bool {
        let (Some(id), Some(content)) = (self.node, self.content.as_mut()) else {
            return false;
        };
        if content.active_tab != tab {
            content.active_tab = tab;
            cx.surface
                .update(id, NodeContent::Popup(PopupView::Content(Box::new(content.clone()))));
        }
        true
    }

    /// Speak the headword. Failures are logged only.
    pub(crate) fn speak(&self, cx: &Cx<'_>) {
        let Some(detail) = &self.detail else { return };
        if detail.word.is_empty() {
            return;
        }
        if let Err(e) = cx.surface.speak(&detail.word, SPEECH_LANG, SPEECH_RATE) {
            warn!(word = %detail.word, error = %e, "speech synthesis failed");
        }
    }

    /// Flip the save control to its confirmation label and return the line
    /// to append. The label reverts on its own.
    pub(crate) fn save(&mut self, cx: &mut Cx<'_>) -> Option<String> {
        let id = self.node?;
        let detail = self.detail.as_ref()?;
        let text = enriched_save_text(detail);
        if let Some(content) = self.content.as_mut() {
            content.save_label = SAVED_LABEL.to_string();
            cx.surface
                .update(id, NodeContent::Popup(PopupView::Content(Box::new(content.clone()))));
        }
        cx.timers.schedule(
            &mut self.save_revert,
            TimerKey::SaveRevert,
            timings::SAVE_LABEL_REVERT,
            Deferred::RevertSaveLabel,
        );
        Some(text)
    }

    pub(crate) fn revert_save_label(&mut self, cx: &mut Cx<'_>) {
        let (Some(id), Some(content)) = (self.node, self.content.as_mut()) else {
            return;
        };
        content.save_label = SAVE_LABEL.to_string();
        cx.surface
            .update(id, NodeContent::Popup(PopupView::Content(Box::new(content.clone()))));
    }

    pub fn is_open(&self) -> bool {
        self.node.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation.current()
    }
}

/// `word [/phonetic/] — translation [| (pos) m1, m2; (pos) m3]`
pub fn enriched_save_text(detail: &VocabDetail) -> String {
    let mut text = detail.word.clone();
    if !detail.phonetic.is_empty() {
        text.push_str(&format!(" /{}/", detail.phonetic));
    }
    text.push_str(&format!(" — {}", detail.translation));
    if !detail.definitions.is_empty() {
        let summary = detail
            .definitions
            .iter()
            .map(|d| format!("({}) {}", d.pos, d.meanings.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        text.push_str(&format!(" | {summary}"));
    }
    text
}

/// Strip all markup except `<b>` / `</b>`.
pub fn sanitize_example(example: &str) -> String {
    MARKUP_TAG
        .replace_all(example, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            if tag.eq_ignore_ascii_case("<b>") || tag.eq_ignore_ascii_case("</b>") {
                tag.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

fn pane(items: Vec<String>, empty: &'static str) -> Pane {
    if items.is_empty() {
        Pane::Empty(empty)
    } else {
        Pane::Items(items)
    }
}

pub fn build_content(detail: &VocabDetail) -> PopupContent {
    let definitions = detail
        .definitions
        .iter()
        .map(|d| {
            let mut line = format!("({})", d.pos);
            if !d.definition.is_empty() {
                line.push(' ');
                line.push_str(&d.definition);
            }
            if !d.meanings.is_empty() {
                line.push(' ');
                line.push_str(&d.meanings.join("，"));
            }
            line
        })
        .collect();

    let examples = detail.examples.iter().map(|e| sanitize_example(e)).collect();

    let mut phrases: Vec<String> = detail
        .synonyms
        .iter()
        .map(|g| format!("({}) {}", g.pos, g.words.join(", ")))
        .collect();
    if !detail.alternatives.is_empty() {
        phrases.push(format!("Alternative translations: {}", detail.alternatives.join(", ")));
    }

    PopupContent {
        word: detail.word.clone(),
        phonetic: (!detail.phonetic.is_empty()).then(|| detail.phonetic.clone()),
        translation: detail.translation.clone(),
        active_tab: PopupTab::default(),
        definitions: pane(definitions, "No definitions available."),
        examples: pane(examples, "No examples available."),
        phrases: pane(phrases, "No phrases available."),
        save_label: SAVE_LABEL.to_string(),
    }
}
