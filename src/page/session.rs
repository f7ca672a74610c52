//! The page session: injectable state for one document plus the native
//! event handlers that drive it.
//!
//! All state lives behind one lock that is never held across `.await`.
//! Async work (lookups, the note append) runs on spawned tasks and re-enters
//! through `finish_*`, which drops any result whose tooltip or popup instance
//! has moved on.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::chip::ChipPresenter;
use super::client::PageTranslator;
use super::defer::{Cx, Deferred, Deferrer, TimerKey};
use super::enablement::Enablement;
use super::popup::PopupPresenter;
use super::selection::{first_token, is_single_sentence, SelectionTracker, Trigger};
use super::surface::{PageSurface, PopupTab, TooltipBody};
use super::timings;
use super::tooltip::TooltipPresenter;
use crate::cancellation::TimerSlot;
use crate::channel::{AckReply, AppendPayload, BackgroundMessage, ChipKind, SelectionReply, TabEnvelope};
use crate::error::TranslateError;
use crate::geometry::{Placement, Point};
use crate::state_machine::{PopupState, StateMachine, TooltipState, UiSnapshot};
use crate::translate::{TranslationResult, VocabDetail};

pub const MISS_TEXT: &str = "—";
pub const ERROR_TEXT: &str = "Error";
pub const TOO_MUCH_TEXT: &str = "⚠️ Too much text";
pub const ONE_SENTENCE_HINT: &str = "Please select only one sentence at a time.";
pub const EXTENSION_OFF: &str = "Extension is OFF";
pub const SAVED_TO_NOTES: &str = "Saved to Obsidian!";

/// Where a pointer-down landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Tooltip,
    Popup,
    Page,
}

struct PageState {
    ui: StateMachine,
    enablement: Enablement,
    tracker: SelectionTracker,
    tooltip: TooltipPresenter,
    popup: PopupPresenter,
    chip: ChipPresenter,
    outside_click: TimerSlot,
}

impl PageState {
    fn new() -> Self {
        Self {
            ui: StateMachine::new(false),
            enablement: Enablement::new(),
            tracker: SelectionTracker::new(),
            tooltip: TooltipPresenter::new(),
            popup: PopupPresenter::new(),
            chip: ChipPresenter::new(),
            outside_click: TimerSlot::new(),
        }
    }

    /// New selections are ignored while the user is working with the
    /// existing UI.
    fn accepts_selection(&self) -> bool {
        self.enablement.is_attached() && !self.popup.is_open() && !self.tooltip.is_hovered()
    }

    fn slot(&mut self, key: TimerKey) -> &mut TimerSlot {
        match key {
            TimerKey::Debounce => &mut self.tracker.debounce,
            TimerKey::SelectionCheck => &mut self.tracker.hide_check,
            TimerKey::OutsideClick => &mut self.outside_click,
            TimerKey::TooltipHide => &mut self.tooltip.hide_timer,
            TimerKey::SaveRevert => &mut self.popup.save_revert,
            TimerKey::ChipExpire => &mut self.chip.expiry,
        }
    }
}

pub(crate) struct SessionInner {
    surface: Arc<dyn PageSurface>,
    translator: PageTranslator,
    state: Mutex<PageState>,
    timers: Deferrer,
}

impl SessionInner {
    fn cx<'a>(&'a self, ui: &'a mut StateMachine) -> Cx<'a> {
        Cx {
            surface: self.surface.as_ref(),
            ui,
            timers: &self.timers,
        }
    }
}

#[derive(Clone)]
pub struct PageSession {
    inner: Arc<SessionInner>,
}

impl PageSession {
    /// A session starts disabled; call [`PageSession::initialize`] with the
    /// persisted flag.
    pub fn new(surface: Arc<dyn PageSurface>, translator: PageTranslator) -> Self {
        let inner = Arc::new_cyclic(|weak| SessionInner {
            surface,
            translator,
            state: Mutex::new(PageState::new()),
            timers: Deferrer::new(weak.clone()),
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    pub fn initialize(&self, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }

    pub fn enable(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        st.enablement.enable(self.inner.surface.as_ref());
        st.ui.set_enabled(true);
    }

    /// Detach listeners and restore the page to its pristine state.
    pub fn disable(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        st.enablement.disable(self.inner.surface.as_ref());
        st.tracker.cancel_timers();
        st.tracker.forget();
        st.outside_click.cancel();
        st.tooltip.purge();
        st.popup.purge();
        st.chip.purge();
        let removed = self.inner.surface.remove_all_injected();
        st.ui.set_tooltip(TooltipState::Absent);
        st.ui.set_popup(PopupState::Closed);
        st.ui.set_enabled(false);
        info!(removed, "page ui purged");
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enablement.is_enabled()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiSnapshot> {
        self.inner.state.lock().ui.subscribe()
    }

    pub fn snapshot(&self) -> UiSnapshot {
        self.subscribe().borrow().clone()
    }

    pub fn surface(&self) -> &Arc<dyn PageSurface> {
        &self.inner.surface
    }

    pub fn translator(&self) -> &PageTranslator {
        &self.inner.translator
    }

    // ---- native listeners ----

    pub fn pointer_up(&self) {
        self.on_selection_signal(Trigger::PointerUp);
    }

    pub fn selection_changed(&self) {
        self.on_selection_signal(Trigger::SelectionChange);
    }

    fn on_selection_signal(&self, trigger: Trigger) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if !st.accepts_selection() {
            return;
        }
        self.inner.timers.schedule(
            &mut st.tracker.debounce,
            TimerKey::Debounce,
            trigger.debounce(),
            Deferred::TranslateSelection(trigger),
        );
        if trigger == Trigger::SelectionChange && st.tooltip.is_visible() {
            self.inner.timers.schedule(
                &mut st.tracker.hide_check,
                TimerKey::SelectionCheck,
                timings::SELECTION_HIDE_CHECK,
                Deferred::SelectionHideCheck,
            );
        }
    }

    pub fn pointer_down(&self, target: PointerTarget) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if !st.enablement.is_attached() || (!st.tooltip.is_visible() && !st.popup.is_open()) {
            return;
        }
        if target != PointerTarget::Page {
            return;
        }
        let mut cx = self.inner.cx(&mut st.ui);
        if st.popup.is_open() {
            st.popup.close(&mut cx);
        }
        if st.tooltip.is_visible() {
            st.tooltip.hide(&mut cx);
        }
        self.inner.timers.schedule(
            &mut st.outside_click,
            TimerKey::OutsideClick,
            timings::OUTSIDE_CLICK_FOLLOW_UP,
            Deferred::OutsideClickFollowUp,
        );
    }

    /// Escape closes the popup first; with no popup it clears the tooltip
    /// and the selection.
    pub fn key_down(&self, key: &str) {
        if key != "Escape" {
            return;
        }
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if !st.enablement.is_attached() {
            return;
        }
        let mut cx = self.inner.cx(&mut st.ui);
        if st.popup.is_open() {
            st.popup.close(&mut cx);
            return;
        }
        st.tracker.forget();
        st.tooltip.hide(&mut cx);
        self.inner.surface.clear_selection();
    }

    /// Anchors are viewport-relative, so scrolling hides everything.
    pub fn scroll(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if !st.enablement.is_attached() {
            return;
        }
        let mut cx = self.inner.cx(&mut st.ui);
        if st.tooltip.is_visible() {
            st.tooltip.hide(&mut cx);
        }
        if st.popup.is_open() {
            st.popup.close(&mut cx);
        }
    }

    // ---- tooltip and popup controls ----

    pub fn tooltip_hover_enter(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let mut cx = self.inner.cx(&mut st.ui);
        st.tooltip.hover_enter(&mut cx);
    }

    pub fn tooltip_hover_leave(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let popup_open = st.popup.is_open();
        let mut cx = self.inner.cx(&mut st.ui);
        st.tooltip.hover_leave(&mut cx, popup_open);
    }

    /// Hand the tooltip over to the detail popup and start the detail fetch.
    pub fn tooltip_click(&self) -> Option<JoinHandle<()>> {
        let (word, generation) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let word = st.tooltip.clickable_word()?.to_string();
            // measure before hiding: a hidden tooltip has no rectangle
            let anchor = st.tooltip.rect(self.inner.surface.as_ref());
            let mut cx = self.inner.cx(&mut st.ui);
            let generation = st.popup.open(&mut cx, &word, anchor);
            st.tooltip.hide(&mut cx);
            (word, generation)
        };

        let session = self.clone();
        Some(tokio::spawn(async move {
            let detail = session.inner.translator.lookup_detail(&word).await;
            session.finish_detail(&word, generation, detail);
        }))
    }

    pub fn popup_close(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if st.popup.is_open() {
            let mut cx = self.inner.cx(&mut st.ui);
            st.popup.close(&mut cx);
        }
    }

    pub fn popup_select_tab(&self, tab: PopupTab) -> bool {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let mut cx = self.inner.cx(&mut st.ui);
        st.popup.select_tab(&mut cx, tab)
    }

    pub fn popup_speak(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let cx = self.inner.cx(&mut st.ui);
        st.popup.speak(&cx);
    }

    /// Save the enriched line for the popup's word. `None` when the popup
    /// has no loaded record.
    pub async fn popup_save(&self) -> Option<AckReply> {
        let text = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let mut cx = self.inner.cx(&mut st.ui);
            st.popup.save(&mut cx)?
        };
        Some(self.save_to_notes(Some(&text)).await)
    }

    /// Send `OBSIDIAN_APPEND` with the given text (or the live selection)
    /// and surface the outcome as a chip.
    pub async fn save_to_notes(&self, text: Option<&str>) -> AckReply {
        let surface = &self.inner.surface;
        let selected_text = match text {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => surface.selection_text(),
        };
        let payload = AppendPayload {
            selected_text,
            page_title: surface.page_title(),
            url: surface.page_url(),
        };

        let ack = match self.inner.translator.append(payload).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(error = %e, "append message failed");
                AckReply::failed(format!("Message error: {e}"))
            }
        };

        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let mut cx = self.inner.cx(&mut st.ui);
        if ack.ok {
            st.chip.show(&mut cx, ChipKind::Success, Some(SAVED_TO_NOTES));
        } else {
            let reason = ack.error.as_deref().unwrap_or("Unknown error");
            warn!(reason, "note append failed");
            st.chip
                .show(&mut cx, ChipKind::Error, Some(&format!("Obsidian save failed: {reason}")));
        }
        ack
    }

    // ---- privileged-context messages ----

    pub async fn handle_message(&self, message: BackgroundMessage) -> Option<SelectionReply> {
        match message {
            BackgroundMessage::ShowChip { message, chip_type } => {
                let mut guard = self.inner.state.lock();
                let st = &mut *guard;
                let mut cx = self.inner.cx(&mut st.ui);
                st.chip.show(&mut cx, chip_type, message.as_deref());
                None
            }
            BackgroundMessage::ExtensionToggle { enabled } => {
                info!(enabled, "toggle received");
                self.initialize(enabled);
                None
            }
            BackgroundMessage::TranslateSelection { selected_text } => {
                Some(self.translate_for_menu(selected_text).await)
            }
        }
    }

    /// Serve envelopes from the privileged context until it hangs up.
    pub fn listen(&self, mut rx: mpsc::UnboundedReceiver<TabEnvelope>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let kind = envelope.message.clone();
                let reply = session.handle_message(envelope.message).await;
                if let (Some(tx), Some(reply)) = (envelope.reply, reply) {
                    if tx.send(reply).is_err() {
                        debug!(?kind, "sender stopped waiting for reply");
                    }
                }
            }
            debug!("tab channel closed");
        })
    }

    /// Context-menu translation: first token only, tooltip centered in the
    /// viewport.
    async fn translate_for_menu(&self, selected_text: Option<String>) -> SelectionReply {
        if !self.is_enabled() {
            return SelectionReply {
                ok: false,
                translation: None,
                error: Some(EXTENSION_OFF.into()),
            };
        }
        let selected = selected_text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.inner.surface.selection_text());
        let word = first_token(&selected).to_string();

        let translation = match self.inner.translator.translate(&word).await {
            Ok(result) => result.translated_text,
            Err(e) => {
                warn!(word, error = %e, "menu translation failed");
                return SelectionReply {
                    ok: false,
                    translation: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if st.enablement.is_enabled() {
            let viewport = self.inner.surface.viewport();
            let center = Placement::Point(Point::new(viewport.width / 2.0, viewport.height / 2.0));
            let meaning = translation.clone().unwrap_or_else(|| MISS_TEXT.into());
            let mut cx = self.inner.cx(&mut st.ui);
            st.tooltip.show(&mut cx, &word, TooltipBody::Meaning(meaning), center);
        }
        SelectionReply {
            ok: true,
            translation,
            error: None,
        }
    }

    // ---- timers and async re-entry ----

    pub(crate) fn fire(&self, armed: Option<(TimerKey, u64)>, action: Deferred) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if let Some((key, epoch)) = armed {
            if !st.slot(key).fire(epoch) {
                debug!(?key, "timer superseded");
                return;
            }
        }

        match action {
            Deferred::TranslateSelection(trigger) => self.translate_selection(st, trigger),
            Deferred::SelectionHideCheck => {
                if st.popup.is_open() || st.tooltip.is_hovered() {
                    return;
                }
                let text = self.inner.surface.selection_text();
                if text.is_empty() || text != st.tracker.active {
                    let mut cx = self.inner.cx(&mut st.ui);
                    st.tooltip.hide(&mut cx);
                }
            }
            Deferred::OutsideClickFollowUp => {
                if self.inner.surface.selection_text().is_empty() {
                    st.tracker.forget();
                    if st.tooltip.is_visible() {
                        let mut cx = self.inner.cx(&mut st.ui);
                        st.tooltip.hide(&mut cx);
                    }
                }
            }
            Deferred::HideTooltip => {
                let mut cx = self.inner.cx(&mut st.ui);
                st.tooltip.hide(&mut cx);
            }
            Deferred::RevertSaveLabel => {
                let mut cx = self.inner.cx(&mut st.ui);
                st.popup.revert_save_label(&mut cx);
            }
            Deferred::ExpireChip(id) => {
                let mut cx = self.inner.cx(&mut st.ui);
                st.chip.expire(&mut cx, id);
            }
            Deferred::RemoveNode(id) => self.inner.surface.remove(id),
        }
    }

    fn translate_selection(&self, st: &mut PageState, trigger: Trigger) {
        if !st.accepts_selection() {
            return;
        }
        let Some(selection) = self.inner.surface.selection() else {
            return;
        };
        let anchor = Placement::Anchor(selection.rect);
        let mut cx = self.inner.cx(&mut st.ui);

        if !is_single_sentence(&selection.text) {
            st.tooltip
                .show(&mut cx, TOO_MUCH_TEXT, TooltipBody::Meaning(ONE_SENTENCE_HINT.into()), anchor);
            st.tooltip.set_clickable(false);
            st.tooltip.schedule_hide(&mut cx, timings::WARNING_HIDE);
            return;
        }
        if !st.tracker.begin_request(&selection.text) {
            debug!(?trigger, "selection unchanged");
            return;
        }

        let word = selection.text;
        let generation = st.tooltip.show(&mut cx, &word, TooltipBody::Translating, anchor);
        debug!(word = %word, ?trigger, generation, "translation requested");

        let session = self.clone();
        tokio::spawn(async move {
            let result = session.inner.translator.translate(&word).await;
            session.finish_translation(&word, generation, result);
        });
    }

    fn finish_translation(&self, word: &str, generation: u64, result: Result<TranslationResult, TranslateError>) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if !st.tooltip.is_current(word, generation) {
            debug!(word, generation, "stale translation discarded");
            return;
        }
        let mut cx = self.inner.cx(&mut st.ui);
        match result {
            Ok(TranslationResult {
                translated_text: Some(text),
                ..
            }) => {
                st.tooltip.update(&mut cx, TooltipBody::Meaning(text));
            }
            Ok(_) => {
                st.tooltip.update(&mut cx, TooltipBody::Meaning(MISS_TEXT.into()));
                st.tooltip.schedule_hide(&mut cx, timings::MISS_HIDE);
            }
            Err(e) => {
                warn!(word, error = %e, "translation failed");
                st.tooltip.update(&mut cx, TooltipBody::Meaning(ERROR_TEXT.into()));
                st.tooltip.schedule_hide(&mut cx, timings::ERROR_HIDE);
            }
        }
    }

    fn finish_detail(&self, word: &str, generation: u64, detail: Option<VocabDetail>) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let mut cx = self.inner.cx(&mut st.ui);
        st.popup.finish(&mut cx, generation, word, detail);
    }
}
