//! Tooltip presenter: one inline tooltip at a time, identified by its word.

use std::time::Duration;

use tracing::debug;

use super::defer::{Cx, Deferred, TimerKey};
use super::surface::{ensure_styles, NodeContent, NodeId, NodeKind, PageSurface, TooltipBody, TooltipView};
use super::timings;
use crate::cancellation::{Generation, TimerSlot};
use crate::geometry::{self, Placement, Point, Rect};
use crate::state_machine::TooltipState;

#[derive(Default)]
pub struct TooltipPresenter {
    node: Option<NodeId>,
    view: Option<TooltipView>,
    hovered: bool,
    clickable: bool,
    pub(crate) hide_timer: TimerSlot,
    generation: Generation,
}

fn state_for(word: &str, body: &TooltipBody) -> TooltipState {
    match body {
        TooltipBody::Translating => TooltipState::Loading { word: word.to_string() },
        TooltipBody::Meaning(meaning) => TooltipState::Resolved {
            word: word.to_string(),
            meaning: meaning.clone(),
        },
    }
}

impl TooltipPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `word`. The same word updates the live tooltip in place; any other
    /// word tears it down and mounts a fresh instance. Returns the instance
    /// generation.
    pub(crate) fn show(&mut self, cx: &mut Cx<'_>, word: &str, body: TooltipBody, placement: Placement) -> u64 {
        if self.view.as_ref().is_some_and(|v| v.word == word) {
            self.update(cx, body);
            return self.generation.current();
        }

        if let Some(old) = self.node.take() {
            cx.surface.remove(old);
        }
        self.hide_timer.cancel();
        ensure_styles(cx.surface);

        let next = state_for(word, &body);
        let view = TooltipView {
            word: word.to_string(),
            body,
            hint: false,
        };
        // two-phase mount: hidden, measured, placed, then shown
        let id = cx.surface.mount(NodeKind::Tooltip, NodeContent::Tooltip(view.clone()));
        let viewport = cx.surface.viewport();
        let size = cx.surface.measure(id).map(|r| r.size()).unwrap_or_default();
        cx.surface.place(id, geometry::place(placement, size, viewport));
        cx.surface.show(id);

        self.node = Some(id);
        self.view = Some(view);
        self.hovered = false;
        self.clickable = true;
        let generation = self.generation.advance();
        cx.ui.set_tooltip(next);

        if matches!(cx.ui.tooltip(), TooltipState::Resolved { .. }) {
            self.schedule_hide(cx, timings::TOOLTIP_AUTO_HIDE);
        }
        debug!(word, generation, "tooltip mounted");
        generation
    }

    /// Replace the body of the live tooltip in place. `false` when there is
    /// no tooltip or the state change is not allowed.
    pub(crate) fn update(&mut self, cx: &mut Cx<'_>, body: TooltipBody) -> bool {
        let (Some(id), Some(view)) = (self.node, self.view.as_mut()) else {
            return false;
        };
        if !cx.ui.set_tooltip(state_for(&view.word, &body)) {
            return false;
        }
        view.body = body;
        cx.surface.update(id, NodeContent::Tooltip(view.clone()));
        if let Some(rect) = cx.surface.measure(id) {
            let at = geometry::reclamp(Point::new(rect.left, rect.top), rect.size(), cx.surface.viewport());
            cx.surface.place(id, at);
        }

        self.hide_timer.cancel();
        if matches!(cx.ui.tooltip(), TooltipState::Resolved { .. }) && !self.hovered {
            self.schedule_hide(cx, timings::TOOLTIP_AUTO_HIDE_ON_UPDATE);
        }
        true
    }

    /// Replace any pending auto-hide with one after `delay`.
    pub(crate) fn schedule_hide(&mut self, cx: &mut Cx<'_>, delay: Duration) {
        if self.node.is_some() {
            cx.timers
                .schedule(&mut self.hide_timer, TimerKey::TooltipHide, delay, Deferred::HideTooltip);
        }
    }

    /// Animated hide: the node fades out and is removed after the exit delay.
    pub(crate) fn hide(&mut self, cx: &mut Cx<'_>) {
        self.hide_timer.cancel();
        if let Some(id) = self.node.take() {
            cx.surface.fade_out(id);
            cx.timers.after(timings::TOOLTIP_EXIT, Deferred::RemoveNode(id));
        }
        self.view = None;
        self.hovered = false;
        cx.ui.set_tooltip(TooltipState::Absent);
    }

    pub(crate) fn hover_enter(&mut self, cx: &mut Cx<'_>) {
        let Some(id) = self.node else { return };
        self.hovered = true;
        self.hide_timer.cancel();
        if let Some(view) = self.view.as_mut().filter(|v| !v.hint) {
            view.hint = true;
            cx.surface.update(id, NodeContent::Tooltip(view.clone()));
        }
    }

    pub(crate) fn hover_leave(&mut self, cx: &mut Cx<'_>, popup_open: bool) {
        if self.node.is_none() {
            return;
        }
        self.hovered = false;
        if !popup_open {
            self.schedule_hide(cx, timings::TOOLTIP_HOVER_LEAVE_HIDE);
        }
    }

    /// Drop all references after the surface was purged.
    pub(crate) fn purge(&mut self) {
        self.hide_timer.cancel();
        self.node = None;
        self.view = None;
        self.hovered = false;
    }

    /// Warnings and other notices don't escalate to the detail popup.
    pub(crate) fn set_clickable(&mut self, clickable: bool) {
        self.clickable = clickable;
    }

    pub fn is_visible(&self) -> bool {
        self.node.is_some()
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    /// Word of the live tooltip if it can open the detail popup.
    pub fn clickable_word(&self) -> Option<&str> {
        self.view.as_ref().filter(|_| self.clickable).map(|v| v.word.as_str())
    }

    /// Whether `word` is still on screen in instance `generation`.
    pub fn is_current(&self, word: &str, generation: u64) -> bool {
        self.node.is_some()
            && self.view.as_ref().is_some_and(|v| v.word == word)
            && self.generation.current() == generation
    }

    pub fn rect(&self, surface: &dyn PageSurface) -> Option<Rect> {
        self.node.and_then(|id| surface.measure(id))
    }
}
