//! Status chip: a short notice in the top-right corner, one at a time.

use std::time::Duration;

use super::defer::{Cx, Deferred, TimerKey};
use super::surface::{ensure_styles, ChipView, NodeContent, NodeId, NodeKind};
use super::timings;
use crate::cancellation::TimerSlot;
use crate::channel::ChipKind;
use crate::geometry::Point;

const EDGE_OFFSET: f64 = 20.0;

fn defaults(kind: ChipKind) -> (&'static str, &'static str, Duration) {
    match kind {
        ChipKind::Info => ("Saving...", "⏳", timings::CHIP_INFO),
        ChipKind::Success => ("Saved!", "✅", timings::CHIP_SUCCESS),
        ChipKind::Error => ("Failed", "❌", timings::CHIP_ERROR),
    }
}

#[derive(Default)]
pub struct ChipPresenter {
    node: Option<NodeId>,
    pub(crate) expiry: TimerSlot,
}

impl ChipPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any visible chip. `None` uses the kind's default text.
    pub(crate) fn show(&mut self, cx: &mut Cx<'_>, kind: ChipKind, message: Option<&str>) {
        if let Some(old) = self.node.take() {
            cx.surface.remove(old);
        }
        ensure_styles(cx.surface);

        let (default_text, icon, lifetime) = defaults(kind);
        let view = ChipView {
            kind,
            message: message.filter(|m| !m.is_empty()).unwrap_or(default_text).to_string(),
            icon,
        };
        let id = cx.surface.mount(NodeKind::Chip, NodeContent::Chip(view));
        let width = cx.surface.measure(id).map_or(0.0, |r| r.width);
        let viewport = cx.surface.viewport();
        cx.surface
            .place(id, Point::new(viewport.width - width - EDGE_OFFSET, EDGE_OFFSET));
        cx.surface.show(id);
        self.node = Some(id);

        cx.timers
            .schedule(&mut self.expiry, TimerKey::ChipExpire, lifetime, Deferred::ExpireChip(id));
    }

    /// Fade the chip out if it is still the one that timed out.
    pub(crate) fn expire(&mut self, cx: &mut Cx<'_>, id: NodeId) {
        if self.node != Some(id) {
            return;
        }
        self.node = None;
        cx.surface.fade_out(id);
        cx.timers.after(timings::CHIP_EXIT, Deferred::RemoveNode(id));
    }

    pub(crate) fn purge(&mut self) {
        self.expiry.cancel();
        self.node = None;
    }

    pub fn is_visible(&self) -> bool {
        self.node.is_some()
    }
}
