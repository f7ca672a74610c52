//! Deferred actions: every page timer resolves to a [`Deferred`] that runs
//! under the session lock, after its slot confirms the timer is still armed.

use std::sync::Weak;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::selection::Trigger;
use super::session::{PageSession, SessionInner};
use super::surface::{NodeId, PageSurface};
use crate::cancellation::{spawn_timer, TimerSlot};
use crate::state_machine::StateMachine;

/// Which presenter-owned slot a timer was armed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKey {
    Debounce,
    SelectionCheck,
    OutsideClick,
    TooltipHide,
    SaveRevert,
    ChipExpire,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Deferred {
    TranslateSelection(Trigger),
    SelectionHideCheck,
    OutsideClickFollowUp,
    HideTooltip,
    RevertSaveLabel,
    ExpireChip(NodeId),
    /// End of an exit animation.
    RemoveNode(NodeId),
}

/// Schedules deferred actions back into the owning session. Holds only a
/// weak reference: timers of a dropped session fire into nothing.
#[derive(Clone)]
pub(crate) struct Deferrer {
    session: Weak<SessionInner>,
}

impl Deferrer {
    pub(crate) fn new(session: Weak<SessionInner>) -> Self {
        Self { session }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self { session: Weak::new() }
    }

    /// Arm `slot` (cancelling whatever it held) and run `action` after `delay`.
    pub(crate) fn schedule(&self, slot: &mut TimerSlot, key: TimerKey, delay: Duration, action: Deferred) {
        let (token, epoch) = slot.arm();
        self.spawn(token, delay, Some((key, epoch)), action);
    }

    /// Fire-and-forget; only for idempotent actions such as node removal.
    pub(crate) fn after(&self, delay: Duration, action: Deferred) {
        self.spawn(CancellationToken::new(), delay, None, action);
    }

    fn spawn(&self, token: CancellationToken, delay: Duration, armed: Option<(TimerKey, u64)>, action: Deferred) {
        let session = self.session.clone();
        spawn_timer(token, delay, move || async move {
            if let Some(inner) = session.upgrade() {
                PageSession::from_inner(inner).fire(armed, action);
            }
        });
    }
}

/// What a presenter needs to mutate the page: the surface, the published UI
/// state, and a way to schedule follow-ups.
pub(crate) struct Cx<'a> {
    pub surface: &'a dyn PageSurface,
    pub ui: &'a mut StateMachine,
    pub timers: &'a Deferrer,
}
