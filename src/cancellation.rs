//! Staleness and timer handles for the page presenters.
//! Late async results are made no-ops by generation checks; pending timers
//! are owned by a `TimerSlot` and cancelled with a `CancellationToken`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Instance counter. Each new tooltip / popup instance advances it; a
/// result tagged with an older generation is stale.
#[derive(Debug, Default)]
pub struct Generation(u64);

impl Generation {
    /// Start a new instance and return its generation.
    pub fn advance(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    pub fn current(&self) -> u64 {
        self.0
    }
}

/// One pending timer at most. Re-arming cancels the previous one.
///
/// The epoch closes the window between a timer waking up and taking the
/// owner's lock: a fire is honored only if its epoch is still the armed one.
#[derive(Default)]
pub struct TimerSlot {
    token: Option<CancellationToken>,
    epoch: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot, returning the token the timer task waits on and the
    /// epoch it must present when it fires.
    pub fn arm(&mut self) -> (CancellationToken, u64) {
        self.cancel();
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        (token, self.epoch)
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.epoch += 1;
    }

    pub fn is_pending(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Consume a fire. `false` if the slot was cancelled or re-armed since.
    pub fn fire(&mut self, epoch: u64) -> bool {
        if self.epoch != epoch || self.token.is_none() {
            return false;
        }
        self.token = None;
        true
    }
}

/// Run `action` after `delay` unless `token` is cancelled first.
pub fn spawn_timer<F, Fut>(token: CancellationToken, delay: Duration, action: F)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => action().await,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn generation_is_monotonic() {
        let mut generation = Generation::default();
        assert_eq!(generation.current(), 0);
        let first = generation.advance();
        assert_eq!(generation.advance(), first + 1);
        assert_eq!(generation.current(), first + 1);
    }

    #[test]
    fn rearming_invalidates_previous_epoch() {
        let mut slot = TimerSlot::new();
        let (first, e1) = slot.arm();
        let (_second, e2) = slot.arm();
        assert!(first.is_cancelled());
        assert!(!slot.fire(e1));
        assert!(slot.fire(e2));
        assert!(!slot.is_pending());
    }

    #[test]
    fn cancel_clears_pending() {
        let mut slot = TimerSlot::new();
        let (token, epoch) = slot.arm();
        assert!(slot.is_pending());
        slot.cancel();
        assert!(token.is_cancelled());
        assert!(!slot.fire(epoch));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut slot = TimerSlot::new();
        let (token, _) = slot.arm();
        let flag = Arc::clone(&ran);
        spawn_timer(token, Duration::from_millis(100), move || async move {
            flag.store(true, Ordering::SeqCst);
        });
        slot.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_runs_after_delay() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut slot = TimerSlot::new();
        let (token, _) = slot.arm();
        let flag = Arc::clone(&ran);
        spawn_timer(token, Duration::from_millis(100), move || async move {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!ran.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(ran.load(Ordering::SeqCst));
    }
}
