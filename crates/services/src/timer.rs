use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Identifies one scheduling of a `TimerSlot`.
///
/// A callback holding a stale ticket must not act: the slot was cancelled or
/// re-armed after it was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket(u64);

#[derive(Default)]
struct SlotState {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    delay: Option<Duration>,
}

/// One-shot timer with at most one pending callback.
///
/// Scheduling always voids the previous callback first. Clones share the slot.
#[derive(Clone)]
pub struct TimerSlot {
    name: &'static str,
    state: Arc<Mutex<SlotState>>,
}

impl TimerSlot {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(SlotState::default())),
        }
    }

    // Slot state is a counter and a handle; both stay consistent across a panic.
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the slot, replacing any pending callback.
    ///
    /// The callback receives the ticket it was scheduled under and runs after
    /// the slot has released it, so it may re-arm the same slot.
    pub fn schedule<F, Fut>(&self, delay: Duration, callback: F) -> TimerTicket
    where
        F: FnOnce(TimerTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        state.generation += 1;
        let ticket = TimerTicket(state.generation);
        if let Some(previous) = state.handle.take() {
            previous.abort();
            tracing::trace!(timer = self.name, "replaced pending timer");
        }

        let slot = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !slot.release(ticket) {
                return;
            }
            callback(ticket).await;
        });
        state.handle = Some(handle);
        state.delay = Some(delay);
        tracing::trace!(timer = self.name, delay_ms = delay.as_millis(), "timer armed");
        ticket
    }

    /// Void the pending callback. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        state.generation += 1;
        state.delay = None;
        match state.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::trace!(timer = self.name, "timer cancelled");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.lock().handle.is_some()
    }

    /// Whether `ticket` is still the latest scheduling of this slot.
    #[must_use]
    pub fn is_current(&self, ticket: TimerTicket) -> bool {
        self.lock().generation == ticket.0
    }

    /// Delay of the pending callback, if any.
    #[must_use]
    pub fn pending_delay(&self) -> Option<Duration> {
        let state = self.lock();
        state.handle.as_ref().and(state.delay)
    }

    /// Detach the pending handle if `ticket` still owns the slot.
    fn release(&self, ticket: TimerTicket) -> bool {
        let mut state = self.lock();
        if state.generation != ticket.0 {
            return false;
        }
        state.handle = None;
        state.delay = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let hits = Arc::new(AtomicUsize::new(0));
        let read = {
            let hits = Arc::clone(&hits);
            move || hits.load(Ordering::SeqCst)
        };
        (hits, read)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let slot = TimerSlot::new("test");
        let (hits, read) = counter();
        slot.schedule(Duration::from_millis(100), move |_| async move {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        assert!(slot.is_pending());

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(read(), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(read(), 1);
        assert!(!slot.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_voids_the_previous_callback() {
        let slot = TimerSlot::new("test");
        let (hits, read) = counter();
        let first = {
            let hits = Arc::clone(&hits);
            slot.schedule(Duration::from_millis(100), move |_| async move {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = slot.schedule(Duration::from_millis(100), move |_| async move {
            hits.fetch_add(10, Ordering::SeqCst);
        });
        assert!(!slot.is_current(first));
        assert!(slot.is_current(second));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(read(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(read(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let slot = TimerSlot::new("test");
        let (hits, read) = counter();
        slot.schedule(Duration::from_millis(100), move |_| async move {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        assert!(slot.cancel());
        assert!(!slot.cancel());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(read(), 0);
        assert_eq!(slot.pending_delay(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_can_rearm_its_own_slot() {
        let slot = TimerSlot::new("test");
        let (hits, read) = counter();
        let inner = slot.clone();
        slot.schedule(Duration::from_millis(10), move |_| async move {
            hits.fetch_add(1, Ordering::SeqCst);
            inner.schedule(Duration::from_millis(500), |_| async {});
        });
        tokio::time::sleep(Duration::from_millis(11)).await;
        assert_eq!(read(), 1);
        assert_eq!(slot.pending_delay(), Some(Duration::from_millis(500)));
    }
}
