//! Render-completion futures for the invalidate/render handshake.
//!
//! A [`RenderFuture`] is a clonable handle to one pending "frame consumed"
//! notification. Clones share identity: coalesced invalidate requests hand
//! back clones of the same underlying state, and that state resolves exactly
//! once.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct Shared {
    value: Mutex<Option<bool>>,
    cond: Condvar,
}

/// Handle to a pending render completion.
///
/// `wait` blocks the caller until some render path resolves the future.
/// This is the only blocking wait in the crate; the resolving side never
/// takes the simulation lock, so waiting from the simulation thread cannot
/// deadlock the render thread.
#[derive(Debug, Clone)]
pub struct RenderFuture {
    shared: Arc<Shared>,
}

impl RenderFuture {
    /// A fresh, unresolved future.
    pub(crate) fn pending() -> Self {
        RenderFuture {
            shared: Arc::new(Shared {
                value: Mutex::new(None),
                cond: Condvar::new(),
            }),
        }
    }

    /// An already-resolved future; used when there is nothing to wait for.
    pub(crate) fn ready(value: bool) -> Self {
        RenderFuture {
            shared: Arc::new(Shared {
                value: Mutex::new(Some(value)),
                cond: Condvar::new(),
            }),
        }
    }

    /// Resolve the future. The first resolution wins; later calls are
    /// ignored so a future observably resolves exactly once.
    pub(crate) fn resolve(&self, value: bool) {
        let mut slot = self.shared.value.lock().expect("completion lock poisoned");
        if slot.is_none() {
            *slot = Some(value);
            self.shared.cond.notify_all();
        }
    }

    /// Block until resolved and return the resolution value.
    pub fn wait(&self) -> bool {
        let mut slot = self.shared.value.lock().expect("completion lock poisoned");
        while slot.is_none() {
            slot = self
                .shared
                .cond
                .wait(slot)
                .expect("completion lock poisoned");
        }
        slot.unwrap_or(false)
    }

    /// Block until resolved or the timeout elapses. Returns `None` on
    /// timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<bool> {
        let deadline = std::time::Instant::now() + timeout;
        let mut slot = self.shared.value.lock().expect("completion lock poisoned");
        while slot.is_none() {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, res) = self
                .shared
                .cond
                .wait_timeout(slot, remaining)
                .expect("completion lock poisoned");
            slot = guard;
            if res.timed_out() && slot.is_none() {
                return None;
            }
        }
        *slot
    }

    /// The resolution value, if already resolved.
    pub fn try_value(&self) -> Option<bool> {
        *self.shared.value.lock().expect("completion lock poisoned")
    }

    pub fn is_resolved(&self) -> bool {
        self.try_value().is_some()
    }

    /// True when both handles point at the same pending completion.
    pub fn same_future(&self, other: &RenderFuture) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn ready_future_is_resolved() {
        let fut = RenderFuture::ready(false);
        assert!(fut.is_resolved());
        assert_eq!(fut.wait(), false);
    }

    #[test]
    fn resolve_wakes_waiter() {
        let fut = RenderFuture::pending();
        let waiter = fut.clone();
        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(10));
        fut.resolve(true);
        assert_eq!(handle.join().unwrap(), true);
    }

    #[test]
    fn first_resolution_wins() {
        let fut = RenderFuture::pending();
        fut.resolve(true);
        fut.resolve(false);
        assert_eq!(fut.try_value(), Some(true));
    }

    #[test]
    fn clones_share_identity() {
        let fut = RenderFuture::pending();
        let clone = fut.clone();
        assert!(fut.same_future(&clone));
        assert!(!fut.same_future(&RenderFuture::pending()));
    }

    #[test]
    fn wait_timeout_expires_when_unresolved() {
        let fut = RenderFuture::pending();
        assert_eq!(fut.wait_timeout(Duration::from_millis(5)), None);
    }
}
