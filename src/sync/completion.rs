//! # Single-use completion signal.
//!
//! [`completion`] creates a linked [`Resolver`] / [`Waiter`] pair. The resolver
//! side may be cloned and handed to several racing parties (e.g. the callback
//! runtime and a host cancellation); the first `resolve` wins.
//!
//! ```text
//!  runtime thread ──resolve(Success)──┐
//!                                     ├─► [slot] ──► Waiter::wait / wait_blocking
//!  host cancel    ──resolve(Failure)──┘   (first wins, value buffered)
//! ```
//!
//! ## Rules
//! - `resolve` never blocks and returns `true` only for the winning call.
//! - A value resolved before anyone waits is buffered, not lost.
//! - If every resolver is dropped unresolved, the waiter returns `None`.
//! - One waiter per signal (it is consumed by waiting).
//!
//! # Example
//! ```rust
//! use taskbridge::sync::{completion, Outcome};
//!
//! let (resolver, waiter) = completion::<Outcome>();
//! let racer = resolver.clone();
//!
//! assert!(resolver.resolve(Outcome::Success));
//! assert!(!racer.resolve(Outcome::Failure));
//! assert_eq!(waiter.wait_blocking(), Some(Outcome::Success));
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Result reported by a callback execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Retry,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Retry => "retry",
            Outcome::Failure => "failure",
        }
    }
}

struct Slot<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

/// Creates a linked resolver/waiter pair.
pub fn completion<T>() -> (Resolver<T>, Waiter<T>) {
    let (tx, rx) = oneshot::channel();
    let resolver = Resolver {
        slot: Arc::new(Slot {
            tx: Mutex::new(Some(tx)),
        }),
    };
    (resolver, Waiter { rx })
}

/// Resolving side; cheap to clone.
pub struct Resolver<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Resolver<T> {
    /// Resolves the signal; returns `false` if it was already resolved.
    ///
    /// The value is kept even if the waiter is gone or has not started waiting.
    pub fn resolve(&self, value: T) -> bool {
        let Some(tx) = self.slot.tx.lock().take() else {
            return false;
        };
        let _ = tx.send(value);
        true
    }

    /// True once any clone has resolved the signal.
    pub fn is_resolved(&self) -> bool {
        self.slot.tx.lock().is_none()
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Waiting side; consumed by waiting.
#[derive(Debug)]
pub struct Waiter<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Waiter<T> {
    /// Suspends until resolved; `None` if abandoned.
    pub async fn wait(self) -> Option<T> {
        self.rx.await.ok()
    }

    /// Blocks the current thread until resolved; `None` if abandoned.
    ///
    /// Must not be called from an async task (use [`Waiter::wait`] there).
    pub fn wait_blocking(self) -> Option<T> {
        self.rx.blocking_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn first_resolution_wins() {
        let (resolver, waiter) = completion();
        assert!(resolver.resolve(Outcome::Retry));
        assert!(!resolver.resolve(Outcome::Success));
        assert!(resolver.is_resolved());
        assert_eq!(waiter.wait_blocking(), Some(Outcome::Retry));
    }

    #[tokio::test]
    async fn resolution_before_wait_is_not_lost() {
        let (resolver, waiter) = completion();
        resolver.resolve(Outcome::Success);
        drop(resolver);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(waiter.wait().await, Some(Outcome::Success));
    }

    #[test]
    fn abandoned_signal_yields_none() {
        let (resolver, waiter) = completion::<Outcome>();
        let clone = resolver.clone();
        drop(resolver);
        drop(clone);
        assert_eq!(waiter.wait_blocking(), None);
    }

    #[test]
    fn concurrent_resolvers_produce_one_winner() {
        for _ in 0..50 {
            let (resolver, waiter) = completion();
            let wins = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = [Outcome::Success, Outcome::Failure, Outcome::Retry]
                .into_iter()
                .map(|outcome| {
                    let resolver = resolver.clone();
                    let wins = Arc::clone(&wins);
                    thread::spawn(move || {
                        if resolver.resolve(outcome) {
                            wins.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            assert_eq!(wins.load(Ordering::SeqCst), 1);
            assert!(waiter.wait_blocking().is_some());
        }
    }

    #[test]
    fn blocking_waiter_wakes_on_late_resolution() {
        let (resolver, waiter) = completion();
        let t = thread::spawn(move || waiter.wait_blocking());
        thread::sleep(Duration::from_millis(20));
        resolver.resolve(7u32);
        assert_eq!(t.join().unwrap(), Some(7));
    }
}
