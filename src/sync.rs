use core::time::Duration;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    time::Instant,
};
use thiserror::Error;

/// Error returned from a blocking call that was interrupted by cancellation.
///
/// This is not a failure of the buffer itself: the pending operation was
/// simply abandoned before mutating any state. Worker loops treat it as
/// their signal to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("blocking operation cancelled")]
pub struct Cancelled;

/// Yields the remaining part of `timeout` on each iteration, or `None`
/// items forever when no timeout is set.
///
/// Iteration ends when the timeout is exhausted, so a condition-wait loop
/// driven by it never over-waits across spurious wakeups.
#[derive(Clone, Debug)]
pub struct TimeoutIterator {
    start: Instant,
    timeout: Option<Duration>,
}

impl TimeoutIterator {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }
}

impl Iterator for TimeoutIterator {
    type Item = Option<Duration>;
    fn next(&mut self) -> Option<Self::Item> {
        match self.timeout {
            Some(dur) => {
                let elapsed = self.start.elapsed();
                if dur > elapsed {
                    Some(Some(dur - elapsed))
                } else {
                    None
                }
            }
            None => Some(None),
        }
    }
}

struct Shared {
    cancelled: AtomicBool,
    wakers: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
    sleeper: Mutex<()>,
    alarm: Condvar,
}

/// Cooperative cancellation signal shared between a worker loop and
/// whoever shuts it down.
///
/// The token itself only carries a flag and a timed sleep; delivery into a
/// *blocking* call is done by registering a waker that broadcasts the wait
/// queue the target may be parked on (see
/// [`BoundedBuffer::wake_all`](crate::BoundedBuffer::wake_all)). A waiter
/// that re-checks [`is_cancelled`](Self::is_cancelled) under the lock it
/// waits with cannot miss the signal: `cancel` sets the flag before
/// running wakers.
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                wakers: Mutex::new(Vec::new()),
                sleeper: Mutex::new(()),
                alarm: Condvar::new(),
            }),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Delivers the signal: sets the flag, runs all registered wakers and
    /// interrupts any sleep in progress. Subsequent calls are no-ops.
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        for waker in self.shared.wakers.lock().unwrap().iter() {
            waker();
        }
        let _guard = self.shared.sleeper.lock().unwrap();
        self.shared.alarm.notify_all();
    }

    /// Registers a hook that `cancel` runs after setting the flag.
    ///
    /// If the token is already cancelled the hook runs immediately instead
    /// of being stored.
    pub fn register_waker<F: Fn() + Send + Sync + 'static>(&self, f: F) {
        let mut wakers = self.shared.wakers.lock().unwrap();
        if self.shared.cancelled.load(Ordering::SeqCst) {
            drop(wakers);
            f();
            return;
        }
        wakers.push(Box::new(f));
    }

    /// Sleeps for `timeout` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the sleep
    /// was cut short by cancellation.
    pub fn sleep(&self, timeout: Duration) -> bool {
        let mut guard = self.shared.sleeper.lock().unwrap();
        for remaining in TimeoutIterator::new(Some(timeout)) {
            if self.is_cancelled() {
                return false;
            }
            guard = match remaining {
                Some(t) => self.shared.alarm.wait_timeout(guard, t).unwrap().0,
                None => self.shared.alarm.wait(guard).unwrap(),
            };
        }
        !self.is_cancelled()
    }
}
