use crate::sync::{CancelToken, Cancelled};
use core::num::NonZeroUsize;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Diagnostic view of the buffer counters, taken atomically under the
/// buffer lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// `total inserted - total removed - occupied`.
    ///
    /// Zero whenever the counters are consistent; any other value
    /// indicates a synchronization bug, not a runtime condition.
    pub delta: i64,
    /// Number of occupied slots at the time of the snapshot.
    pub occupied: usize,
}

struct State<T> {
    slots: Box<[Option<T>]>,
    /// Next slot to read. In `0..capacity`.
    head: usize,
    /// Next slot to write. In `0..capacity`.
    tail: usize,
    len: usize,
    total_inserted: u64,
    total_removed: u64,
}

impl<T> State<T> {
    fn push(&mut self, item: T) {
        let prev = self.slots[self.tail].replace(item);
        debug_assert!(prev.is_none());
        self.tail = (self.tail + 1) % self.slots.len();
        self.len += 1;
        self.total_inserted += 1;
        self.check();
    }

    fn pop(&mut self) -> T {
        let item = self.slots[self.head].take().unwrap();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        self.total_removed += 1;
        self.check();
        item
    }

    fn check(&self) {
        debug_assert!(self.len <= self.slots.len());
        debug_assert!(self.head < self.slots.len());
        debug_assert!(self.tail < self.slots.len());
        debug_assert_eq!(self.total_inserted - self.total_removed, self.len as u64);
    }
}

/// Fixed-capacity FIFO buffer with blocking insert/remove.
///
/// The buffer is a monitor: all state lives behind one mutex, and at most
/// one thread executes inside [`insert`](Self::insert),
/// [`remove`](Self::remove) or [`snapshot`](Self::snapshot) at a time.
/// A thread waiting for room or data releases the lock while parked and
/// re-checks its condition after every wakeup.
///
/// State transitions that may satisfy waiters use a broadcast wake:
/// becoming non-empty wakes *all* blocked removers, leaving the full state
/// wakes *all* blocked inserters. Any woken thread may win the race to
/// reacquire the lock, so no individual waiter's progress is guaranteed
/// under sustained contention.
///
/// Items are removed in the order they were physically written. With a
/// single producer that is insertion order; with several producers only
/// the global write order is preserved.
pub struct BoundedBuffer<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: NonZeroUsize,
}

impl<T> BoundedBuffer<T> {
    /// Creates a buffer with `capacity` slots.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("capacity must be non-zero");
        Self {
            state: Mutex::new(State {
                slots: (0..capacity.get()).map(|_| None).collect(),
                head: 0,
                tail: 0,
                len: 0,
                total_inserted: 0,
                total_removed: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Poisoning implies a panic inside the monitor, i.e. a defect.
        self.state.lock().unwrap()
    }

    /// Capacity of the buffer.
    ///
    /// It is constant during the whole buffer lifetime.
    #[inline]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// The number of items stored in the buffer.
    ///
    /// *The result may become irrelevant at any time because of concurring
    /// producer or consumer activity.*
    pub fn occupied_len(&self) -> usize {
        self.lock().len
    }

    /// The number of remaining free slots in the buffer.
    ///
    /// *The result may become irrelevant at any time because of concurring
    /// producer or consumer activity.*
    pub fn vacant_len(&self) -> usize {
        self.capacity.get() - self.lock().len
    }

    /// Checks if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.occupied_len() == 0
    }

    /// Checks if the buffer is full.
    pub fn is_full(&self) -> bool {
        self.occupied_len() == self.capacity.get()
    }

    /// Inserts an item, blocking while the buffer is full.
    ///
    /// If `token` is cancelled while this call is blocked (or before it
    /// proceeds) the item is dropped and `Err(Cancelled)` is returned
    /// without mutating the buffer. For the signal to reach a parked
    /// waiter, [`wake_all`](Self::wake_all) must run on delivery — worker
    /// spawns register it as the token's waker.
    pub fn insert(&self, item: T, token: &CancelToken) -> Result<(), Cancelled> {
        let mut state = self.lock();
        loop {
            if token.is_cancelled() {
                return Err(Cancelled);
            }
            if state.len < self.capacity.get() {
                break;
            }
            state = self.not_full.wait(state).unwrap();
        }
        let was_empty = state.len == 0;
        state.push(item);
        if was_empty {
            self.not_empty.notify_all();
        }
        Ok(())
    }

    /// Removes the oldest item, blocking while the buffer is empty.
    ///
    /// Returns `Err(Cancelled)` if `token` fires first; no item is
    /// consumed in that case.
    pub fn remove(&self, token: &CancelToken) -> Result<T, Cancelled> {
        let mut state = self.lock();
        loop {
            if token.is_cancelled() {
                return Err(Cancelled);
            }
            if state.len > 0 {
                break;
            }
            state = self.not_empty.wait(state).unwrap();
        }
        let was_full = state.len == self.capacity.get();
        let item = state.pop();
        if was_full {
            self.not_full.notify_all();
        }
        Ok(item)
    }

    /// Non-blocking insert. Returns the item back if the buffer is full.
    pub fn try_insert(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.len == self.capacity.get() {
            return Err(item);
        }
        let was_empty = state.len == 0;
        state.push(item);
        if was_empty {
            self.not_empty.notify_all();
        }
        Ok(())
    }

    /// Non-blocking remove. Returns `None` if the buffer is empty.
    pub fn try_remove(&self) -> Option<T> {
        let mut state = self.lock();
        if state.len == 0 {
            return None;
        }
        let was_full = state.len == self.capacity.get();
        let item = state.pop();
        if was_full {
            self.not_full.notify_all();
        }
        Some(item)
    }

    /// Counter snapshot for diagnostics. Never blocks on buffer state.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            delta: state.total_inserted as i64 - state.total_removed as i64 - state.len as i64,
            occupied: state.len,
        }
    }

    /// Total number of items removed over the buffer lifetime.
    pub fn removed_count(&self) -> u64 {
        self.lock().total_removed
    }

    /// Broadcasts both wait queues so every parked `insert`/`remove`
    /// caller re-checks its condition (and its cancellation token).
    ///
    /// Taking the lock first closes the window where a waiter has checked
    /// its token but not yet parked.
    pub fn wake_all(&self) {
        let _state = self.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}
