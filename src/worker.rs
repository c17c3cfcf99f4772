use crate::rb::BoundedBuffer;
use crate::sync::{CancelToken, TimeoutIterator};
use rand::Rng;
use std::{
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Scale constant for the consumer's exit rate report. Informal
/// reporting convention, not a unit contract.
const RATE_SCALE: f64 = 10000.0;

/// Upper bound (exclusive) of the producer's value distribution.
const VALUE_BOUND: i32 = 100;

/// Upper bound (exclusive) of the random pause between operations, in
/// milliseconds.
const PAUSE_BOUND_MS: u64 = 100;

const WATCH_PERIOD: Duration = Duration::from_secs(1);

struct DoneFlag {
    done: Mutex<bool>,
    cond: Condvar,
}

/// Handle to a spawned worker loop.
///
/// Dropping the handle detaches the thread; the driver is only required
/// to signal cancellation, not to wait for the loop to unwind.
pub struct WorkerHandle {
    thread: JoinHandle<()>,
    token: CancelToken,
    done: Arc<DoneFlag>,
}

impl WorkerHandle {
    /// Signals the worker to stop, waking it out of any buffer wait or
    /// timed sleep it is currently parked in.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits until the worker loop finishes or `timeout` expires.
    ///
    /// Returns `true` if the loop finished. Expiry is an expected
    /// outcome, not an error.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.done.done.lock().unwrap();
        for remaining in TimeoutIterator::new(Some(timeout)) {
            if *done {
                return true;
            }
            done = match remaining {
                Some(t) => self.done.cond.wait_timeout(done, t).unwrap().0,
                None => self.done.cond.wait(done).unwrap(),
            };
        }
        *done
    }

    /// Joins the underlying thread.
    pub fn join(self) {
        let _ = self.thread.join();
    }
}

fn spawn_loop<F>(token: CancelToken, body: F) -> WorkerHandle
where
    F: FnOnce(&CancelToken) + Send + 'static,
{
    let done = Arc::new(DoneFlag {
        done: Mutex::new(false),
        cond: Condvar::new(),
    });
    let thread = thread::spawn({
        let token = token.clone();
        let done = done.clone();
        move || {
            body(&token);
            let mut flag = done.done.lock().unwrap();
            *flag = true;
            done.cond.notify_all();
        }
    });
    WorkerHandle {
        thread,
        token,
        done,
    }
}

/// Wires `token` so that cancelling it wakes threads parked inside the
/// buffer's blocking calls.
fn wake_buffer_on_cancel<T: Send + 'static>(buffer: &Arc<BoundedBuffer<T>>, token: &CancelToken) {
    let buffer = buffer.clone();
    token.register_waker(move || buffer.wake_all());
}

/// Spawns a producer: inserts uniform random values in `[0, 100)`,
/// pausing a uniform random `[0, 100)` ms between inserts, until
/// cancelled.
pub fn spawn_producer(buffer: Arc<BoundedBuffer<i32>>, token: CancelToken) -> WorkerHandle {
    wake_buffer_on_cancel(&buffer, &token);
    spawn_loop(token, move |token| {
        let mut rng = rand::rng();
        loop {
            let value = rng.random_range(0..VALUE_BOUND);
            if buffer.insert(value, token).is_err() {
                break;
            }
            let pause = Duration::from_millis(rng.random_range(0..PAUSE_BOUND_MS));
            if !token.sleep(pause) {
                break;
            }
        }
        log::info!("goodbye from producer");
    })
}

/// Spawns a consumer: removes items with random pauses until cancelled,
/// then reports the average removal rate since it was spawned.
pub fn spawn_consumer(buffer: Arc<BoundedBuffer<i32>>, token: CancelToken) -> WorkerHandle {
    wake_buffer_on_cancel(&buffer, &token);
    let start = Instant::now();
    spawn_loop(token, move |token| {
        let mut rng = rand::rng();
        loop {
            if buffer.remove(token).is_err() {
                break;
            }
            let pause = Duration::from_millis(rng.random_range(0..PAUSE_BOUND_MS));
            if !token.sleep(pause) {
                break;
            }
        }
        let elapsed_ms = start.elapsed().as_millis().max(1) as f64;
        let rate = buffer.removed_count() as f64 / elapsed_ms * RATE_SCALE;
        log::info!("goodbye from consumer");
        log::info!("average removal rate: {rate:.1}");
    })
}

/// Spawns a watcher: logs the buffer's counter snapshot once per second
/// until cancelled. Reacts to cancellation mid-sleep.
pub fn spawn_watcher<T: Send + 'static>(
    buffer: Arc<BoundedBuffer<T>>,
    token: CancelToken,
) -> WorkerHandle {
    // The watcher never blocks on buffer state, so no waker is needed.
    spawn_loop(token, move |token| {
        loop {
            let snapshot = buffer.snapshot();
            log::info!("delta = {} occupied = {}", snapshot.delta, snapshot.occupied);
            if !token.sleep(WATCH_PERIOD) {
                break;
            }
        }
        log::info!("watcher exiting");
    })
}
