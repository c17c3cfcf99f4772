//! Bounded blocking FIFO buffer.
//!
//! [`BoundedBuffer`] is a monitor-style fixed-capacity queue: `insert`
//! blocks while the buffer is full, `remove` blocks while it is empty,
//! and both can be interrupted through a [`CancelToken`]. The [`worker`]
//! module provides the classic producer/consumer/watcher loops on top of
//! it, driven by the `boundbuf` binary.

pub mod rb;
pub mod sync;
pub mod worker;

pub use rb::{BoundedBuffer, Snapshot};
pub use sync::{CancelToken, Cancelled};
pub use worker::{spawn_consumer, spawn_producer, spawn_watcher, WorkerHandle};
