use boundbuf::{spawn_consumer, spawn_producer, spawn_watcher, BoundedBuffer, CancelToken};
use env_logger::{Env, Target};
use std::{sync::Arc, time::Duration};

const CAPACITY: usize = 30;
const RUN_WINDOW: Duration = Duration::from_secs(60);

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();

    let buffer = Arc::new(BoundedBuffer::new(CAPACITY));

    let consumer = spawn_consumer(buffer.clone(), CancelToken::new());
    let producer = spawn_producer(buffer.clone(), CancelToken::new());
    let watcher = spawn_watcher(buffer, CancelToken::new());

    if !watcher.join_timeout(RUN_WINDOW) {
        log::info!("run window elapsed, shutting down");
    }

    // Signal only; the workers print their farewells on their way out and
    // the process does not wait for them to unwind.
    watcher.cancel();
    consumer.cancel();
    producer.cancel();
}
