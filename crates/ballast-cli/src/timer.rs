//! The periodic tick producer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use ballast_tui::EventQueue;

/// Spawns a thread that submits `tick` to the loop every `interval`.
///
/// The thread exits on its own once the queue is stopped or dropped.
pub fn spawn_timer<C, F>(
    queue: &Arc<EventQueue<C>>,
    interval: Duration,
    tick: F,
) where
    C: 'static,
    F: Fn(&mut C) + Send + Sync + 'static,
{
    let queue: Weak<EventQueue<C>> = Arc::downgrade(queue);
    let tick = Arc::new(tick);

    std::thread::Builder::new()
        .name("timer".to_string())
        .spawn(move || loop {
            std::thread::sleep(interval);
            let Some(queue) = queue.upgrade() else {
                return;
            };
            if queue.is_stopped() {
                return;
            }
            let tick = tick.clone();
            queue.submit(move |ctx| tick(ctx));
        })
        .expect("failed to spawn timer thread");
}
