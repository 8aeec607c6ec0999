//! The cross-thread event queue and its cooperative loop.
//!
//! Producers (keyboard reader, resize bridge, timer, subprocess
//! threads) only ever `post` events or `submit` closures; the single
//! loop thread owns the context `C` and is the only place any of it
//! mutates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Condvar, Mutex};

use crate::error::{Result, TuiError};
use crate::event::Event;

/// A deferred action executed on the loop thread.
pub type Task<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Result type the loop handler returns; errors are logged and the
/// loop continues.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error>>;

enum Item<C> {
    Event(Event),
    Task(Task<C>),
    Stop,
}

/// FIFO mailbox feeding the event loop.
///
/// `C` is the loop context: the application state submitted closures
/// receive by `&mut`.
pub struct EventQueue<C> {
    items: Mutex<VecDeque<Item<C>>>,
    available: Condvar,
    running: AtomicBool,
    stopped: AtomicBool,
}

impl<C> Default for EventQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventQueue<C> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Enqueues an event from any thread. Discarded after [`stop`].
    ///
    /// [`stop`]: EventQueue::stop
    pub fn post(&self, event: Event) {
        self.push(Item::Event(event));
    }

    /// Enqueues a closure to run on the loop thread, after everything
    /// already in the queue. Discarded after [`stop`].
    ///
    /// [`stop`]: EventQueue::stop
    pub fn submit(&self, task: impl FnOnce(&mut C) + Send + 'static) {
        self.push(Item::Task(Box::new(task)));
    }

    fn push(&self, item: Item<C>) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        self.items.lock().unwrap().push_back(item);
        self.available.notify_one();
    }

    /// Blocks until everything enqueued so far has been consumed.
    ///
    /// Implemented as a fence closure; must be called from a producer
    /// thread, never from the loop itself. Returns immediately once
    /// the queue is stopped.
    pub fn await_empty(&self) {
        let (tx, rx) = mpsc::channel();
        self.submit(move |_| {
            let _ = tx.send(());
        });
        // A cleared queue drops the sender, which also unblocks us.
        let _ = rx.recv();
    }

    /// Clears the queue and posts the stop sentinel. Items already
    /// dequeued by the loop may still run; everything else is dropped.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut items = self.items.lock().unwrap();
        items.clear();
        items.push_back(Item::Stop);
        self.available.notify_one();
    }

    /// Whether [`stop`] has been called.
    ///
    /// [`stop`]: EventQueue::stop
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Runs the event loop until [`stop`] or an [`Event::Error`].
    ///
    /// Items are consumed FIFO. Submitted closures run inline; other
    /// events go to `handler`, whose errors are logged without
    /// stopping the loop. [`Event::QueueEmpty`] is synthesized once
    /// each time the loop is about to block.
    ///
    /// # Errors
    ///
    /// [`TuiError::LoopBusy`] on re-entry, [`TuiError::Aborted`] when
    /// a producer posted an [`Event::Error`].
    ///
    /// [`stop`]: EventQueue::stop
    pub fn run_loop(
        &self,
        ctx: &mut C,
        mut handler: impl FnMut(&mut C, Event) -> HandlerResult,
    ) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TuiError::LoopBusy);
        }
        let result = self.drive(ctx, &mut handler);
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn drive(
        &self,
        ctx: &mut C,
        handler: &mut impl FnMut(&mut C, Event) -> HandlerResult,
    ) -> Result<()> {
        let mut announced_empty = false;

        loop {
            let item = self.items.lock().unwrap().pop_front();
            match item {
                Some(Item::Stop) => return Ok(()),
                Some(Item::Task(task)) => {
                    announced_empty = false;
                    task(ctx);
                }
                Some(Item::Event(Event::Error(cause))) => {
                    return Err(TuiError::Aborted(cause));
                }
                Some(Item::Event(event)) => {
                    announced_empty = false;
                    Self::dispatch(ctx, handler, event);
                }
                None => {
                    if !announced_empty {
                        announced_empty = true;
                        // The repaint hook; it may enqueue more work,
                        // so go around once more before blocking.
                        Self::dispatch(ctx, handler, Event::QueueEmpty);
                        continue;
                    }
                    let mut items = self.items.lock().unwrap();
                    while items.is_empty() {
                        items = self.available.wait(items).unwrap();
                    }
                }
            }
        }
    }

    fn dispatch(
        ctx: &mut C,
        handler: &mut impl FnMut(&mut C, Event) -> HandlerResult,
        event: Event,
    ) {
        if let Err(err) = handler(ctx, event) {
            tracing::error!("event handler failed: {err}");
        }
    }
}
