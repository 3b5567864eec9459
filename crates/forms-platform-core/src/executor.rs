//! Drives futures to completion on the main thread.
//!
//! Host timer primitives only accept synchronous handlers, so suspending work
//! is wrapped in a task that is polled through [`MainThreadDispatcher::post`].
//! Waking the task from any thread re-posts a single poll.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_task::{waker_ref, ArcWake};
use parking_lot::Mutex;

use crate::platform::MainThreadDispatcher;

type MainThreadFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Spawn `future` onto the main thread. The first poll is always posted, so
/// this never runs user code on the caller's stack.
pub fn spawn_on_main_thread<F>(dispatcher: Arc<dyn MainThreadDispatcher>, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = Arc::new(MainThreadTask {
        future: Mutex::new(Some(Box::pin(future))),
        queued: AtomicBool::new(false),
        dispatcher,
    });
    task.schedule();
}

struct MainThreadTask {
    future: Mutex<Option<MainThreadFuture>>,
    queued: AtomicBool,
    dispatcher: Arc<dyn MainThreadDispatcher>,
}

impl MainThreadTask {
    fn schedule(self: &Arc<Self>) {
        if self.queued.swap(true, Ordering::AcqRel) {
            return;
        }
        let task = Arc::clone(self);
        self.dispatcher.post(Box::new(move || task.poll()));
    }

    fn poll(self: &Arc<Self>) {
        self.queued.store(false, Ordering::Release);
        // Polls are serialized by the main thread, so the slot is only empty
        // here once the future has completed (or unwound out of a poll).
        let Some(mut future) = self.future.lock().take() else {
            return;
        };
        let waker = waker_ref(self);
        let mut cx = Context::from_waker(&waker);
        if let Poll::Pending = future.as_mut().poll(&mut cx) {
            *self.future.lock() = Some(future);
        }
    }
}

impl ArcWake for MainThreadTask {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.schedule();
    }
}

#[cfg(test)]
#[path = "tests/executor_tests.rs"]
mod tests;
