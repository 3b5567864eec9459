use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use forms_platform_core::{MainThreadAction, MainThreadDispatcher};

enum LoopMessage {
    Run(MainThreadAction),
    Quit,
}

/// Why a bounded run of the main loop returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// A quit request was consumed.
    Quit,
    /// The caller's completion condition became true.
    Done,
    TimedOut,
}

/// Dispatcher feeding a [`StdMainLoop`] through an mpsc channel.
pub struct StdDispatcher {
    main_thread: ThreadId,
    sender: Sender<LoopMessage>,
    closed: AtomicBool,
}

impl MainThreadDispatcher for StdDispatcher {
    fn post(&self, action: MainThreadAction) {
        if self.sender.send(LoopMessage::Run(action)).is_err() {
            if self.closed.load(Ordering::Acquire) {
                log::debug!("main loop shut down; dropping posted action");
                return;
            }
            panic!("main loop receiver vanished while still accepting work");
        }
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    fn quit(&self) {
        if self.sender.send(LoopMessage::Quit).is_err() {
            log::debug!("quit requested after main loop shut down");
        }
    }
}

impl fmt::Debug for StdDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdDispatcher")
            .field("main_thread", &self.main_thread)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

/// Main loop bound to the thread that created it.
///
/// The loop is `!Send`, so it can only ever be driven from the thread its
/// dispatcher reports as the main thread.
pub struct StdMainLoop {
    receiver: Receiver<LoopMessage>,
    dispatcher: Arc<StdDispatcher>,
    _not_send: PhantomData<*const ()>,
}

impl StdMainLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            receiver,
            dispatcher: Arc::new(StdDispatcher {
                main_thread: thread::current().id(),
                sender,
                closed: AtomicBool::new(false),
            }),
            _not_send: PhantomData,
        }
    }

    pub fn dispatcher(&self) -> Arc<StdDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Run posted actions until [`MainThreadDispatcher::quit`] is called.
    pub fn run(&self) {
        while let Ok(message) = self.receiver.recv() {
            match message {
                LoopMessage::Run(action) => action(),
                LoopMessage::Quit => return,
            }
        }
    }

    /// Run posted actions for at most `duration`.
    pub fn run_for(&self, duration: Duration) -> LoopExit {
        self.run_until(duration, || false)
    }

    /// Run posted actions until `done` returns true, a quit arrives, or
    /// `timeout` elapses. `done` is checked before waiting and after every
    /// action.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> LoopExit {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return LoopExit::Done;
            }
            let now = Instant::now();
            if now >= deadline {
                return LoopExit::TimedOut;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(LoopMessage::Run(action)) => action(),
                Ok(LoopMessage::Quit) | Err(RecvTimeoutError::Disconnected) => {
                    return LoopExit::Quit
                }
                Err(RecvTimeoutError::Timeout) => return LoopExit::TimedOut,
            }
        }
    }

    /// Run everything already queued without blocking. A queued quit request
    /// stops the drain and is consumed.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                LoopMessage::Run(action) => {
                    action();
                    ran += 1;
                }
                LoopMessage::Quit => break,
            }
        }
        ran
    }
}

impl Default for StdMainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StdMainLoop {
    fn drop(&mut self) {
        self.dispatcher.closed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for StdMainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdMainLoop")
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
