//! Fixed-cadence frame ticker driving animation listeners.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::PlatformError;
use crate::timer::{TimerHandle, Timers};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickerListenerId(u64);

/// Listener invoked once per frame with the frame time in nanoseconds since
/// the ticker was created. Returning `false` unregisters it.
type TickerListener = Box<dyn FnMut(u64) -> bool + Send + 'static>;

struct ListenerEntry {
    id: TickerListenerId,
    callback: TickerListener,
}

#[derive(Default)]
struct Listeners {
    entries: Vec<ListenerEntry>,
    // Removals requested while `entries` is lent out to a broadcast.
    removed: Vec<TickerListenerId>,
    broadcasting: bool,
}

enum TickerState {
    Disabled,
    Enabled(TimerHandle),
}

impl TickerState {
    /// The timer may have been released behind the ticker's back, for
    /// example by [`Timers::cancel_all`].
    fn is_running(&self) -> bool {
        match self {
            TickerState::Enabled(timer) => timer.is_active(),
            TickerState::Disabled => false,
        }
    }
}

struct TickerInner {
    timers: Timers,
    interval: Duration,
    started_at: Instant,
    state: Mutex<TickerState>,
    listeners: Mutex<Listeners>,
    next_listener_id: AtomicU64,
    frames: AtomicU64,
}

impl TickerInner {
    fn enable(self: &Arc<Self>) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.is_running() {
            return Ok(());
        }
        let ticker = Arc::downgrade(self);
        let timer = self
            .timers
            .start_timer(self.interval, move || tick(&ticker))?;
        log::debug!("ticker enabled every {:?}", self.interval);
        *state = TickerState::Enabled(timer);
        Ok(())
    }

    fn disable(&self) -> Result<(), PlatformError> {
        Self::disarm(&mut self.state.lock())
    }

    /// Disable only if no listener is registered by the time the state lock
    /// is held, so a concurrent first insert is never stranded.
    fn disable_if_idle(&self) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        let idle = {
            let listeners = self.listeners.lock();
            !listeners.broadcasting && listeners.entries.is_empty()
        };
        if !idle {
            return Ok(());
        }
        Self::disarm(&mut state)
    }

    fn disarm(state: &mut TickerState) -> Result<(), PlatformError> {
        match std::mem::replace(state, TickerState::Disabled) {
            TickerState::Enabled(timer) => {
                log::debug!("ticker disabled");
                timer.cancel()
            }
            TickerState::Disabled => Ok(()),
        }
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().is_running()
    }

    fn send_signals(self: &Arc<Self>) {
        let frame_time = frame_nanos(self.started_at.elapsed());
        let mut batch = {
            let mut listeners = self.listeners.lock();
            listeners.broadcasting = true;
            std::mem::take(&mut listeners.entries)
        };
        let had_listeners = !batch.is_empty();
        batch.retain_mut(|entry| {
            if self.listeners.lock().removed.contains(&entry.id) {
                return false;
            }
            (entry.callback)(frame_time)
        });
        let idle = {
            let mut listeners = self.listeners.lock();
            listeners.broadcasting = false;
            let removed = std::mem::take(&mut listeners.removed);
            batch.retain(|entry| !removed.contains(&entry.id));
            let inserted = std::mem::replace(&mut listeners.entries, batch);
            listeners.entries.extend(inserted);
            had_listeners && listeners.entries.is_empty()
        };
        self.frames.fetch_add(1, Ordering::Relaxed);
        if idle {
            if let Err(err) = self.disable_if_idle() {
                log::error!("failed to disable idle ticker: {err}");
            }
        }
    }
}

impl Drop for TickerInner {
    fn drop(&mut self) {
        if let Err(err) = self.disable() {
            log::error!("failed to disable dropped ticker: {err}");
        }
    }
}

fn frame_nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

fn tick(ticker: &Weak<TickerInner>) -> bool {
    match ticker.upgrade() {
        Some(inner) => {
            inner.send_signals();
            true
        }
        None => false,
    }
}

/// Frame clock for animations.
///
/// The ticker starts out disabled. It is enabled explicitly or by inserting
/// the first listener, and disables itself once the last listener is gone.
/// Frames are always delivered on the main thread and never while disabled.
#[derive(Clone)]
pub struct Ticker {
    inner: Arc<TickerInner>,
}

impl Ticker {
    pub fn new(timers: Timers, interval: Duration) -> Result<Self, PlatformError> {
        if interval.is_zero() {
            return Err(PlatformError::InvalidInterval { interval });
        }
        Ok(Self {
            inner: Arc::new(TickerInner {
                timers,
                interval,
                started_at: Instant::now(),
                state: Mutex::new(TickerState::Disabled),
                listeners: Mutex::new(Listeners::default()),
                next_listener_id: AtomicU64::new(1),
                frames: AtomicU64::new(0),
            }),
        })
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn enable(&self) -> Result<(), PlatformError> {
        self.inner.enable()
    }

    pub fn disable(&self) -> Result<(), PlatformError> {
        self.inner.disable()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    /// Register a frame listener. The first listener enables the ticker.
    ///
    /// A listener inserted from inside a frame starts receiving frames from
    /// the next firing.
    pub fn insert(
        &self,
        listener: impl FnMut(u64) -> bool + Send + 'static,
    ) -> Result<TickerListenerId, PlatformError> {
        let id = TickerListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let first = {
            let mut listeners = self.inner.listeners.lock();
            listeners.entries.push(ListenerEntry {
                id,
                callback: Box::new(listener),
            });
            !listeners.broadcasting && listeners.entries.len() == 1
        };
        if first {
            if let Err(err) = self.inner.enable() {
                self.inner
                    .listeners
                    .lock()
                    .entries
                    .retain(|entry| entry.id != id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Unregister a listener. Removing the last one disables the ticker.
    pub fn remove(&self, id: TickerListenerId) -> Result<bool, PlatformError> {
        let (found, idle) = {
            let mut listeners = self.inner.listeners.lock();
            let before = listeners.entries.len();
            listeners.entries.retain(|entry| entry.id != id);
            let mut found = listeners.entries.len() != before;
            if !found && listeners.broadcasting && !listeners.removed.contains(&id) {
                listeners.removed.push(id);
                found = true;
            }
            (found, !listeners.broadcasting && listeners.entries.is_empty())
        };
        if found && idle {
            self.inner.disable_if_idle()?;
        }
        Ok(found)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().entries.len()
    }

    /// Number of frames broadcast since creation.
    pub fn frames_delivered(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker")
            .field("interval", &self.inner.interval)
            .field("enabled", &self.is_enabled())
            .field("frames", &self.frames_delivered())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/ticker_tests.rs"]
mod tests;
