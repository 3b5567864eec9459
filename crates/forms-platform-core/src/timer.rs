//! Repeating timers whose callbacks run on the main thread.
//!
//! A timer is armed as a host alarm. Every firing tries to claim the timer's
//! `invoking` flag; a firing that finds an invocation still in flight is
//! skipped, so a single timer never runs two callbacks at once. Callbacks that
//! return `false` (directly or once their future settles) release the alarm.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::error::PlatformError;
use crate::executor::spawn_on_main_thread;
use crate::platform::{AlarmHandler, AlarmHost, AlarmId, MainThreadDispatcher};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

struct TimerState {
    id: TimerId,
    interval: Duration,
    invoking: AtomicBool,
    released: AtomicBool,
    /// Outcome of the last settled suspending invocation.
    last_result: AtomicBool,
    alarm: Mutex<Option<AlarmId>>,
    // Weak so an alarm handler stored inside its host never keeps the host
    // alive.
    alarms: Weak<dyn AlarmHost>,
    owner: Weak<TimersInner>,
}

impl TimerState {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn try_begin_invoke(self: &Arc<Self>) -> Option<InvokeGuard> {
        if self.is_released() {
            return None;
        }
        self.invoking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InvokeGuard {
                state: Arc::clone(self),
            })
    }

    fn attach_alarm(&self, alarm: AlarmId) -> Result<(), PlatformError> {
        let mut slot = self.alarm.lock();
        if self.is_released() {
            // Cancelled before the host handed back the alarm id.
            drop(slot);
            return self.disarm(alarm);
        }
        *slot = Some(alarm);
        Ok(())
    }

    fn release(&self) -> Result<(), PlatformError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.forget(self.id);
        }
        let alarm = self.alarm.lock().take();
        log::debug!("{} released", self.id);
        match alarm {
            Some(alarm) => self.disarm(alarm),
            None => Ok(()),
        }
    }

    fn disarm(&self, alarm: AlarmId) -> Result<(), PlatformError> {
        match self.alarms.upgrade() {
            Some(alarms) => alarms.disarm(alarm),
            // The host is gone and took its alarms with it.
            None => Ok(()),
        }
    }

    /// Release from a callback continuation, where there is no caller to
    /// hand the error back to.
    fn release_from_callback(&self) {
        if let Err(err) = self.release() {
            log::error!("failed to release {}: {err}", self.id);
        }
    }
}

/// Holds a timer's `invoking` flag; dropping it lets the next firing invoke
/// the callback again, including when the callback unwinds.
struct InvokeGuard {
    state: Arc<TimerState>,
}

impl Drop for InvokeGuard {
    fn drop(&mut self) {
        self.state.invoking.store(false, Ordering::Release);
    }
}

/// Weak capability referencing a scheduled timer.
///
/// Dropping the handle does not stop the timer; the timer lives until its
/// callback returns `false` or [`TimerHandle::cancel`] is called.
#[derive(Clone)]
pub struct TimerHandle {
    id: TimerId,
    interval: Duration,
    state: Weak<TimerState>,
}

impl TimerHandle {
    fn new(state: &Arc<TimerState>) -> Self {
        Self {
            id: state.id,
            interval: state.interval,
            state: Arc::downgrade(state),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.state
            .upgrade()
            .map(|state| !state.is_released())
            .unwrap_or(false)
    }

    /// Returns whether a callback invocation has been dispatched and not yet
    /// completed.
    pub fn is_invoking(&self) -> bool {
        self.state
            .upgrade()
            .map(|state| state.invoking.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Stop the timer and release its host alarm. Firings already queued
    /// become no-ops and a suspending invocation in flight has its result
    /// discarded. Cancelling twice is harmless.
    pub fn cancel(&self) -> Result<(), PlatformError> {
        match self.state.upgrade() {
            Some(state) => state.release(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("active", &self.is_active())
            .finish()
    }
}

struct TimersInner {
    dispatcher: Arc<dyn MainThreadDispatcher>,
    alarms: Arc<dyn AlarmHost>,
    next_id: AtomicU64,
    live: Mutex<HashMap<TimerId, Weak<TimerState>, RandomState>>,
}

impl TimersInner {
    fn register(self: &Arc<Self>, interval: Duration) -> Result<Arc<TimerState>, PlatformError> {
        if interval.is_zero() {
            return Err(PlatformError::InvalidInterval { interval });
        }
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(TimerState {
            id,
            interval,
            invoking: AtomicBool::new(false),
            released: AtomicBool::new(false),
            last_result: AtomicBool::new(true),
            alarm: Mutex::new(None),
            alarms: Arc::downgrade(&self.alarms),
            owner: Arc::downgrade(self),
        });
        self.live.lock().insert(id, Arc::downgrade(&state));
        Ok(state)
    }

    fn arm(&self, state: &Arc<TimerState>, handler: AlarmHandler) -> Result<(), PlatformError> {
        match self.alarms.arm_periodic(state.interval, handler) {
            Ok(alarm) => {
                log::debug!("{} armed as {alarm} every {:?}", state.id, state.interval);
                state.attach_alarm(alarm)
            }
            Err(err) => {
                // Nothing was armed, so releasing only updates bookkeeping.
                let _ = state.release();
                Err(err)
            }
        }
    }

    fn forget(&self, id: TimerId) {
        self.live.lock().remove(&id);
    }
}

/// Starts repeating timers against a host's dispatcher and alarm primitive.
#[derive(Clone)]
pub struct Timers {
    inner: Arc<TimersInner>,
}

impl Timers {
    pub fn new(dispatcher: Arc<dyn MainThreadDispatcher>, alarms: Arc<dyn AlarmHost>) -> Self {
        Self {
            inner: Arc::new(TimersInner {
                dispatcher,
                alarms,
                next_id: AtomicU64::new(1),
                live: Mutex::new(HashMap::default()),
            }),
        }
    }

    /// Invoke `callback` on the main thread every `interval` until it returns
    /// `false`.
    ///
    /// When the host already delivers alarms on the main thread the callback
    /// runs inside the firing; otherwise each firing posts it.
    pub fn start_timer<F>(&self, interval: Duration, callback: F) -> Result<TimerHandle, PlatformError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let state = self.inner.register(interval)?;
        let callback = Arc::new(Mutex::new(callback));
        let inline = self.inner.alarms.delivers_on_main_thread();
        let dispatcher = Arc::downgrade(&self.inner.dispatcher);
        let firing = Arc::clone(&state);
        let handler: AlarmHandler = Box::new(move || {
            match firing.try_begin_invoke() {
                Some(guard) if inline => run_callback(guard, &callback),
                Some(guard) => {
                    let Some(dispatcher) = dispatcher.upgrade() else {
                        drop(guard);
                        return stop_orphaned(&firing);
                    };
                    let callback = Arc::clone(&callback);
                    dispatcher.post(Box::new(move || run_callback(guard, &callback)));
                }
                None => skip_firing(&firing),
            }
            !firing.is_released()
        });
        self.inner.arm(&state, handler)?;
        Ok(TimerHandle::new(&state))
    }

    /// Like [`Timers::start_timer`], but `callback` produces a future that is
    /// driven on the main thread.
    ///
    /// A firing starts a new invocation only when the previous one has settled
    /// and returned `true`. The alarm handler itself never waits for the
    /// future; it reports the previously settled result to the host.
    pub fn start_async_timer<F, Fut>(
        &self,
        interval: Duration,
        callback: F,
    ) -> Result<TimerHandle, PlatformError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let state = self.inner.register(interval)?;
        let callback = Arc::new(Mutex::new(callback));
        let dispatcher = Arc::downgrade(&self.inner.dispatcher);
        let firing = Arc::clone(&state);
        let handler: AlarmHandler = Box::new(move || {
            if !firing.last_result.load(Ordering::Acquire) {
                firing.release_from_callback();
                return false;
            }
            match firing.try_begin_invoke() {
                Some(guard) => {
                    let Some(dispatcher) = dispatcher.upgrade() else {
                        drop(guard);
                        return stop_orphaned(&firing);
                    };
                    spawn_on_main_thread(
                        dispatcher,
                        run_async_callback(guard, Arc::clone(&callback)),
                    );
                }
                None => skip_firing(&firing),
            }
            !firing.is_released()
        });
        self.inner.arm(&state, handler)?;
        Ok(TimerHandle::new(&state))
    }

    /// Number of timers that have not been released yet.
    pub fn active_count(&self) -> usize {
        self.inner.live.lock().len()
    }

    /// Cancel every live timer, returning the first disarm failure.
    pub fn cancel_all(&self) -> Result<(), PlatformError> {
        let live: Vec<Arc<TimerState>> = self
            .inner
            .live
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        let mut first_error = None;
        for state in live {
            if let Err(err) = state.release() {
                log::error!("failed to cancel {}: {err}", state.id);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("active", &self.active_count())
            .finish()
    }
}

fn skip_firing(state: &TimerState) {
    if !state.is_released() {
        log::trace!("{} still invoking; skipping firing", state.id);
    }
}

/// The dispatcher was dropped, so no main thread is left to run callbacks.
fn stop_orphaned(state: &TimerState) -> bool {
    log::debug!("{} lost its dispatcher; stopping", state.id);
    state.release_from_callback();
    false
}

fn run_callback<F>(guard: InvokeGuard, callback: &Mutex<F>)
where
    F: FnMut() -> bool,
{
    let state = &guard.state;
    if state.is_released() {
        return;
    }
    let keep = (&mut *callback.lock())();
    if !keep {
        state.release_from_callback();
    }
}

async fn run_async_callback<F, Fut>(guard: InvokeGuard, callback: Arc<Mutex<F>>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let state = Arc::clone(&guard.state);
    if state.is_released() {
        return;
    }
    let pending = {
        let mut callback = callback.lock();
        (&mut *callback)()
    };
    let keep = pending.await;
    if state.is_released() {
        log::debug!("{} cancelled while invoking; discarding result", state.id);
        return;
    }
    state.last_result.store(keep, Ordering::Release);
    if !keep {
        state.release_from_callback();
    }
    drop(guard);
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
