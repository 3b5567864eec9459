//! Periodic alarms backed by one sleeping thread per alarm.
//!
//! Handlers run on the alarm's own thread, never on the main thread, so the
//! timer layer marshals every firing through the dispatcher.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ahash::RandomState;
use forms_platform_core::{AlarmHandler, AlarmHost, AlarmId, PlatformError};
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

struct AlarmSlot {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl AlarmSlot {
    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.wake.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Sleep until `deadline`. Returns false if the alarm was cancelled.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut cancelled = self.cancelled.lock();
        loop {
            if *cancelled {
                return false;
            }
            if self.wake.wait_until(&mut cancelled, deadline).timed_out() {
                return !*cancelled;
            }
        }
    }
}

type SlotMap = HashMap<AlarmId, Arc<AlarmSlot>, RandomState>;

/// [`AlarmHost`] that sleeps on a dedicated thread per armed alarm.
pub struct StdAlarmHost {
    next_id: AtomicU64,
    slots: Arc<Mutex<SlotMap>>,
}

impl StdAlarmHost {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: Arc::new(Mutex::new(HashMap::default())),
        }
    }

    /// Number of alarms whose threads are still running.
    pub fn armed_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Cancel every armed alarm.
    pub fn shutdown(&self) {
        let slots: Vec<Arc<AlarmSlot>> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        if !slots.is_empty() {
            log::debug!("shutting down {} alarm(s)", slots.len());
        }
        for slot in slots {
            slot.cancel();
        }
    }
}

impl Default for StdAlarmHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdAlarmHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdAlarmHost")
            .field("armed", &self.armed_count())
            .finish()
    }
}

impl AlarmHost for StdAlarmHost {
    fn arm_periodic(
        &self,
        interval: Duration,
        handler: AlarmHandler,
    ) -> Result<AlarmId, PlatformError> {
        if interval.is_zero() {
            return Err(PlatformError::InvalidInterval { interval });
        }
        let id = AlarmId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(AlarmSlot {
            cancelled: Mutex::new(false),
            wake: Condvar::new(),
        });
        // Registered before the thread starts so a handler that stops on its
        // first firing cannot race the insertion.
        self.slots.lock().insert(id, Arc::clone(&slot));

        let slots = Arc::clone(&self.slots);
        let thread_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name(format!("forms-alarm-{}", id.get()))
            .spawn(move || {
                run_alarm(interval, handler, &thread_slot);
                slots.lock().remove(&id);
                log::trace!("{id} thread exiting");
            });
        match spawned {
            Ok(_) => Ok(id),
            Err(err) => {
                self.slots.lock().remove(&id);
                Err(PlatformError::AlarmArm {
                    reason: format!("could not spawn alarm thread: {err}"),
                })
            }
        }
    }

    fn disarm(&self, alarm: AlarmId) -> Result<(), PlatformError> {
        let slot = self.slots.lock().remove(&alarm);
        if let Some(slot) = slot {
            slot.cancel();
        }
        Ok(())
    }

    fn delivers_on_main_thread(&self) -> bool {
        false
    }
}

fn run_alarm(interval: Duration, mut handler: AlarmHandler, slot: &AlarmSlot) {
    let mut deadline = Instant::now() + interval;
    while slot.wait_until(deadline) {
        if !handler() || slot.is_cancelled() {
            break;
        }
        deadline += interval;
        let now = Instant::now();
        if deadline <= now {
            // Missed firings are dropped rather than delivered in a burst.
            deadline = now + interval;
        }
    }
}
