//! A host whose clock only moves when the test says so.
//!
//! [`ManualHost`] implements both capability traits. Alarms fire and sleeps
//! resolve while [`ManualHost::advance`] walks virtual time forward, in
//! deadline order, so timing scenarios run instantly and reproducibly.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, ThreadId};
use std::time::Duration;

use forms_platform_core::{
    AlarmHandler, AlarmHost, AlarmId, MainThreadAction, MainThreadDispatcher, PlatformConfig,
    PlatformError, PlatformServices,
};
use parking_lot::Mutex;

/// Where alarm handlers are considered to run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AlarmDelivery {
    /// Handlers run on the main thread, like GLib timeouts.
    MainThread,
    /// Handlers run on a timer thread and must be marshaled.
    #[default]
    Background,
}

struct ManualAlarm {
    interval: Duration,
    due: Duration,
    // Taken out while the handler runs so it may disarm itself.
    handler: Option<AlarmHandler>,
}

struct Sleeper {
    deadline: Duration,
    waker: Waker,
}

enum Event {
    Wake(Duration),
    Fire(Duration, AlarmId),
}

pub struct ManualHost {
    main_thread: ThreadId,
    delivery: AlarmDelivery,
    now: Mutex<Duration>,
    queue: Mutex<VecDeque<MainThreadAction>>,
    alarms: Mutex<BTreeMap<AlarmId, ManualAlarm>>,
    sleepers: Mutex<Vec<Sleeper>>,
    next_alarm: AtomicU64,
    firings: AtomicU64,
    quit: AtomicBool,
}

impl ManualHost {
    /// Host with background alarm delivery, bound to the calling thread.
    pub fn new() -> Arc<Self> {
        Self::with_delivery(AlarmDelivery::Background)
    }

    pub fn with_delivery(delivery: AlarmDelivery) -> Arc<Self> {
        Arc::new(Self {
            main_thread: thread::current().id(),
            delivery,
            now: Mutex::new(Duration::ZERO),
            queue: Mutex::new(VecDeque::new()),
            alarms: Mutex::new(BTreeMap::new()),
            sleepers: Mutex::new(Vec::new()),
            next_alarm: AtomicU64::new(1),
            firings: AtomicU64::new(0),
            quit: AtomicBool::new(false),
        })
    }

    /// Build [`PlatformServices`] on top of this host.
    pub fn services(self: &Arc<Self>, config: PlatformConfig) -> Result<PlatformServices, PlatformError> {
        PlatformServices::new(self.clone(), self.clone(), config)
    }

    /// Virtual time elapsed since the host was created.
    pub fn now(&self) -> Duration {
        *self.now.lock()
    }

    /// Future resolving once virtual time reaches `now() + duration`.
    pub fn sleep(self: &Arc<Self>, duration: Duration) -> Sleep {
        Sleep {
            host: Arc::clone(self),
            deadline: self.now() + duration,
        }
    }

    /// Move time forward by `by`, firing alarms and waking sleepers in
    /// deadline order. The main queue is drained after every event, as if
    /// the main thread were otherwise idle.
    pub fn advance(&self, by: Duration) {
        self.advance_inner(by, true);
    }

    /// Like [`ManualHost::advance`], but leaves posted actions queued, as if
    /// the main thread were busy for the whole span.
    pub fn advance_without_running(&self, by: Duration) {
        self.advance_inner(by, false);
    }

    fn advance_inner(&self, by: Duration, run: bool) {
        let target = self.now() + by;
        if run {
            self.run_pending();
        }
        while let Some(event) = self.next_event(target) {
            match event {
                Event::Wake(at) => {
                    *self.now.lock() = at;
                    self.wake_sleepers(at);
                }
                Event::Fire(at, id) => {
                    *self.now.lock() = at;
                    self.fire(id);
                }
            }
            if run {
                self.run_pending();
            }
        }
        *self.now.lock() = target;
    }

    /// Earliest event at or before `target`; sleepers win ties with alarms.
    fn next_event(&self, target: Duration) -> Option<Event> {
        let wake = self
            .sleepers
            .lock()
            .iter()
            .map(|sleeper| sleeper.deadline)
            .min();
        let fire = self
            .alarms
            .lock()
            .iter()
            .filter(|(_, alarm)| alarm.handler.is_some())
            .map(|(id, alarm)| (alarm.due, *id))
            .min();
        let event = match (wake, fire) {
            (Some(wake), Some((due, _))) if wake <= due => Event::Wake(wake),
            (_, Some((due, id))) => Event::Fire(due, id),
            (Some(wake), None) => Event::Wake(wake),
            (None, None) => return None,
        };
        let at = match event {
            Event::Wake(at) | Event::Fire(at, _) => at,
        };
        (at <= target).then_some(event)
    }

    fn wake_sleepers(&self, now: Duration) {
        let ready: Vec<Waker> = {
            let mut sleepers = self.sleepers.lock();
            let (ready, waiting): (Vec<_>, Vec<_>) =
                sleepers.drain(..).partition(|sleeper| sleeper.deadline <= now);
            *sleepers = waiting;
            ready.into_iter().map(|sleeper| sleeper.waker).collect()
        };
        for waker in ready {
            waker.wake();
        }
    }

    fn fire(&self, id: AlarmId) {
        let handler = self
            .alarms
            .lock()
            .get_mut(&id)
            .and_then(|alarm| alarm.handler.take());
        let Some(mut handler) = handler else {
            return;
        };
        self.firings.fetch_add(1, Ordering::Relaxed);
        let keep = handler();
        let mut alarms = self.alarms.lock();
        let Some(alarm) = alarms.get_mut(&id) else {
            // Disarmed from inside its own handler.
            return;
        };
        if keep {
            alarm.due += alarm.interval;
            alarm.handler = Some(handler);
        } else {
            alarms.remove(&id);
            log::trace!("{id} released by its handler");
        }
    }

    /// Run queued main-thread actions, including ones they post, until the
    /// queue is empty.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            let Some(action) = next else {
                return ran;
            };
            action();
            ran += 1;
        }
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn armed_alarms(&self) -> usize {
        self.alarms.lock().len()
    }

    /// Total alarm firings delivered, including ones the timer skipped.
    pub fn total_firings(&self) -> u64 {
        self.firings.load(Ordering::Relaxed)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

impl MainThreadDispatcher for ManualHost {
    fn post(&self, action: MainThreadAction) {
        self.queue.lock().push_back(action);
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    fn quit(&self) {
        self.quit.store(true, Ordering::Release);
    }
}

impl AlarmHost for ManualHost {
    fn arm_periodic(
        &self,
        interval: Duration,
        handler: AlarmHandler,
    ) -> Result<AlarmId, PlatformError> {
        if interval.is_zero() {
            return Err(PlatformError::InvalidInterval { interval });
        }
        let id = AlarmId::new(self.next_alarm.fetch_add(1, Ordering::Relaxed));
        let due = self.now() + interval;
        self.alarms.lock().insert(
            id,
            ManualAlarm {
                interval,
                due,
                handler: Some(handler),
            },
        );
        Ok(id)
    }

    fn disarm(&self, alarm: AlarmId) -> Result<(), PlatformError> {
        self.alarms.lock().remove(&alarm);
        Ok(())
    }

    fn delivers_on_main_thread(&self) -> bool {
        self.delivery == AlarmDelivery::MainThread
    }
}

impl fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualHost")
            .field("delivery", &self.delivery)
            .field("now", &self.now())
            .field("pending_actions", &self.pending_actions())
            .field("armed_alarms", &self.armed_alarms())
            .finish()
    }
}

/// Future returned by [`ManualHost::sleep`].
pub struct Sleep {
    host: Arc<ManualHost>,
    deadline: Duration,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.host.now() >= self.deadline {
            return Poll::Ready(());
        }
        self.host.sleepers.lock().push(Sleeper {
            deadline: self.deadline,
            waker: cx.waker().clone(),
        });
        Poll::Pending
    }
}
