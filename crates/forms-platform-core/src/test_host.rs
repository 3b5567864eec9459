use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::PlatformError;
use crate::platform::{AlarmHandler, AlarmHost, AlarmId, MainThreadAction, MainThreadDispatcher};

/// Minimal host for unit tests: alarms fire only when asked to and posted
/// actions wait until `run_pending`.
pub(crate) struct TestHost {
    main_thread: ThreadId,
    inline: bool,
    queue: Mutex<VecDeque<MainThreadAction>>,
    // `None` while the alarm's handler is running.
    alarms: Mutex<BTreeMap<AlarmId, Option<AlarmHandler>>>,
    next_alarm: AtomicU64,
    quit: AtomicBool,
    fail_arm: AtomicBool,
}

impl TestHost {
    pub(crate) fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// Alarms delivered on the main thread, like a desktop main loop.
    pub(crate) fn inline() -> Arc<Self> {
        Self::build(true)
    }

    fn build(inline: bool) -> Arc<Self> {
        Arc::new(Self {
            main_thread: thread::current().id(),
            inline,
            queue: Mutex::new(VecDeque::new()),
            alarms: Mutex::new(BTreeMap::new()),
            next_alarm: AtomicU64::new(1),
            quit: AtomicBool::new(false),
            fail_arm: AtomicBool::new(false),
        })
    }

    pub(crate) fn fail_next_arm(&self) {
        self.fail_arm.store(true, Ordering::SeqCst);
    }

    /// Fire every armed alarm once, in arming order.
    pub(crate) fn fire_all(&self) {
        let ids: Vec<AlarmId> = self.alarms.lock().keys().copied().collect();
        for id in ids {
            self.fire(id);
        }
    }

    pub(crate) fn fire(&self, id: AlarmId) {
        let handler = match self.alarms.lock().get_mut(&id) {
            Some(slot) => slot.take(),
            None => None,
        };
        let Some(mut handler) = handler else {
            return;
        };
        let keep = handler();
        let mut alarms = self.alarms.lock();
        match alarms.get_mut(&id) {
            Some(slot) if keep => *slot = Some(handler),
            Some(_) => {
                alarms.remove(&id);
            }
            None => {}
        }
    }

    pub(crate) fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some(action) => {
                    action();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn armed(&self) -> usize {
        self.alarms.lock().len()
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}

impl MainThreadDispatcher for TestHost {
    fn post(&self, action: MainThreadAction) {
        self.queue.lock().push_back(action);
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    fn quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }
}

impl AlarmHost for TestHost {
    fn arm_periodic(
        &self,
        _interval: Duration,
        handler: AlarmHandler,
    ) -> Result<AlarmId, PlatformError> {
        if self.fail_arm.swap(false, Ordering::SeqCst) {
            return Err(PlatformError::AlarmArm {
                reason: "test host refused".to_owned(),
            });
        }
        let id = AlarmId::new(self.next_alarm.fetch_add(1, Ordering::SeqCst));
        self.alarms.lock().insert(id, Some(handler));
        Ok(id)
    }

    fn disarm(&self, alarm: AlarmId) -> Result<(), PlatformError> {
        self.alarms.lock().remove(&alarm);
        Ok(())
    }

    fn delivers_on_main_thread(&self) -> bool {
        self.inline
    }
}
