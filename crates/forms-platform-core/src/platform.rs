//! Capability traits a host platform implements to run Forms scheduling.
//!
//! These traits keep the timer and ticker logic independent of any particular
//! event loop. A desktop host typically wires them to its main loop's idle and
//! timeout sources, while a mobile host posts onto a synchronization context
//! and arms thread-pool timers.

use std::fmt;
use std::time::Duration;

use crate::error::PlatformError;

/// Unit of work executed once on the logical main thread.
pub type MainThreadAction = Box<dyn FnOnce() + Send + 'static>;

/// Handler invoked by the host on every alarm firing.
///
/// Returning `false` releases the alarm; the host must not call the handler
/// again afterwards.
pub type AlarmHandler = Box<dyn FnMut() -> bool + Send + 'static>;

/// Identifies an alarm armed through [`AlarmHost::arm_periodic`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmId(u64);

impl AlarmId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alarm#{}", self.0)
    }
}

/// Posts work onto the single logical UI thread.
///
/// Implementations must be safe to call from any thread and must never block
/// the caller. Actions posted from the same thread run in submission order.
pub trait MainThreadDispatcher: Send + Sync {
    /// Enqueue `action` to run once on the main thread, outside the caller's
    /// stack frame.
    ///
    /// A host that can no longer accept work is in an unrecoverable state;
    /// implementations treat that as fatal rather than reporting an error.
    fn post(&self, action: MainThreadAction);

    /// Returns whether the calling thread is the designated main thread.
    fn is_main_thread(&self) -> bool;

    /// Ask the host loop to stop once the current action returns.
    fn quit(&self);
}

/// Periodic alarm primitive provided by the host.
pub trait AlarmHost: Send + Sync {
    /// Arm an alarm that calls `handler` every `interval` until the handler
    /// returns `false` or the alarm is disarmed.
    fn arm_periodic(
        &self,
        interval: Duration,
        handler: AlarmHandler,
    ) -> Result<AlarmId, PlatformError>;

    /// Release an alarm. Disarming an alarm that already stopped is a no-op.
    ///
    /// This may be called from inside the alarm's own handler.
    fn disarm(&self, alarm: AlarmId) -> Result<(), PlatformError>;

    /// Whether handlers already run on the main thread.
    fn delivers_on_main_thread(&self) -> bool;
}
