//! Standard platform services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the capability traits
//! defined in `forms-platform-core`. Applications construct a
//! [`StdPlatform`] on the thread that should act as the UI thread, hand its
//! [`PlatformServices`] to the framework, and drive its main loop.

mod alarm;
mod main_loop;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use forms_platform_core::{PlatformConfig, PlatformError, PlatformServices};

pub use alarm::StdAlarmHost;
pub use main_loop::{LoopExit, StdDispatcher, StdMainLoop};

/// Convenience container bundling the main loop, alarm host and services.
///
/// The platform is bound to the thread that created it; that thread is the
/// main thread for every timer and ticker started through it.
pub struct StdPlatform {
    main_loop: StdMainLoop,
    alarms: Arc<StdAlarmHost>,
    services: PlatformServices,
}

impl StdPlatform {
    pub fn new(config: PlatformConfig) -> Result<Self, PlatformError> {
        let main_loop = StdMainLoop::new();
        let alarms = Arc::new(StdAlarmHost::new());
        let services = PlatformServices::new(main_loop.dispatcher(), alarms.clone(), config)?;
        Ok(Self {
            main_loop,
            alarms,
            services,
        })
    }

    pub fn services(&self) -> &PlatformServices {
        &self.services
    }

    pub fn main_loop(&self) -> &StdMainLoop {
        &self.main_loop
    }

    pub fn alarms(&self) -> Arc<StdAlarmHost> {
        Arc::clone(&self.alarms)
    }

    /// Drive the main loop until the application quits.
    pub fn run(&self) {
        self.main_loop.run();
    }

    pub fn run_for(&self, duration: Duration) -> LoopExit {
        self.main_loop.run_for(duration)
    }

    pub fn run_until(&self, timeout: Duration, done: impl FnMut() -> bool) -> LoopExit {
        self.main_loop.run_until(timeout, done)
    }

    pub fn run_pending(&self) -> usize {
        self.main_loop.run_pending()
    }
}

impl Drop for StdPlatform {
    fn drop(&mut self) {
        if let Err(err) = self.services.timers().cancel_all() {
            log::error!("failed to cancel timers on shutdown: {err}");
        }
        self.alarms.shutdown();
    }
}

impl fmt::Debug for StdPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdPlatform")
            .field("main_loop", &self.main_loop)
            .field("alarms", &self.alarms)
            .field("services", &self.services)
            .finish()
    }
}
