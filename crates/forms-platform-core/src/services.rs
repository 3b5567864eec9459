use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::executor;
use crate::named_size::{self, NamedSize, RuntimePlatform};
use crate::platform::{AlarmHost, MainThreadDispatcher};
use crate::ticker::Ticker;
use crate::timer::{TimerHandle, Timers};

/// Scheduling and device services a host exposes to the framework.
///
/// The dispatcher and alarm host are passed in explicitly so tests can swap
/// in deterministic doubles.
#[derive(Clone)]
pub struct PlatformServices {
    dispatcher: Arc<dyn MainThreadDispatcher>,
    timers: Timers,
    config: PlatformConfig,
}

impl PlatformServices {
    pub fn new(
        dispatcher: Arc<dyn MainThreadDispatcher>,
        alarms: Arc<dyn AlarmHost>,
        config: PlatformConfig,
    ) -> Result<Self, PlatformError> {
        config.validate()?;
        let timers = Timers::new(Arc::clone(&dispatcher), alarms);
        log::debug!(
            "platform services for {} ({:?})",
            config.platform,
            config.idiom
        );
        Ok(Self {
            dispatcher,
            timers,
            config,
        })
    }

    pub fn begin_invoke_on_main_thread(&self, action: impl FnOnce() + Send + 'static) {
        self.dispatcher.post(Box::new(action));
    }

    pub fn is_main_thread(&self) -> bool {
        self.dispatcher.is_main_thread()
    }

    /// Returns whether UI work from the calling thread has to be posted.
    pub fn is_invoke_required(&self) -> bool {
        !self.dispatcher.is_main_thread()
    }

    /// Create a disabled ticker running at the configured cadence.
    pub fn create_ticker(&self) -> Result<Ticker, PlatformError> {
        Ticker::new(self.timers.clone(), self.config.ticker_interval)
    }

    pub fn start_timer<F>(&self, interval: Duration, callback: F) -> Result<TimerHandle, PlatformError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.timers.start_timer(interval, callback)
    }

    pub fn start_async_timer<F, Fut>(
        &self,
        interval: Duration,
        callback: F,
    ) -> Result<TimerHandle, PlatformError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.timers.start_async_timer(interval, callback)
    }

    pub fn spawn_on_main_thread(&self, future: impl Future<Output = ()> + Send + 'static) {
        executor::spawn_on_main_thread(Arc::clone(&self.dispatcher), future);
    }

    pub fn runtime_platform(&self) -> RuntimePlatform {
        self.config.platform
    }

    pub fn named_size(&self, size: NamedSize) -> f64 {
        named_size::named_size(
            self.config.platform,
            self.config.idiom,
            size,
            self.config.font_scale,
        )
    }

    /// Cancel all timers and ask the host loop to stop.
    pub fn quit_application(&self) {
        if let Err(err) = self.timers.cancel_all() {
            log::warn!("timers left armed at quit: {err}");
        }
        self.dispatcher.quit();
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> Arc<dyn MainThreadDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }
}

impl fmt::Debug for PlatformServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformServices")
            .field("config", &self.config)
            .field("timers", &self.timers)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/services_tests.rs"]
mod tests;
