//! Platform services contract for Forms hosts.
//!
//! A host adapter supplies two capabilities, a [`MainThreadDispatcher`] and an
//! [`AlarmHost`]. On top of them this crate builds repeating timers (with
//! synchronous or suspending callbacks), the animation [`Ticker`], and the
//! [`PlatformServices`] facade handed to the rest of the framework.

pub mod config;
pub mod error;
pub mod executor;
pub mod named_size;
pub mod platform;
pub mod services;
pub mod ticker;
pub mod timer;

pub use config::{PlatformConfig, DEFAULT_TICKER_INTERVAL};
pub use error::PlatformError;
pub use executor::spawn_on_main_thread;
pub use named_size::{named_size, NamedSize, RuntimePlatform, TargetIdiom};
pub use platform::{AlarmHandler, AlarmHost, AlarmId, MainThreadAction, MainThreadDispatcher};
pub use services::PlatformServices;
pub use ticker::{Ticker, TickerListenerId};
pub use timer::{TimerHandle, TimerId, Timers};

#[cfg(test)]
pub(crate) mod test_host;
