//! Testing utilities and a virtual-time host for Forms platform services

pub mod manual_host;

// Re-export testing utilities
pub use manual_host::*;

pub mod prelude {
    pub use crate::manual_host::{AlarmDelivery, ManualHost, Sleep};
}
