//! PID 1 functionality
//!
//! Responsibilities specific to running as init: routing the signals an
//! init process receives and the final hand-off to the platform
//! power-off/reboot primitive. Filesystem setup is left to earlier boot
//! stages.

mod shutdown;
mod signals;

pub use shutdown::{shutdown, ShutdownMode};
pub use signals::{InitSignal, SignalRouter};

use std::process;

/// Check if we are running as PID 1
pub fn is_pid1() -> bool {
    process::id() == 1
}
