//! Platform power-off/reboot primitive
//!
//! Invoked exactly once, after the supervisor has already terminated
//! every supervised service: sync filesystems, then execute the reboot
//! syscall with the requested mode.

use std::time::Duration;

use nix::sys::reboot::{reboot, RebootMode};
use nix::unistd::sync;

/// Requested shutdown mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Power off the system
    Poweroff,
    /// Reboot the system
    Reboot,
    /// Halt (stop, don't power off)
    Halt,
}

impl ShutdownMode {
    fn to_reboot_mode(self) -> RebootMode {
        match self {
            ShutdownMode::Poweroff => RebootMode::RB_POWER_OFF,
            ShutdownMode::Reboot => RebootMode::RB_AUTOBOOT,
            ShutdownMode::Halt => RebootMode::RB_HALT_SYSTEM,
        }
    }
}

/// Hand control back to the platform.
pub fn shutdown(mode: ShutdownMode) -> ! {
    log::info!("Syncing filesystems");
    sync();

    log::info!("Executing {:?}", mode);
    let Err(e) = reboot(mode.to_reboot_mode());
    log::error!("reboot() failed: {}", e);

    // If reboot fails, loop forever (we're PID 1, can't exit)
    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}
