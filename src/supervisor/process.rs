//! Process creation, signalling, and non-blocking reaping

use std::ffi::CString;
use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, ForkResult, Pid};

use crate::units::ServiceDefinition;

/// Exit code the child half reports when exec itself fails, so a bad
/// executable path surfaces as an ordinary, distinguishable exit event.
pub const EXEC_FAILED_CODE: i32 = 127;

/// How a reaped child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Exited normally with a code
    Exited(i32),
    /// Killed by a signal
    Signaled(i32),
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {}", code),
            Self::Signaled(signo) => write!(f, "signal {}", signo),
        }
    }
}

/// A child collected by [`reap_next`]
#[derive(Debug, Clone, Copy)]
pub struct ReapedChild {
    pub pid: Pid,
    pub status: ExitKind,
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("empty command")]
    EmptyCommand,

    #[error("command contains an interior NUL byte")]
    BadCommand,

    #[error("fork failed: {0}")]
    Fork(Errno),
}

/// Create the service's process.
///
/// The command string is tokenized on whitespace; there is no quoting
/// support. The parent returns the child's pid as soon as `fork`
/// succeeds. Exec failure in the child (executable missing or not
/// executable) terminates the child with [`EXEC_FAILED_CODE`] and is
/// observed later through [`reap_next`], never here. Only a failure to
/// create the process at all is a synchronous error.
pub fn spawn(definition: &ServiceDefinition) -> Result<Pid, SpawnError> {
    let argv = tokenize(&definition.command)?;

    // All allocation happens before the fork; the child only execs.
    match unsafe { fork() }.map_err(SpawnError::Fork)? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            let _ = execvp(&argv[0], &argv);
            unsafe { libc::_exit(EXEC_FAILED_CODE) }
        }
    }
}

fn tokenize(command: &str) -> Result<Vec<CString>, SpawnError> {
    let argv: Vec<CString> = command
        .split_whitespace()
        .map(|tok| CString::new(tok).map_err(|_| SpawnError::BadCommand))
        .collect::<Result<_, _>>()?;

    if argv.is_empty() {
        return Err(SpawnError::EmptyCommand);
    }

    Ok(argv)
}

/// Collect the next already-exited child without blocking.
///
/// Returns `None` when no child has exited yet, or when there are no
/// children at all. Stop/continue notifications are skipped.
pub fn reap_next() -> Option<ReapedChild> {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                return Some(ReapedChild {
                    pid,
                    status: ExitKind::Exited(code),
                });
            }
            Ok(WaitStatus::Signaled(pid, signal, _)) => {
                return Some(ReapedChild {
                    pid,
                    status: ExitKind::Signaled(signal as i32),
                });
            }
            Ok(WaitStatus::StillAlive) => return None,
            Ok(_) => continue,
            Err(Errno::ECHILD) => return None,
            Err(e) => {
                log::error!("waitpid error: {}", e);
                return None;
            }
        }
    }
}

/// Drain every already-exited child without blocking.
pub fn drain() -> Vec<ReapedChild> {
    let mut reaped = Vec::new();
    while let Some(child) = reap_next() {
        reaped.push(child);
    }
    reaped
}

/// Best-effort signal delivery. A pid that no longer refers to a live
/// process is not an error.
pub fn signal(pid: Pid, sig: Signal) {
    if let Err(e) = kill(pid, sig) {
        if e != Errno::ESRCH {
            log::warn!("Failed to send {} to pid {}: {}", sig, pid, e);
        }
    }
}
