//! Signal routing for the init process
//!
//! The handlers do no work themselves: each delivered signal becomes an
//! [`InitSignal`] value on a channel, and all decision-making stays in
//! the control loop, which picks the event up on its next iteration.

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;

/// Signals frostd reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSignal {
    /// Child process state changed (SIGCHLD)
    Child,
    /// Power-off request (SIGTERM)
    Term,
    /// Reboot request (SIGINT, what the kernel sends PID 1 for ctrl-alt-del)
    Int,
    /// State dump request (SIGUSR1)
    Usr1,
}

/// Converts delivered OS signals into internal events
pub struct SignalRouter {
    sigchld: Signal,
    sigterm: Signal,
    sigint: Signal,
    sigusr1: Signal,
}

impl SignalRouter {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigchld: signal(SignalKind::child())?,
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sigusr1: signal(SignalKind::user_defined1())?,
        })
    }

    /// Wait for the next signal
    pub async fn wait(&mut self) -> InitSignal {
        tokio::select! {
            _ = self.sigchld.recv() => InitSignal::Child,
            _ = self.sigterm.recv() => InitSignal::Term,
            _ = self.sigint.recv() => InitSignal::Int,
            _ = self.sigusr1.recv() => InitSignal::Usr1,
        }
    }

    /// Spawn a task that forwards signals to a channel
    pub fn spawn_forwarder(mut self) -> mpsc::Receiver<InitSignal> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            loop {
                let sig = self.wait().await;
                if tx.send(sig).await.is_err() {
                    // Receiver dropped, exit
                    break;
                }
            }
        });

        rx
    }
}
