//! Service supervision
//!
//! The supervisor owns the service store and drives everything from a
//! single control loop: start services as their dependencies come up,
//! reap exits, apply the respawn policy, and sequence the shutdown.
//! Concurrency exists only at the OS-process level; the store has
//! exactly one writer by construction.

mod deps;
mod process;
mod store;

pub use process::{ExitKind, ReapedChild, SpawnError, EXEC_FAILED_CODE};
pub use store::{ServiceRecord, ServiceState, ServiceStore, RESPAWN_CEILING};

use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::pid1::{InitSignal, ShutdownMode};
use crate::units::ServiceDefinition;

/// Pause between a supervised exit and the respawn of the service
const RESPAWN_DELAY: Duration = Duration::from_secs(1);

/// Grace period between the graceful and the forceful termination pass
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on the idle wait, in case a wake-up notification is lost
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Service supervisor: the single owner of the service store.
pub struct Supervisor {
    store: ServiceStore,
}

impl Supervisor {
    /// Build a supervisor over the loaded definitions.
    ///
    /// Dependency names that resolve to no loaded service are warned
    /// about here, exactly once per load.
    pub fn new(definitions: Vec<ServiceDefinition>) -> Self {
        let store = ServiceStore::new(definitions);
        deps::warn_missing(&store);
        Self { store }
    }

    pub fn store(&self) -> &ServiceStore {
        &self.store
    }

    /// Start every service whose dependencies are satisfied, repeating
    /// until a pass starts nothing. Returns the names in start order.
    pub fn start_eligible(&mut self) -> Vec<String> {
        let mut started = Vec::new();
        loop {
            let pass = deps::eligible(&self.store);
            if pass.is_empty() {
                break;
            }
            for name in pass {
                self.start(&name);
                started.push(name);
            }
        }
        started
    }

    /// Start one service: create its process and move it to `Running`.
    fn start(&mut self, name: &str) {
        let Some(record) = self.store.get_mut(name) else {
            return;
        };

        log::info!("Starting service: {}", name);
        record.set_starting();

        match process::spawn(&record.definition) {
            Ok(pid) => {
                record.set_running(pid);
                log::info!("Service {} running (pid {})", name, pid);
            }
            Err(e) => {
                record.set_failed();
                log::error!("Failed to start {}: {}", name, e);
            }
        }
    }

    /// Drain exit events and apply the respawn policy to each.
    pub fn service_exits(&mut self) {
        while let Some(child) = process::reap_next() {
            self.handle_exit(child);
        }
    }

    fn handle_exit(&mut self, child: ReapedChild) {
        let Some(record) = self.store.by_pid_mut(child.pid) else {
            // An inherited orphan, not one of ours; already reaped.
            log::debug!("Reaped unsupervised pid {} ({})", child.pid, child.status);
            return;
        };

        let name = record.name().to_string();
        log::info!(
            "Service {} (pid {}) exited with {}",
            name,
            child.pid,
            child.status
        );

        if !record.definition.respawn {
            record.set_stopped();
            return;
        }

        if record.respawn_allowed() {
            record.schedule_respawn(RESPAWN_DELAY);
            log::info!(
                "Respawning service {} ({}/{})",
                name,
                record.respawn_count(),
                RESPAWN_CEILING
            );
        } else {
            record.set_failed();
            log::warn!("Service {} failed too many times, not respawning", name);
        }
    }

    /// Start services whose respawn pause has elapsed.
    ///
    /// Respawns are strictly sequential per service: the restart was
    /// scheduled by a reaped exit, so the previous process is gone.
    pub fn process_restarts(&mut self) {
        let due: Vec<String> = self
            .store
            .iter()
            .filter(|rec| rec.state() == ServiceState::Stopped && rec.restart_due())
            .map(|rec| rec.name().to_string())
            .collect();

        for name in due {
            if let Some(record) = self.store.get_mut(&name) {
                record.clear_restart();
            }
            self.start(&name);
        }
    }

    /// Deadline of the nearest pending restart, if any.
    fn next_restart(&self) -> Option<Instant> {
        self.store.iter().filter_map(|rec| rec.restart_at()).min()
    }

    /// Bounded wait until the next piece of timed work.
    fn idle_wait(&self) -> Duration {
        match self.next_restart() {
            Some(at) => at.saturating_duration_since(Instant::now()).min(IDLE_WAIT),
            None => IDLE_WAIT,
        }
    }

    /// Run the control loop until a termination request arrives.
    ///
    /// Startup first brings the store to its fixed point; afterwards the
    /// loop only services reap events and respawn decisions. Signal-derived
    /// work is picked up on the next iteration, and the idle sleep exists
    /// only to guard against missed notifications.
    pub async fn run(&mut self, mut signals: mpsc::Receiver<InitSignal>) -> ShutdownMode {
        let started = self.start_eligible();
        log::info!(
            "System initialization complete, {} of {} services started",
            started.len(),
            self.store.len()
        );

        loop {
            tokio::select! {
                sig = signals.recv() => match sig {
                    Some(InitSignal::Child) => self.service_exits(),
                    Some(InitSignal::Term) => {
                        log::info!("Received SIGTERM, initiating poweroff");
                        return ShutdownMode::Poweroff;
                    }
                    Some(InitSignal::Int) => {
                        log::info!("Received SIGINT, initiating reboot");
                        return ShutdownMode::Reboot;
                    }
                    Some(InitSignal::Usr1) => self.dump_state(),
                    None => {
                        // Router gone; degrade to pure polling.
                        sleep(self.idle_wait()).await;
                        self.service_exits();
                    }
                },
                _ = sleep(self.idle_wait()) => {
                    self.service_exits();
                }
            }
            self.process_restarts();
        }
    }

    /// Terminate every running service: graceful signal, fixed grace
    /// period, forceful signal, then a final non-blocking drain.
    ///
    /// A second invocation finds no running services and sends nothing.
    pub async fn shutdown_all(&mut self) {
        let running = self.store.running();
        if running.is_empty() {
            return;
        }

        log::info!("Stopping all services...");
        for name in &running {
            if let Some(pid) = self.store.get(name).and_then(|r| r.pid()) {
                log::info!("  Stopping {} (pid {})", name, pid);
                process::signal(pid, Signal::SIGTERM);
            }
        }

        sleep(SHUTDOWN_GRACE).await;
        self.drain_exits_for_shutdown();

        for name in &running {
            if let Some(pid) = self.store.get(name).and_then(|r| r.pid()) {
                log::info!("  Force killing {} (pid {})", name, pid);
                process::signal(pid, Signal::SIGKILL);
            }
        }

        // Give the kernel a moment to deliver the kills, then collect
        // whatever is left without blocking.
        sleep(Duration::from_millis(100)).await;
        self.drain_exits_for_shutdown();

        // SIGKILL cannot be caught; anything still unreaped is dead.
        for name in &running {
            if let Some(record) = self.store.get_mut(name) {
                if record.is_running() {
                    record.set_stopped();
                }
            }
        }
    }

    /// Reap exits during shutdown. The respawn policy does not apply
    /// here: every exit is a plain stop.
    fn drain_exits_for_shutdown(&mut self) {
        for child in process::drain() {
            if let Some(record) = self.store.by_pid_mut(child.pid) {
                log::info!(
                    "Service {} (pid {}) exited with {}",
                    record.name(),
                    child.pid,
                    child.status
                );
                record.set_stopped();
            }
        }
    }

    /// Log the state of every service (SIGUSR1).
    fn dump_state(&self) {
        log::info!("Service states:");
        for rec in self.store.iter() {
            match rec.pid() {
                Some(pid) => {
                    log::info!("  {}: {} (pid {})", rec.name(), rec.state().as_str(), pid)
                }
                None => log::info!("  {}: {}", rec.name(), rec.state().as_str()),
            }
        }
    }
}
