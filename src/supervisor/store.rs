//! Service records and their state machine
//!
//! ```text
//!     ┌─────────┐  deps satisfied  ┌──────────┐       ┌─────────┐
//!     │ Stopped │─────────────────▶│ Starting │──────▶│ Running │
//!     └─────────┘                  └──────────┘       └────┬────┘
//!          ▲                                               │ exit
//!          │ respawn (counter below ceiling, short pause)  │
//!          └───────────────────────────────────────────────┤
//!                                                          │ ceiling reached
//!                                                     ┌────▼────┐
//!                                                     │ Failed  │
//!                                                     └─────────┘
//! ```
//!
//! `Starting` is transient: process creation is treated as instantly
//! successful, so a start collapses to `Running` in the same step. A bad
//! executable only shows up later as an exit event.
//!
//! The respawn counter covers the supervisor's whole lifetime and never
//! resets, even after long healthy runs. A service therefore gets at
//! most [`RESPAWN_CEILING`] automatic restarts until the next boot.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nix::unistd::Pid;

use crate::units::ServiceDefinition;

/// Lifetime respawn ceiling per service
pub const RESPAWN_CEILING: u32 = 5;

/// Lifecycle state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Failed,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Failed => "failed",
        }
    }
}

/// A service definition plus its runtime state.
///
/// State and pid stay consistent: `Running` always has a pid, every
/// other state has none. All mutation goes through the setters below.
#[derive(Debug)]
pub struct ServiceRecord {
    pub definition: ServiceDefinition,
    state: ServiceState,
    pid: Option<Pid>,
    respawn_count: u32,
    restart_at: Option<Instant>,
}

impl ServiceRecord {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self {
            definition,
            state: ServiceState::Stopped,
            pid: None,
            respawn_count: 0,
            restart_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn respawn_count(&self) -> u32 {
        self.respawn_count
    }

    pub fn is_running(&self) -> bool {
        self.state == ServiceState::Running
    }

    pub fn set_starting(&mut self) {
        self.state = ServiceState::Starting;
    }

    pub fn set_running(&mut self, pid: Pid) {
        self.state = ServiceState::Running;
        self.pid = Some(pid);
        self.restart_at = None;
    }

    pub fn set_stopped(&mut self) {
        self.state = ServiceState::Stopped;
        self.pid = None;
    }

    /// Terminal: no dependency will treat the service as running again
    /// and no respawn will occur.
    pub fn set_failed(&mut self) {
        self.state = ServiceState::Failed;
        self.pid = None;
        self.restart_at = None;
    }

    /// Record a respawn decision: bump the lifetime counter and schedule
    /// the restart after `delay`.
    pub fn schedule_respawn(&mut self, delay: Duration) {
        self.state = ServiceState::Stopped;
        self.pid = None;
        self.respawn_count += 1;
        self.restart_at = Some(Instant::now() + delay);
    }

    /// Whether an automatic restart may still happen for this service.
    pub fn respawn_allowed(&self) -> bool {
        self.definition.respawn && self.respawn_count < RESPAWN_CEILING
    }

    pub fn restart_pending(&self) -> bool {
        self.restart_at.is_some()
    }

    pub fn restart_due(&self) -> bool {
        self.restart_at.map(|t| Instant::now() >= t).unwrap_or(false)
    }

    pub fn restart_at(&self) -> Option<Instant> {
        self.restart_at
    }

    pub fn clear_restart(&mut self) {
        self.restart_at = None;
    }
}

/// In-memory table of all services, keyed by name.
///
/// Records are created once at load time and never removed. Only the
/// control loop and the components it calls synchronously mutate them;
/// there is no concurrent writer.
#[derive(Debug, Default)]
pub struct ServiceStore {
    records: HashMap<String, ServiceRecord>,
}

impl ServiceStore {
    pub fn new(definitions: Vec<ServiceDefinition>) -> Self {
        let mut records = HashMap::new();
        for def in definitions {
            records.insert(def.name.clone(), ServiceRecord::new(def));
        }
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRecord> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ServiceRecord> {
        self.records.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.values()
    }

    /// Find the record owning a pid.
    pub fn by_pid_mut(&mut self, pid: Pid) -> Option<&mut ServiceRecord> {
        self.records.values_mut().find(|rec| rec.pid == Some(pid))
    }

    /// Whether `name` exists and is currently running.
    pub fn is_running(&self, name: &str) -> bool {
        self.records.get(name).map(|r| r.is_running()).unwrap_or(false)
    }

    /// Names of all currently running services.
    pub fn running(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|r| r.is_running())
            .map(|r| r.name().to_string())
            .collect()
    }
}
