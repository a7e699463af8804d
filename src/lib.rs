//! frostd - minimal init system and service supervisor
//!
//! A Rust implementation that:
//! - Loads plain `key=value` service definitions
//! - Starts services as their dependencies come up
//! - Supervises the resulting processes and respawns crashed services
//! - Drives graceful-then-forced termination before power-off or reboot
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                     frostd                       │
//! ├──────────────────────────────────────────────────┤
//! │ Service Loader │   Supervisor   │  Signal Router │
//! ├──────────────────────────────────────────────────┤
//! │        fork/exec · waitpid · kill · reboot       │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod pid1;
pub mod supervisor;
pub mod units;

pub use supervisor::Supervisor;
pub use units::ServiceDefinition;
