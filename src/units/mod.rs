//! Service definitions
//!
//! A service is described by one small file in the services directory.
//! The loader turns each file into a validated [`ServiceDefinition`];
//! the supervisor never looks at the files themselves.

mod loader;

pub use loader::{load_services, parse_definition, LoadError};

/// A validated service definition, as yielded by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Unique name (case-sensitive, taken from the file name)
    pub name: String,
    /// Command line, tokenized on whitespace at spawn time (no quoting)
    pub command: String,
    /// Names of services that must be running before this one may start
    pub depends: Vec<String>,
    /// Restart the service when it exits, up to the respawn ceiling
    pub respawn: bool,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            depends: Vec::new(),
            respawn: false,
        }
    }
}
