//! Service file loader
//!
//! Reads one file per service from the services directory. Files are
//! plain `key=value` lines:
//!
//! ```text
//! # DNS resolver
//! exec=/usr/bin/dnsd --foreground
//! depends=net
//! respawn=yes
//! ```
//!
//! `depends=` may be repeated and takes whitespace-separated names.
//! Unknown keys are ignored so the format can grow without breaking
//! older inits. Dotfiles, unreadable files, and files without an
//! `exec=` line are skipped.

use std::fs;
use std::path::Path;

use super::ServiceDefinition;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Could not open service directory {0}: {1}")]
    Directory(String, std::io::Error),
}

/// Load all service definitions from a directory.
///
/// Skipped entries are logged; only the directory itself being
/// unreadable is an error.
pub fn load_services(dir: &Path) -> Result<Vec<ServiceDefinition>, LoadError> {
    log::info!("Loading services from {}...", dir.display());

    let entries =
        fs::read_dir(dir).map_err(|e| LoadError::Directory(dir.display().to_string(), e))?;

    let mut definitions = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Skipping unreadable service file {}: {}", path.display(), e);
                continue;
            }
        };

        match parse_definition(&name, &content) {
            Some(def) => {
                log::info!("  Loaded service: {}", def.name);
                definitions.push(def);
            }
            None => {
                log::warn!("Skipping {}: no exec command", path.display());
            }
        }
    }

    log::info!("Loaded {} services", definitions.len());
    Ok(definitions)
}

/// Parse one service file. Returns `None` when no exec command is
/// present, which marks the unit as malformed.
pub fn parse_definition(name: &str, content: &str) -> Option<ServiceDefinition> {
    let mut command = String::new();
    let mut depends = Vec::new();
    let mut respawn = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        match key.trim() {
            "exec" => command = value.trim().to_string(),
            "depends" => depends.extend(value.split_whitespace().map(str::to_string)),
            "respawn" => respawn = value.trim() == "yes",
            other => log::debug!("{}: ignoring unknown key '{}'", name, other),
        }
    }

    if command.is_empty() {
        return None;
    }

    Some(ServiceDefinition {
        name: name.to_string(),
        command,
        depends,
        respawn,
    })
}
