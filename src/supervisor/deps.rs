//! Dependency resolution
//!
//! Decides which stopped services may start given current statuses.
//! Startup repeats the eligibility pass until a pass starts nothing, so
//! each pass sees the `Running` states produced by the one before it.
//! This is a breadth-first fixed point over the dependency graph, not a
//! topological sort: a dependency cycle is tolerated rather than
//! detected, its members just never become eligible and startup
//! terminates without them.

use super::store::{ServiceRecord, ServiceState, ServiceStore};

/// Services currently `Stopped`, with no restart pending, whose entire
/// dependency list is satisfied.
pub fn eligible(store: &ServiceStore) -> Vec<String> {
    store
        .iter()
        .filter(|rec| rec.state() == ServiceState::Stopped && !rec.restart_pending())
        .filter(|rec| satisfied(store, rec))
        .map(|rec| rec.name().to_string())
        .collect()
}

/// A dependency is satisfied when it exists in the store and is running.
/// A name that resolves to no loaded service is never satisfied.
fn satisfied(store: &ServiceStore, record: &ServiceRecord) -> bool {
    record
        .definition
        .depends
        .iter()
        .all(|dep| store.is_running(dep))
}

/// Warn about dependency names that resolve to no loaded service.
///
/// Called once right after load, so each missing name is reported
/// exactly once rather than on every resolver pass. Such dependencies
/// stay permanently unsatisfied and leave the dependent service
/// starvable.
pub fn warn_missing(store: &ServiceStore) {
    for rec in store.iter() {
        for dep in &rec.definition.depends {
            if !store.contains(dep) {
                log::warn!("Dependency {} not found for service {}", dep, rec.name());
            }
        }
    }
}
