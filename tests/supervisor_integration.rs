//! Integration tests for the supervisor using real child processes
//!
//! Exits are collected with waitpid(-1), so tests that spawn children
//! serialize on a process-wide lock to keep one test from reaping
//! another's children.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use frostd::pid1::{InitSignal, ShutdownMode};
use frostd::supervisor::{ServiceState, Supervisor, RESPAWN_CEILING};
use frostd::units::ServiceDefinition;

static REAP_LOCK: Mutex<()> = Mutex::new(());

fn definition(name: &str, command: &str, depends: &[&str], respawn: bool) -> ServiceDefinition {
    let mut def = ServiceDefinition::new(name, command);
    def.depends = depends.iter().map(|s| s.to_string()).collect();
    def.respawn = respawn;
    def
}

fn state_of(sup: &Supervisor, name: &str) -> ServiceState {
    sup.store().get(name).unwrap().state()
}

/// Drive reaping and restarts until `pred` holds or `timeout` elapses.
async fn drive_until(
    sup: &mut Supervisor,
    timeout: Duration,
    mut pred: impl FnMut(&Supervisor) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        sup.service_exits();
        sup.process_restarts();
        if pred(sup) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_start_order_follows_dependencies() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![
        definition("web", "/bin/sleep 30", &["dnsd"], false),
        definition("net", "/bin/sleep 30", &[], false),
        definition("dnsd", "/bin/sleep 30", &["net"], false),
    ]);

    // Each pass only sees the services made runnable by the pass before
    // it, so the start order follows the dependency chain.
    let started = sup.start_eligible();
    assert_eq!(started, vec!["net", "dnsd", "web"]);

    for name in ["net", "dnsd", "web"] {
        assert_eq!(state_of(&sup, name), ServiceState::Running);
        assert!(sup.store().get(name).unwrap().pid().is_some());
    }

    sup.shutdown_all().await;
    for name in ["net", "dnsd", "web"] {
        assert_ne!(state_of(&sup, name), ServiceState::Running);
    }
}

#[tokio::test]
async fn test_cycle_members_never_start() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![
        definition("a", "/bin/sleep 30", &["b"], false),
        definition("b", "/bin/sleep 30", &["a"], false),
    ]);

    // The fixed point terminates without starting either cycle member.
    assert!(sup.start_eligible().is_empty());
    assert_eq!(state_of(&sup, "a"), ServiceState::Stopped);
    assert_eq!(state_of(&sup, "b"), ServiceState::Stopped);
}

#[tokio::test]
async fn test_missing_dependency_starves() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![definition("web", "/bin/sleep 30", &["ghost"], false)]);

    assert!(sup.start_eligible().is_empty());

    let reached = drive_until(&mut sup, Duration::from_millis(300), |s| {
        state_of(s, "web") != ServiceState::Stopped
    })
    .await;
    assert!(!reached, "service with unsatisfiable dependency must stay stopped");
}

#[tokio::test]
async fn test_no_respawn_service_stops() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![definition("oneshot", "/bin/true", &[], false)]);
    sup.start_eligible();

    assert!(
        drive_until(&mut sup, Duration::from_secs(5), |s| {
            state_of(s, "oneshot") == ServiceState::Stopped
        })
        .await
    );

    let rec = sup.store().get("oneshot").unwrap();
    assert!(!rec.restart_pending());
    assert_eq!(rec.respawn_count(), 0);

    // No further start happens without an explicit trigger.
    let restarted = drive_until(&mut sup, Duration::from_millis(500), |s| {
        state_of(s, "oneshot") != ServiceState::Stopped
    })
    .await;
    assert!(!restarted);
}

#[tokio::test]
async fn test_respawn_ceiling_ends_in_failed() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![definition("flaky", "/bin/false", &[], true)]);
    sup.start_eligible();

    assert!(
        drive_until(&mut sup, Duration::from_secs(20), |s| {
            state_of(s, "flaky") == ServiceState::Failed
        })
        .await
    );

    let rec = sup.store().get("flaky").unwrap();
    assert_eq!(rec.respawn_count(), RESPAWN_CEILING);
    assert!(rec.pid().is_none());

    // Terminal: nothing brings it back.
    let restarted = drive_until(&mut sup, Duration::from_millis(500), |s| {
        state_of(s, "flaky") != ServiceState::Failed
    })
    .await;
    assert!(!restarted);
}

#[tokio::test]
async fn test_bad_executable_surfaces_as_exit() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![definition(
        "broken",
        "/nonexistent/frostd-test-binary",
        &[],
        false,
    )]);

    // Process creation succeeds; the exec failure is not synchronous.
    assert_eq!(sup.start_eligible(), vec!["broken"]);

    assert!(
        drive_until(&mut sup, Duration::from_secs(5), |s| {
            state_of(s, "broken") == ServiceState::Stopped
        })
        .await
    );
}

#[tokio::test]
async fn test_shutdown_terminates_and_is_idempotent() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![
        definition("net", "/bin/sleep 30", &[], false),
        definition("logd", "/bin/sleep 30", &[], true),
    ]);
    sup.start_eligible();

    sup.shutdown_all().await;

    for name in ["net", "logd"] {
        let rec = sup.store().get(name).unwrap();
        assert!(!rec.is_running());
        assert!(rec.pid().is_none());
        // Shutdown must not queue respawns, even for respawn services.
        assert!(!rec.restart_pending());
    }

    // A second invocation finds nothing running and sends nothing.
    let before = Instant::now();
    sup.shutdown_all().await;
    assert!(before.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_term_and_int_end_the_control_loop() {
    let mut sup = Supervisor::new(Vec::new());

    let (tx, rx) = mpsc::channel(8);
    tx.send(InitSignal::Term).await.unwrap();
    assert_eq!(sup.run(rx).await, ShutdownMode::Poweroff);

    let (tx, rx) = mpsc::channel(8);
    tx.send(InitSignal::Int).await.unwrap();
    assert_eq!(sup.run(rx).await, ShutdownMode::Reboot);
}

#[tokio::test]
async fn test_run_supervises_until_termination_request() {
    let _lock = REAP_LOCK.lock().unwrap();

    let mut sup = Supervisor::new(vec![definition("net", "/bin/sleep 30", &[], false)]);
    let (tx, rx) = mpsc::channel(8);

    let sender = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = tx.send(InitSignal::Term).await;
    });

    let mode = sup.run(rx).await;
    sender.await.unwrap();

    assert_eq!(mode, ShutdownMode::Poweroff);
    assert_eq!(state_of(&sup, "net"), ServiceState::Running);

    sup.shutdown_all().await;
    assert_ne!(state_of(&sup, "net"), ServiceState::Running);
}
