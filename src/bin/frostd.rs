//! frostd - minimal init daemon
//!
//! Loads service definitions from the services directory, starts them
//! in dependency order, and supervises them until a shutdown signal
//! arrives.
//!
//! When running as PID 1 the final shutdown hands control to the
//! platform reboot syscall; otherwise the process simply exits, which
//! makes the daemon usable inside a container or for local testing.

use std::path::PathBuf;

use clap::Parser;
use log::info;

use frostd::pid1::{self, SignalRouter};
use frostd::supervisor::Supervisor;
use frostd::units;

/// Default location of service definition files
const SERVICE_DIR: &str = "/etc/frostd/services";

#[derive(Parser)]
#[command(name = "frostd")]
#[command(about = "Minimal init system and service supervisor")]
#[command(
    long_about = "frostd starts the services found in the services directory as their \
    dependencies come up, respawns crashed services up to a lifetime ceiling, and drives \
    the graceful-then-forced shutdown sequence on SIGTERM (poweroff) or SIGINT (reboot)."
)]
struct Args {
    /// Directory containing service definition files
    #[arg(long, default_value = SERVICE_DIR)]
    service_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if pid1::is_pid1() {
        info!("Running as PID 1");
    } else {
        log::debug!(
            "Not PID 1 (pid={}), shutdown will exit instead of calling reboot",
            std::process::id()
        );
    }

    // A missing services directory degrades to an empty system; init
    // keeps running either way.
    let definitions = match units::load_services(&args.service_dir) {
        Ok(defs) => defs,
        Err(e) => {
            log::warn!("{}", e);
            Vec::new()
        }
    };

    let mut supervisor = Supervisor::new(definitions);
    let signals = SignalRouter::new()?.spawn_forwarder();

    let mode = supervisor.run(signals).await;

    info!("Shutting down...");
    supervisor.shutdown_all().await;

    if pid1::is_pid1() {
        pid1::shutdown(mode);
    }

    info!("Not PID 1, exiting ({:?} requested)", mode);
    Ok(())
}
