//! `run`: keep the sync scheduler going until the process is told to stop.

use tracing::{info, warn};

use pppwatch_core::Monitor;

use crate::error::CliError;

pub async fn handle(monitor: &Monitor) -> Result<(), CliError> {
    let routers = monitor.list_routers().await?;
    let active = routers.iter().filter(|r| r.active).count();
    if active == 0 {
        warn!("no active routers; register one with `pppwatch routers add`");
    }
    info!(routers = routers.len(), active, "starting sync scheduler");

    monitor.start().await;
    shutdown_signal().await?;
    info!("shutdown requested");
    // The caller stops the monitor.
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
