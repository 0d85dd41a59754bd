//! Rokenbok hub server: entry point.
//!
//! Shares the eight controller channels of one Rokenbok hub with up to eight
//! remote clients.  The hub is driven through a microcontroller on a serial
//! port; clients connect over TCP and send key events.
//!
//! # Usage
//!
//! ```text
//! rokenbok-server [OPTIONS]
//!
//! Options:
//!   --config      <PATH>  TOML configuration file
//!   --bind        <ADDR>  Listen address [config default: 0.0.0.0]
//!   --port        <PORT>  Listen port [config default: 8080]
//!   --serial-port <PATH>  Serial device of the hub adapter [default: auto-detect]
//! ```
//!
//! Each option can also be given through the environment (`ROKENBOK_CONFIG`,
//! `ROKENBOK_BIND`, `ROKENBOK_PORT`, `ROKENBOK_SERIAL_PORT`).  Options given on
//! the command line or in the environment override the file.
//!
//! # Signals
//!
//! | Signal | Effect |
//! |---|---|
//! | Ctrl+C / SIGTERM | graceful shutdown: stop accepting, end every session, neutralise the hub, close the link |
//! | SIGHUP (Unix) | restart the hub link |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rokenbok_core::HubState;
use rokenbok_server::application::controller_pool::ControllerPool;
use rokenbok_server::application::hub_commands::HubCommands;
use rokenbok_server::infrastructure::network::acceptor::Acceptor;
use rokenbok_server::infrastructure::serial::link::SerialPortOpener;
use rokenbok_server::infrastructure::serial::sync_loop::SerialSync;
use rokenbok_server::infrastructure::storage::config::{load_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Rokenbok hub server.
#[derive(Debug, Parser)]
#[command(
    name = "rokenbok-server",
    about = "Shares a Rokenbok hub's controller channels with remote clients",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.  Defaults apply when omitted.
    #[arg(long, env = "ROKENBOK_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "ROKENBOK_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "ROKENBOK_PORT")]
    port: Option<u16>,

    /// Serial device of the hub's microcontroller, e.g. `/dev/ttyACM0`.
    #[arg(long, env = "ROKENBOK_SERIAL_PORT")]
    serial_port: Option<String>,
}

impl Cli {
    /// Overrides file settings with whatever was given on the command line.
    fn apply_to(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(serial_port) = &self.serial_port {
            config.hub.serial_port = Some(serial_port.clone());
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_to(&mut config);

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let bind_addr = config.bind_addr().context("invalid listen address")?;
    info!("Rokenbok hub server starting on {bind_addr}");

    // ── Shared state and the serial link ──────────────────────────────────────
    let state = Arc::new(HubState::new());
    let opener = Arc::new(SerialPortOpener::new(
        config.hub.serial_port.clone(),
        config.hub.baud_rate,
    ));
    let sync = Arc::new(SerialSync::new(
        Arc::clone(&state),
        opener,
        config.sync_config(),
    ));

    // ── TCP acceptor ──────────────────────────────────────────────────────────
    let pool = ControllerPool::new(Arc::clone(&state));
    let hub: Arc<dyn HubCommands> = sync.clone();
    let acceptor = Acceptor::bind(bind_addr, pool, hub, config.session_config())
        .await
        .context("failed to start listener")?;

    #[cfg(unix)]
    restart_on_hangup(Arc::clone(&sync)).context("failed to install SIGHUP handler")?;

    // Opening the link retries until the device shows up; clients may
    // connect in the meantime.
    let starter = {
        let sync = Arc::clone(&sync);
        tokio::task::spawn_blocking(move || sync.start())
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(acceptor.run(shutdown_rx));

    let signal_result = wait_for_shutdown_signal().await;
    if let Err(e) = &signal_result {
        error!("{e:#}");
    }

    // ── Graceful shutdown ─────────────────────────────────────────────────────
    info!("shutting down");
    let _ = shutdown_tx.send(true);
    // A start or restart still waiting for the device must not outlive the
    // handlers it would otherwise block.
    sync.interrupt();
    if let Err(e) = server.await {
        error!("acceptor task failed: {e}");
    }

    let stopper = Arc::clone(&sync);
    tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .context("hub stop task failed")?;
    match starter.await {
        Ok(true) => {}
        Ok(false) => warn!("hub link was never opened"),
        Err(e) => error!("hub start task failed: {e}"),
    }

    info!("Rokenbok hub server stopped");
    signal_result
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl+C")?,
            _ = terminate.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
    }
    Ok(())
}

/// Restarts the hub link every time SIGHUP arrives.
#[cfg(unix)]
fn restart_on_hangup(sync: Arc<SerialSync>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("received SIGHUP");
            let sync = Arc::clone(&sync);
            if let Err(e) = tokio::task::spawn_blocking(move || sync.restart_hub()).await {
                error!("hub restart task failed: {e}");
            }
        }
    });
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
