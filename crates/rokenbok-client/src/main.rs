//! Rokenbok remote client: entry point.
//!
//! Connects to a hub server, borrows one controller, and forwards key events
//! read from stdin, one per line (`+up`, `-up`, `+w`, `+3`, ...).
//!
//! # Usage
//!
//! ```text
//! rokenbok-client [OPTIONS]
//!
//! Options:
//!   --host <HOST>  Server hostname or IP [default: 127.0.0.1]
//!   --port <PORT>  Server port [default: 8080]
//! ```
//!
//! # Threads
//!
//! Reading stdin blocks, so it runs on its own OS thread and feeds a
//! [`KeyListener`], which passes de-duplicated events to the async session
//! over an unbounded channel.  End of input releases every held key and ends
//! the session.

use std::io::BufRead;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rokenbok_client::application::key_events::{parse_key_line, KeyListener};
use rokenbok_client::infrastructure::network::{ClientConfig, ClientSession, EndReason, SessionEvent};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Rokenbok remote client.
#[derive(Debug, Parser)]
#[command(
    name = "rokenbok-client",
    about = "Drives one Rokenbok controller over the network",
    version
)]
struct Cli {
    /// Hostname or IP address of the hub server.
    #[arg(long, default_value = "127.0.0.1", env = "ROKENBOK_HOST")]
    host: String,

    /// TCP port of the hub server.
    #[arg(long, default_value_t = 8080, env = "ROKENBOK_PORT")]
    port: u16,

    /// How long to wait for the server's END when leaving, in milliseconds.
    #[arg(long, default_value_t = 500)]
    linger_ms: u64,
}

impl Cli {
    fn into_client_config(self) -> ClientConfig {
        ClientConfig {
            server_addr: format!("{}:{}", self.host, self.port),
            linger: Duration::from_millis(self.linger_ms),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_client_config();

    let session = match ClientSession::connect(&config).await {
        Ok(session) => session,
        Err(e) if e.is_server_full() => {
            anyhow::bail!("all controllers are in use, try again later");
        }
        Err(e) => return Err(e).context("could not start a session"),
    };

    // ── Key input ─────────────────────────────────────────────────────────────
    let (key_tx, mut key_rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-keys".to_string())
        .spawn(move || read_keys(KeyListener::new(key_tx)))
        .context("failed to spawn stdin reader")?;

    // ── Status reporting ──────────────────────────────────────────────────────
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(SessionEvent::Selection(selection)) = event_rx.recv().await {
            match selection {
                Some(car) => info!("driving {car}"),
                None => info!("no vehicle selected"),
            }
        }
    });

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    info!("controller ready; type +key / -key lines (e.g. +up, -up, +3)");
    match session.run(&mut key_rx, &event_tx, shutdown_rx).await {
        EndReason::TransportBroken => warn!("lost connection to the server"),
        EndReason::PeerEnded => info!("server ended the session"),
        EndReason::InputClosed | EndReason::Shutdown => {}
    }
    Ok(())
}

/// Blocking stdin loop run on the `stdin-keys` thread.
fn read_keys(mut listener: KeyListener) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("failed to read stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_key_line(&line) {
            Ok(event) => {
                listener.handle(event);
            }
            Err(e) => warn!("{e}"),
        }
        if listener.is_closed() {
            return;
        }
    }
    listener.release_all();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_target_local_server() {
        // Arrange
        let cli = Cli::parse_from(["rokenbok-client"]);

        // Act
        let config = cli.into_client_config();

        // Assert
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.linger, Duration::from_millis(500));
    }

    #[test]
    fn test_cli_host_and_port_combine() {
        let cli = Cli::parse_from(["rokenbok-client", "--host", "hub.local", "--port", "9000"]);

        assert_eq!(cli.into_client_config().server_addr, "hub.local:9000");
    }
}
