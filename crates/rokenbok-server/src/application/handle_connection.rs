//! Per-client connection handler.
//!
//! A [`Connection`] is created by the acceptor once a controller slot has
//! been granted and START has been sent.  It then runs until the client ends
//! the session, the transport breaks, or the server shuts down:
//!
//! ```text
//! loop
//!  ├─ frame from client ── KEY_PRESS ──► apply_key ──► HubCommands
//!  │                    └─ END ────────► reply END, stop
//!  ├─ status timer ───────► TRUE_SEL(current selection)
//!  └─ shutdown signal ────► send END, wait briefly for the client's END, stop
//! ```
//!
//! Whatever the exit path, the handler makes a best-effort attempt to send
//! END, closes the transport, and drops its [`ControllerSlot`], which resets
//! the player to neutral and returns the slot to the pool.

use std::sync::Arc;
use std::time::Duration;

use rokenbok_core::protocol::session::Session;
use rokenbok_core::{Car, FramedTransport, Message, TransportError};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::application::controller_pool::ControllerSlot;
use crate::application::hub_commands::{apply_key, HubCommands, KeyOutcome};

/// Which selection TRUE_SEL reports to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// The selection last delivered to the hub over the serial link.
    #[default]
    Observed,
    /// The selection the player asked for.
    Desired,
}

/// Per-session timing and reporting settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How often TRUE_SEL is pushed to the client.
    pub status_interval: Duration,
    /// How long to wait for the client's END after sending ours.
    pub linger: Duration,
    pub status_source: StatusSource,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(1),
            linger: Duration::from_millis(500),
            status_source: StatusSource::Observed,
        }
    }
}

/// Why a connection handler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The client sent END.
    PeerEnded,
    /// The transport reported EOF or an I/O error.
    TransportBroken,
    /// The server is shutting down.
    Shutdown,
}

/// One accepted client bound to one controller slot.
pub struct Connection<S> {
    transport: FramedTransport<S>,
    slot: ControllerSlot,
    session: Session,
    hub: Arc<dyn HubCommands>,
    config: SessionConfig,
    peer: String,
    last_status: Instant,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a connection whose handshake already granted `slot`.
    pub fn new(
        transport: FramedTransport<S>,
        slot: ControllerSlot,
        session: Session,
        hub: Arc<dyn HubCommands>,
        config: SessionConfig,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            slot,
            session,
            hub,
            config,
            peer: peer.into(),
            last_status: Instant::now(),
        }
    }

    /// Runs the handler to completion and releases the slot.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ExitReason {
        let player = self.slot.player();
        let peer = self.peer.clone();
        info!("{peer} controls {player}");

        let reason = match self.push_status().await {
            Ok(()) => self.serve(&mut shutdown).await,
            Err(_) => ExitReason::TransportBroken,
        };

        self.finish(reason).await;
        info!("closed connection {peer} ({player}): {reason:?}");
        reason
    }

    async fn serve(&mut self, shutdown: &mut watch::Receiver<bool>) -> ExitReason {
        loop {
            if *shutdown.borrow() {
                return ExitReason::Shutdown;
            }
            let next_status = self.last_status + self.config.status_interval;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return ExitReason::Shutdown;
                    }
                }
                received = self.transport.recv_message() => match received {
                    Ok(msg) => {
                        if let Some(reason) = self.dispatch(msg, shutdown).await {
                            return reason;
                        }
                    }
                    Err(e) if !e.is_fatal() => {
                        warn!("{}: ignoring bad frame: {e}", self.peer);
                    }
                    Err(TransportError::ConnectionBroken) => {
                        debug!("{}: connection broken", self.peer);
                        return ExitReason::TransportBroken;
                    }
                    Err(e) => {
                        warn!("{}: transport error: {e}", self.peer);
                        return ExitReason::TransportBroken;
                    }
                },
                _ = time::sleep_until(next_status) => {
                    if let Err(e) = self.push_status().await {
                        debug!("{}: status push failed: {e}", self.peer);
                        return ExitReason::TransportBroken;
                    }
                }
            }
        }
    }

    /// Handles one inbound message.  Returns `Some` when the session is over.
    async fn dispatch(
        &mut self,
        msg: Message,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<ExitReason> {
        if !self.session.accepts(&msg) {
            debug!("{}: ignoring {:?} from client", self.peer, msg.message_type());
            return None;
        }

        match msg {
            Message::KeyPress { code, pressed } => {
                let player = self.slot.player();
                match apply_key(self.hub.as_ref(), player, code, pressed) {
                    KeyOutcome::RestartRequested => {
                        info!("{player} requested a hub restart");
                        return self.restart_hub(shutdown).await;
                    }
                    KeyOutcome::SelectionRejected(car) => {
                        debug!("{player}: {car} is already taken");
                    }
                    outcome => debug!("{player}: key {code} -> {outcome:?}"),
                }
                None
            }
            Message::End => {
                self.session.begin_close();
                Some(ExitReason::PeerEnded)
            }
            _ => None,
        }
    }

    /// Runs a hub restart on the blocking pool.  Reopening the link can
    /// retry for as long as the device is missing, so a shutdown stops the
    /// wait and leaves the restart to wind down on its own.
    async fn restart_hub(&self, shutdown: &mut watch::Receiver<bool>) -> Option<ExitReason> {
        let hub = Arc::clone(&self.hub);
        let restart = tokio::task::spawn_blocking(move || hub.restart_hub());
        tokio::select! {
            joined = restart => {
                if let Err(e) = joined {
                    warn!("hub restart task failed: {e}");
                }
                None
            }
            _ = async { shutdown.wait_for(|stop| *stop).await.is_ok() } => {
                info!("{}: shutdown during hub restart", self.peer);
                Some(ExitReason::Shutdown)
            }
        }
    }

    async fn push_status(&mut self) -> Result<(), TransportError> {
        let selection = self.current_selection();
        self.transport.send_message(&Message::TrueSel(selection)).await?;
        self.last_status = Instant::now();
        Ok(())
    }

    fn current_selection(&self) -> Option<Car> {
        let selections = self.hub.selections();
        let index = self.slot.player().index();
        match self.config.status_source {
            StatusSource::Observed => selections.observed[index],
            StatusSource::Desired => selections.desired[index],
        }
    }

    async fn finish(mut self, reason: ExitReason) {
        self.session.begin_close();
        let sent = self.transport.send_message(&Message::End).await.is_ok();

        // We initiated the close: give the client a moment to answer END.
        if sent && reason == ExitReason::Shutdown {
            let linger = self.config.linger;
            let transport = &mut self.transport;
            let _ = time::timeout(linger, async {
                while let Ok(msg) = transport.recv_message().await {
                    if msg == Message::End {
                        break;
                    }
                }
            })
            .await;
        }

        self.transport.close().await;
        self.session.close();
        // `self.slot` drops here and returns to the pool.
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
