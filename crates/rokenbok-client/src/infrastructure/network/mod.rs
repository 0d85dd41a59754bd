//! Network infrastructure for the client application.
//!
//! A [`ClientSession`] is one TCP connection to the hub server:
//!
//! ```text
//! connect ──► greeting ── START ──► run: keys ─► KEY_PRESS
//!                │                       TRUE_SEL ─► SessionEvent::Selection
//!                │                       END / shutdown / broken ─► finish
//!                └─ FULL or other ──► send END, close, error
//! ```
//!
//! The session never reconnects by itself.  A FULL server or a dropped
//! connection ends the program; the user starts it again.

use std::time::Duration;

use rokenbok_core::protocol::session::{Role, Session};
use rokenbok_core::{Car, FramedTransport, HandshakeError, Message, TransportError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

use crate::application::key_events::KeyEvent;

/// Errors that can occur while establishing a session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server refused the session or answered with nonsense.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
}

impl ClientError {
    /// `true` when every controller slot was taken.
    pub fn is_server_full(&self) -> bool {
        matches!(self, ClientError::Handshake(HandshakeError::ServerFull))
    }
}

/// Configuration for the client's connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the server.
    pub server_addr: String,
    /// How long to wait for the server's END after sending ours.
    pub linger: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            linger: Duration::from_millis(500),
        }
    }
}

/// Events reported to the application while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The vehicle this controller currently drives.  Sent only on change.
    Selection(Option<Car>),
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The server sent END.
    PeerEnded,
    /// The key event source closed.
    InputClosed,
    /// Local shutdown was requested.
    Shutdown,
    /// EOF or I/O error on the connection.
    TransportBroken,
}

/// An established session holding one controller slot.
pub struct ClientSession<S = TcpStream> {
    transport: FramedTransport<S>,
    session: Session,
    linger: Duration,
    selection: Option<Option<Car>>,
}

impl ClientSession<TcpStream> {
    /// Connects to the server and completes the handshake.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connect`] if the TCP connection fails;
    /// [`ClientError::Handshake`] if the server is full, sends anything but
    /// START, or drops the connection first.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(&config.server_addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: config.server_addr.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }
        let session = Self::handshake(stream, config.linger).await?;
        info!("connected to {}", config.server_addr);
        Ok(session)
    }
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Runs the handshake over an already connected stream.
    ///
    /// # Errors
    ///
    /// See [`ClientSession::connect`].
    pub async fn handshake(stream: S, linger: Duration) -> Result<Self, ClientError> {
        let mut transport = FramedTransport::new(stream);
        let mut session = Session::new(Role::Client);

        let greeting = match transport.recv_message().await {
            Ok(msg) => msg,
            Err(e) => {
                session.on_transport_failure();
                return Err(HandshakeError::Transport(e).into());
            }
        };

        if let Err(e) = session.on_greeting(&greeting) {
            if let Err(send_err) = transport.send_message(&Message::End).await {
                debug!("could not send END after rejected handshake: {send_err}");
            }
            transport.close().await;
            return Err(e.into());
        }

        Ok(Self {
            transport,
            session,
            linger,
            selection: None,
        })
    }

    /// Forwards key events until the session ends, then closes it.
    pub async fn run(
        mut self,
        keys: &mut mpsc::UnboundedReceiver<KeyEvent>,
        events: &mpsc::UnboundedSender<SessionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> EndReason {
        let reason = self.serve(keys, events, &mut shutdown).await;
        self.finish(reason).await;
        info!("session ended: {reason:?}");
        reason
    }

    async fn serve(
        &mut self,
        keys: &mut mpsc::UnboundedReceiver<KeyEvent>,
        events: &mpsc::UnboundedSender<SessionEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> EndReason {
        loop {
            if *shutdown.borrow() {
                return EndReason::Shutdown;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return EndReason::Shutdown;
                    }
                }
                key = keys.recv() => match key {
                    Some(KeyEvent { code, pressed }) => {
                        let msg = Message::KeyPress { code, pressed };
                        if let Err(e) = self.transport.send_message(&msg).await {
                            warn!("failed to send key: {e}");
                            return EndReason::TransportBroken;
                        }
                    }
                    None => return EndReason::InputClosed,
                },
                received = self.transport.recv_message() => match received {
                    Ok(Message::End) => {
                        self.session.begin_close();
                        return EndReason::PeerEnded;
                    }
                    Ok(msg) if self.session.accepts(&msg) => {
                        if let Message::TrueSel(selection) = msg {
                            self.report_selection(selection, events);
                        }
                    }
                    Ok(msg) => debug!("ignoring {:?} from server", msg.message_type()),
                    Err(e) if !e.is_fatal() => warn!("ignoring bad frame: {e}"),
                    Err(TransportError::ConnectionBroken) => {
                        info!("server closed the connection");
                        return EndReason::TransportBroken;
                    }
                    Err(e) => {
                        warn!("connection error: {e}");
                        return EndReason::TransportBroken;
                    }
                },
            }
        }
    }

    fn report_selection(&mut self, selection: Option<Car>, events: &mpsc::UnboundedSender<SessionEvent>) {
        if self.selection == Some(selection) {
            return;
        }
        self.selection = Some(selection);
        let _ = events.send(SessionEvent::Selection(selection));
    }

    async fn finish(mut self, reason: EndReason) {
        if reason != EndReason::TransportBroken {
            self.session.begin_close();
            let sent = self.transport.send_message(&Message::End).await.is_ok();

            // We ended the session: give the server a moment to answer.
            if sent && reason != EndReason::PeerEnded {
                let transport = &mut self.transport;
                let _ = time::timeout(self.linger, async {
                    while let Ok(msg) = transport.recv_message().await {
                        if msg == Message::End {
                            break;
                        }
                    }
                })
                .await;
            }
        }
        self.transport.close().await;
        self.session.close();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
