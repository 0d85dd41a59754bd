//! TCP acceptor.
//!
//! For every incoming connection the acceptor asks the [`ControllerPool`] for
//! a slot:
//!
//! - no slot free: send FULL and close.  The client is expected to answer END
//!   and disconnect; the server does not wait for it.
//! - slot granted: send START and hand the connection to a
//!   [`Connection`] task.
//!
//! Handler tasks are tracked in a [`JoinSet`].  On shutdown the acceptor stops
//! listening first, then waits for every handler to finish, so when
//! [`Acceptor::run`] returns every slot is back in the pool.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rokenbok_core::protocol::session::{Role, Session};
use rokenbok_core::{FramedTransport, Message};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::application::controller_pool::ControllerPool;
use crate::application::handle_connection::{Connection, ExitReason, SessionConfig};
use crate::application::hub_commands::HubCommands;

/// Error type for the listener.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pause after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listening socket plus everything a new connection needs.
pub struct Acceptor {
    listener: TcpListener,
    pool: Arc<ControllerPool>,
    hub: Arc<dyn HubCommands>,
    session: SessionConfig,
}

impl Acceptor {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        pool: Arc<ControllerPool>,
        hub: Arc<dyn HubCommands>,
        session: SessionConfig,
    ) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        Ok(Self {
            listener,
            pool,
            hub,
            session,
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until `shutdown` becomes `true`, then waits for every
    /// connection handler to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Self {
            listener,
            pool,
            hub,
            session,
        } = self;
        if let Ok(addr) = listener.local_addr() {
            info!("accepting clients on {addr}");
        }
        let mut handlers: JoinSet<ExitReason> = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Some(connection) = admit(stream, peer, &pool, &hub, session).await {
                            handlers.spawn(connection.run(shutdown.clone()));
                        }
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    log_join(joined);
                }
            }
        }

        drop(listener);
        info!(
            "stopped accepting; waiting for {} connection(s) to close",
            handlers.len()
        );
        while let Some(joined) = handlers.join_next().await {
            log_join(joined);
        }
        debug!("all connection handlers finished");
    }
}

/// Runs the handshake for one new client.  Returns the connection to spawn
/// when a slot was granted.
async fn admit(
    stream: TcpStream,
    peer: SocketAddr,
    pool: &Arc<ControllerPool>,
    hub: &Arc<dyn HubCommands>,
    config: SessionConfig,
) -> Option<Connection<TcpStream>> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("{peer}: could not set TCP_NODELAY: {e}");
    }
    let mut transport = FramedTransport::new(stream);
    let mut session = Session::new(Role::Server);

    let slot = match pool.acquire() {
        Ok(slot) => slot,
        Err(e) => {
            info!("rejecting {peer}: {e}");
            session.reject();
            if let Err(e) = transport.send_message(&Message::Full).await {
                debug!("{peer}: could not send FULL: {e}");
            }
            transport.close().await;
            return None;
        }
    };

    if let Err(e) = transport.send_message(&Message::Start).await {
        debug!("{peer} left before START: {e}");
        return None;
    }
    session.grant();
    info!("accepted {peer} as {}", slot.player());

    Some(Connection::new(
        transport,
        slot,
        session,
        Arc::clone(hub),
        config,
        peer.to_string(),
    ))
}

fn log_join(joined: Result<ExitReason, tokio::task::JoinError>) {
    match joined {
        Ok(reason) => debug!("connection handler finished: {reason:?}"),
        Err(e) => error!("connection handler failed: {e}"),
    }
}
