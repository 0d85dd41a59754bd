//! Connection handshake and session state machine.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//!             START            END sent/received
//! Connecting ───────► Active ─────────────────► Closing ──► Closed
//!     │                  │                                    ▲
//!     │ FULL / other     │ transport failure                  │
//!     └──────────────────┴────────────────────────────────────┘
//! ```
//!
//! - On accept, the server sends exactly one greeting: START when a
//!   controller slot was granted, FULL (then closes) when none is free.
//! - A client that receives anything other than START while `Connecting`
//!   closes the transport.  Retrying is left to the caller.
//! - Either side may send END.  The side that sends END makes a best-effort
//!   attempt to read the peer's final END before closing, but never waits
//!   on it indefinitely.
//! - Any transport failure moves straight to `Closed`.

use thiserror::Error;

use crate::protocol::messages::{Direction, Message, MessageType};
use crate::protocol::transport::TransportError;

/// Errors that end a session before it becomes `Active`.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The server answered FULL: every controller slot is taken.
    #[error("server is full")]
    ServerFull,

    /// The server's first message was neither START nor FULL.
    #[error("unexpected greeting from server: {0:?}")]
    UnexpectedGreeting(MessageType),

    /// The transport failed before the greeting arrived.
    #[error("transport failed during handshake: {0}")]
    Transport(#[from] TransportError),
}

/// Current phase of a client/server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Which end of the session this state machine belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// The handshake/session state machine shared by client and server.
#[derive(Debug, Clone)]
pub struct Session {
    role: Role,
    state: SessionState,
}

impl Session {
    /// Creates a session in the `Connecting` state.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// `true` while the session is `Connecting` or `Active`.
    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Connecting | SessionState::Active)
    }

    /// Server side: a slot was granted and START is being sent.
    pub fn grant(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Active;
        }
    }

    /// Server side: no slot was free and FULL is being sent.
    pub fn reject(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Client side: resolves the handshake from the server's first message.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::ServerFull`] for FULL and
    /// [`HandshakeError::UnexpectedGreeting`] for anything but START.  In both
    /// cases the session moves to `Closed`.
    pub fn on_greeting(&mut self, msg: &Message) -> Result<(), HandshakeError> {
        match msg {
            Message::Start if self.state == SessionState::Connecting => {
                self.state = SessionState::Active;
                Ok(())
            }
            Message::Full => {
                self.state = SessionState::Closed;
                Err(HandshakeError::ServerFull)
            }
            other => {
                self.state = SessionState::Closed;
                Err(HandshakeError::UnexpectedGreeting(other.message_type()))
            }
        }
    }

    /// Returns `true` when `msg` is something this side should act on in the
    /// current state.  Messages travelling the wrong direction are not.
    pub fn accepts(&self, msg: &Message) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        match (self.role, msg.direction()) {
            (_, Direction::Either) => true,
            (Role::Server, Direction::ClientToServer) => true,
            (Role::Client, Direction::ServerToClient) => {
                matches!(msg, Message::TrueSel(_))
            }
            _ => false,
        }
    }

    /// This side is sending END or the peer's END was received.
    pub fn begin_close(&mut self) {
        if self.is_open() {
            self.state = SessionState::Closing;
        }
    }

    /// The transport failed; the session is over regardless of state.
    pub fn on_transport_failure(&mut self) {
        self.state = SessionState::Closed;
    }

    /// The transport has been closed.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_keeps_its_role_and_starts_connecting() {
        let client = Session::new(Role::Client);
        let server = Session::new(Role::Server);

        assert_eq!(client.role(), Role::Client);
        assert_eq!(server.role(), Role::Server);
        assert_eq!(client.state(), SessionState::Connecting);
    }

    #[test]
    fn test_client_start_greeting_activates_session() {
        let mut session = Session::new(Role::Client);

        session.on_greeting(&Message::Start).unwrap();

        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_client_full_greeting_closes_session() {
        let mut session = Session::new(Role::Client);

        let result = session.on_greeting(&Message::Full);

        assert!(matches!(result, Err(HandshakeError::ServerFull)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_client_unexpected_greeting_closes_session() {
        let mut session = Session::new(Role::Client);

        let result = session.on_greeting(&Message::TrueSel(None));

        assert!(matches!(
            result,
            Err(HandshakeError::UnexpectedGreeting(MessageType::TrueSel))
        ));
        assert!(!session.is_open());
    }

    #[test]
    fn test_server_accepts_key_press_only_when_active() {
        let mut session = Session::new(Role::Server);
        let key = Message::KeyPress { code: 24, pressed: true };
        assert!(!session.accepts(&key));

        session.grant();

        assert!(session.accepts(&key));
        assert!(session.accepts(&Message::End));
        assert!(!session.accepts(&Message::Start));
    }

    #[test]
    fn test_client_accepts_true_sel_but_not_repeated_start() {
        let mut session = Session::new(Role::Client);
        session.on_greeting(&Message::Start).unwrap();

        assert!(session.accepts(&Message::TrueSel(None)));
        assert!(!session.accepts(&Message::Start));
        assert!(!session.accepts(&Message::KeyPress { code: 1, pressed: true }));
    }

    #[test]
    fn test_transport_failure_closes_from_any_state() {
        let setups: [fn(&mut Session); 3] = [
            |_| {},
            |s| s.grant(),
            |s| {
                s.grant();
                s.begin_close();
            },
        ];
        for setup in setups {
            let mut session = Session::new(Role::Server);
            setup(&mut session);
            session.on_transport_failure();
            assert_eq!(session.state(), SessionState::Closed);
        }
    }

    #[test]
    fn test_begin_close_after_closed_stays_closed() {
        let mut session = Session::new(Role::Server);
        session.reject();

        session.begin_close();

        assert_eq!(session.state(), SessionState::Closed);
    }
}
