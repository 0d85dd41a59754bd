//! # rokenbok-core
//!
//! Shared library for the Rokenbok hub server and its remote clients.
//!
//! This crate is used by both the server and client applications.  It has no
//! dependencies on serial ports or concrete sockets: the framed transport is
//! generic over any tokio byte stream.
//!
//! # Architecture overview (for beginners)
//!
//! A single Rokenbok hub drives up to eight radio-controlled vehicles, one per
//! physical controller channel.  The server replaces the physical controllers
//! with a microcontroller attached over a serial link, and lets up to eight
//! remote clients each "borrow" one controller channel over TCP.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel between client and server.  Every
//!   message is a fixed 3-byte frame `[type, arg1, arg2]`; the module contains
//!   the codec, the fixed-length transport, and the handshake state machine.
//!
//! - **`domain`** – The shared control state of the hub: one bitmask per
//!   button (bit `p` = player `p + 1`), plus the desired and observed vehicle
//!   selection of every player.
//!
//! - **`keymap`** – The table that turns a client key code into a button
//!   press, a vehicle selection, or a hub restart request.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::hub_state::{Button, HubSnapshot, HubState, SelectionError, Selections};
pub use domain::player::{Car, Player, PLAYER_COUNT};
pub use keymap::KeyAction;
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{Frame, Message, MessageType, FRAME_LEN};
pub use protocol::session::{HandshakeError, SessionState};
pub use protocol::transport::{FramedTransport, TransportError};
