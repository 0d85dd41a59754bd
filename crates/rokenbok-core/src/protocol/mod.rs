//! Protocol module containing message types, the frame codec, the
//! fixed-length transport, and the connection handshake state machine.

pub mod codec;
pub mod messages;
pub mod session;
pub mod transport;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use messages::*;
pub use session::{HandshakeError, Session, SessionState};
pub use transport::{FramedTransport, TransportError};
