//! All Rokenbok protocol message types.
//!
//! Every message on the wire is exactly [`FRAME_LEN`] bytes:
//!
//! ```text
//! [msg_type:1][arg1:1][arg2:1]
//! ```
//!
//! There are no variable-length payloads, so a reader never needs a length
//! prefix: it reads three bytes, decodes them, and repeats.

use crate::domain::player::Car;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Number of bytes in every frame.
pub const FRAME_LEN: usize = 3;

/// One raw frame as it appears on the wire.
pub type Frame = [u8; FRAME_LEN];

// ── Message type codes ────────────────────────────────────────────────────────

/// Message type codes carried in byte 0 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Server → client: a controller slot was granted.
    Start = 0x01,
    /// Server → client: no controller slot is free; the server closes next.
    Full = 0x02,
    /// Client → server: a key was pressed or released.
    KeyPress = 0x03,
    /// Server → client: the vehicle currently selected by this slot.
    TrueSel = 0x04,
    /// Either direction: the sender is closing the session.
    End = 0x05,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::Start),
            0x02 => Ok(MessageType::Full),
            0x03 => Ok(MessageType::KeyPress),
            0x04 => Ok(MessageType::TrueSel),
            0x05 => Ok(MessageType::End),
            _ => Err(()),
        }
    }
}

/// Which side of a session is allowed to send a given message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ServerToClient,
    ClientToServer,
    Either,
}

// ── Typed messages ────────────────────────────────────────────────────────────

/// A decoded protocol message.
///
/// # Examples
///
/// ```rust
/// use rokenbok_core::protocol::messages::{Message, MessageType};
///
/// let msg = Message::KeyPress { code: 24, pressed: true };
/// assert_eq!(msg.message_type(), MessageType::KeyPress);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Start,
    Full,
    KeyPress {
        /// Client key code (printable ASCII, or 24..=27 for the arrow keys).
        code: u8,
        /// `true` for a press, `false` for a release.
        pressed: bool,
    },
    /// The slot's current selection, `None` when no vehicle is selected.
    TrueSel(Option<Car>),
    End,
}

impl Message {
    /// Returns the wire type code for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Start => MessageType::Start,
            Message::Full => MessageType::Full,
            Message::KeyPress { .. } => MessageType::KeyPress,
            Message::TrueSel(_) => MessageType::TrueSel,
            Message::End => MessageType::End,
        }
    }

    /// Returns which side of the session may legitimately send this message.
    pub fn direction(&self) -> Direction {
        match self {
            Message::Start | Message::Full | Message::TrueSel(_) => Direction::ServerToClient,
            Message::KeyPress { .. } => Direction::ClientToServer,
            Message::End => Direction::Either,
        }
    }
}
