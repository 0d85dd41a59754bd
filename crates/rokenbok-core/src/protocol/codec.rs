//! Codec for converting between typed [`Message`]s and 3-byte frames.
//!
//! Wire format:
//! ```text
//! START     [0x01][0]        [0]
//! FULL      [0x02][0]        [0]
//! KEY_PRESS [0x03][key code] [1 = press, 0 = release]
//! TRUE_SEL  [0x04][car 1-8, 0 = none][0]
//! END       [0x05][0]        [0]
//! ```
//! Unused argument bytes are written as zero and ignored on decode.

use thiserror::Error;

use crate::domain::player::Car;
use crate::protocol::messages::{Frame, Message, MessageType};

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The type byte is not one of the five defined message types.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// An argument byte is out of range for the message type.
    #[error("malformed {message_type:?} frame: {reason}")]
    MalformedPayload {
        message_type: MessageType,
        reason: String,
    },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into its 3-byte frame.
///
/// Encoding cannot fail: every typed message has exactly one wire form.
///
/// # Examples
///
/// ```rust
/// use rokenbok_core::protocol::{encode_message, decode_message, Message};
///
/// let frame = encode_message(&Message::KeyPress { code: 24, pressed: true });
/// assert_eq!(frame, [3, 24, 1]);
/// assert_eq!(decode_message(&frame).unwrap(), Message::KeyPress { code: 24, pressed: true });
/// ```
pub fn encode_message(msg: &Message) -> Frame {
    let ty = msg.message_type() as u8;
    match msg {
        Message::Start | Message::Full | Message::End => [ty, 0, 0],
        Message::KeyPress { code, pressed } => [ty, *code, u8::from(*pressed)],
        Message::TrueSel(selection) => [ty, selection.map_or(0, Car::number), 0],
    }
}

/// Decodes one frame into a typed [`Message`].
///
/// A non-zero press byte in KEY_PRESS is treated as a press.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownMessageType`] for an undefined type byte and
/// [`ProtocolError::MalformedPayload`] when a TRUE_SEL selection is above 8.
pub fn decode_message(frame: &Frame) -> Result<Message, ProtocolError> {
    let [ty, arg1, arg2] = *frame;
    let message_type = MessageType::try_from(ty).map_err(|_| ProtocolError::UnknownMessageType(ty))?;

    match message_type {
        MessageType::Start => Ok(Message::Start),
        MessageType::Full => Ok(Message::Full),
        MessageType::End => Ok(Message::End),
        MessageType::KeyPress => Ok(Message::KeyPress {
            code: arg1,
            pressed: arg2 != 0,
        }),
        MessageType::TrueSel => match arg1 {
            0 => Ok(Message::TrueSel(None)),
            n => Car::new(n)
                .map(|car| Message::TrueSel(Some(car)))
                .ok_or_else(|| ProtocolError::MalformedPayload {
                    message_type,
                    reason: format!("selection {n} is outside 0..=8"),
                }),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_start_full_end_have_zero_arguments() {
        assert_eq!(encode_message(&Message::Start), [1, 0, 0]);
        assert_eq!(encode_message(&Message::Full), [2, 0, 0]);
        assert_eq!(encode_message(&Message::End), [5, 0, 0]);
    }

    #[test]
    fn test_encode_key_release_writes_zero_press_byte() {
        let frame = encode_message(&Message::KeyPress {
            code: b'q',
            pressed: false,
        });
        assert_eq!(frame, [3, b'q', 0]);
    }

    #[test]
    fn test_encode_true_sel_none_writes_zero() {
        assert_eq!(encode_message(&Message::TrueSel(None)), [4, 0, 0]);
    }

    #[test]
    fn test_encode_true_sel_writes_car_number() {
        let car = Car::new(6).unwrap();
        assert_eq!(encode_message(&Message::TrueSel(Some(car))), [4, 6, 0]);
    }

    #[test]
    fn test_decode_unknown_type_returns_error() {
        let result = decode_message(&[0x09, 0, 0]);
        assert_eq!(result, Err(ProtocolError::UnknownMessageType(0x09)));
    }

    #[test]
    fn test_decode_true_sel_above_eight_is_malformed() {
        let result = decode_message(&[4, 9, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedPayload {
                message_type: MessageType::TrueSel,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_key_press_treats_nonzero_as_pressed() {
        let msg = decode_message(&[3, 24, 7]).unwrap();
        assert_eq!(msg, Message::KeyPress { code: 24, pressed: true });
    }

    #[test]
    fn test_decode_ignores_unused_argument_bytes() {
        assert_eq!(decode_message(&[5, 0xAB, 0xCD]).unwrap(), Message::End);
    }
}
