//! Integration tests for the rokenbok-core frame protocol.
//!
//! These tests push every message through the public codec and through a
//! real in-memory duplex stream wrapped in a [`FramedTransport`] on both ends,
//! the same way client and server use it.

use rokenbok_core::{
    decode_message, encode_message, Car, FramedTransport, Message, TransportError, FRAME_LEN,
};

fn every_message() -> Vec<Message> {
    let mut messages = vec![Message::Start, Message::Full, Message::End, Message::TrueSel(None)];
    messages.extend((1..=8).filter_map(Car::new).map(|car| Message::TrueSel(Some(car))));
    for code in [0u8, 24, 25, 26, 27, b'1', b'8', b'q', b'r', 0xFF] {
        messages.push(Message::KeyPress { code, pressed: true });
        messages.push(Message::KeyPress { code, pressed: false });
    }
    messages
}

#[test]
fn test_codec_roundtrip_for_every_message() {
    for msg in every_message() {
        let frame = encode_message(&msg);
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(decode_message(&frame), Ok(msg), "roundtrip of {msg:?}");
    }
}

#[tokio::test]
async fn test_transport_roundtrip_over_duplex_stream() {
    // Arrange – a 1-byte buffer forces every frame through partial writes
    // and partial reads.
    let (a, b) = tokio::io::duplex(1);
    let mut sender: FramedTransport<_> = FramedTransport::new(a);
    let mut receiver: FramedTransport<_> = FramedTransport::new(b);
    let messages = every_message();
    let expected = messages.clone();

    // Act
    let writer = tokio::spawn(async move {
        for msg in &messages {
            sender.send_message(msg).await.expect("send");
        }
    });
    let mut received = Vec::new();
    for _ in 0..expected.len() {
        received.push(receiver.recv_message().await.expect("recv"));
    }
    writer.await.unwrap();

    // Assert
    assert_eq!(received, expected);
}

#[tokio::test]
async fn test_transport_reports_connection_broken_when_peer_drops() {
    let (a, b) = tokio::io::duplex(64);
    let mut receiver: FramedTransport<_> = FramedTransport::new(b);
    drop(a);

    let result = receiver.recv_message().await;

    assert!(matches!(result, Err(TransportError::ConnectionBroken)));
}

#[tokio::test]
async fn test_transport_send_after_peer_drops_fails() {
    let (a, b) = tokio::io::duplex(64);
    let mut sender: FramedTransport<_> = FramedTransport::new(a);
    drop(b);

    let result = sender.send_message(&Message::End).await;

    assert!(result.is_err());
}
