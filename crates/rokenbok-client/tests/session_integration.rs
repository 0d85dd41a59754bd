//! Integration tests for the client session over real loopback TCP.
//!
//! A scripted server built from the shared framed transport plays the other
//! side, so these tests check the client's wire behaviour without depending
//! on the server crate:
//!
//! - START leads to a running session that forwards keys and reports
//!   TRUE_SEL changes.
//! - FULL is reported as "server full" after the client answers END.
//! - An unreachable server is a connect error.

use std::time::Duration;

use rokenbok_client::application::key_events::KeyListener;
use rokenbok_client::infrastructure::network::{
    ClientConfig, ClientError, ClientSession, EndReason, SessionEvent,
};
use rokenbok_core::{Car, FramedTransport, Message};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

async fn scripted_server() -> (TcpListener, ClientConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let config = ClientConfig {
        server_addr: listener.local_addr().unwrap().to_string(),
        linger: Duration::from_millis(200),
    };
    (listener, config)
}

async fn accept(listener: &TcpListener) -> FramedTransport<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept");
    FramedTransport::new(stream)
}

/// Full session: START, a held key sent once, a selection report, END.
#[tokio::test]
async fn test_session_round_trip_with_scripted_server() {
    // Arrange
    let (listener, config) = scripted_server().await;
    let server = tokio::spawn(async move {
        let mut peer = accept(&listener).await;
        peer.send_message(&Message::Start).await.unwrap();
        let mut received = Vec::new();
        for _ in 0..2 {
            received.push(peer.recv_message().await.unwrap());
        }
        peer.send_message(&Message::TrueSel(Car::new(7))).await.unwrap();
        peer.send_message(&Message::End).await.unwrap();
        let reply = peer.recv_message().await.unwrap();
        (received, reply)
    });
    let session = ClientSession::connect(&config).await.expect("session");
    let (key_tx, mut key_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut keys = KeyListener::new(key_tx);

    // Act
    keys.on_press(24);
    keys.on_press(24);
    keys.on_release(24);
    let reason = session.run(&mut key_rx, &event_tx, shutdown_rx).await;

    // Assert
    let (received, reply) = server.await.unwrap();
    assert_eq!(reason, EndReason::PeerEnded);
    assert_eq!(
        received,
        vec![
            Message::KeyPress { code: 24, pressed: true },
            Message::KeyPress { code: 24, pressed: false },
        ]
    );
    assert_eq!(reply, Message::End);
    assert_eq!(event_rx.recv().await, Some(SessionEvent::Selection(Car::new(7))));
}

/// A FULL server gets END back and the client reports it as full.
#[tokio::test]
async fn test_full_server_is_reported() {
    let (listener, config) = scripted_server().await;
    let server = tokio::spawn(async move {
        let mut peer = accept(&listener).await;
        peer.send_message(&Message::Full).await.unwrap();
        peer.recv_message().await.unwrap()
    });

    let err = ClientSession::connect(&config).await.err().expect("handshake must fail");

    assert!(err.is_server_full());
    assert_eq!(server.await.unwrap(), Message::End);
}

/// Nothing listening: a connect error naming the address.
#[tokio::test]
async fn test_unreachable_server_is_connect_error() {
    let (listener, config) = scripted_server().await;
    drop(listener);

    let err = ClientSession::connect(&config).await.err().expect("connect must fail");

    assert!(matches!(err, ClientError::Connect { ref addr, .. } if *addr == config.server_addr));
}
