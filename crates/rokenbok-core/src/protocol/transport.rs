//! Fixed-length frame transport over any tokio byte stream.
//!
//! TCP is a *stream* protocol: a single `read()` may return fewer bytes than
//! one frame, and a single `write()` may accept only part of a buffer.
//! [`FramedTransport`] hides both: [`send`](FramedTransport::send) loops until
//! the whole frame is written and [`recv`](FramedTransport::recv) loops until a
//! whole frame has arrived.
//!
//! The moment the underlying stream reports zero bytes transferred (EOF or a
//! half-closed peer) both calls fail with [`TransportError::ConnectionBroken`].
//! A partial frame is never handed to the caller.
//!
//! # Cancel safety
//!
//! `recv` keeps the bytes of a partially received frame inside the transport,
//! so it is safe to use as a branch of `tokio::select!`: if another branch
//! wins, the next call to `recv` resumes where the previous one stopped.
//! `send` is not cancel-safe and should always be awaited to completion.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::protocol::codec::{decode_message, encode_message, ProtocolError};
use crate::protocol::messages::{Message, FRAME_LEN};

/// Errors produced by [`FramedTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the stream (zero bytes read or written).
    #[error("connection broken")]
    ConnectionBroken,

    /// The underlying stream reported an I/O error.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A complete frame arrived but could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Returns `true` when the stream itself is unusable.
    ///
    /// A [`TransportError::Protocol`] error leaves the stream aligned on a
    /// frame boundary, so the session may continue after it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Protocol(_))
    }
}

/// A stream that carries only frames of exactly `N` bytes.
///
/// The same type is used on both ends of a session; it knows nothing about
/// message semantics beyond the optional [`send_message`](Self::send_message)
/// / [`recv_message`](Self::recv_message) helpers for the 3-byte protocol.
pub struct FramedTransport<S, const N: usize = FRAME_LEN> {
    stream: S,
    pending: [u8; N],
    filled: usize,
}

impl<S, const N: usize> FramedTransport<S, N>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: [0u8; N],
            filled: 0,
        }
    }

    /// Writes exactly one frame, looping on partial writes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionBroken`] if the stream accepts zero
    /// bytes, or [`TransportError::Io`] on any other write failure.
    pub async fn send(&mut self, frame: &[u8; N]) -> Result<(), TransportError> {
        let mut sent = 0;
        while sent < N {
            let n = self.stream.write(&frame[sent..]).await?;
            if n == 0 {
                return Err(TransportError::ConnectionBroken);
            }
            sent += n;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads exactly one frame, looping on partial reads.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionBroken`] if the stream reaches EOF
    /// (any partially received bytes are discarded), or
    /// [`TransportError::Io`] on any other read failure.
    pub async fn recv(&mut self) -> Result<[u8; N], TransportError> {
        while self.filled < N {
            let n = self.stream.read(&mut self.pending[self.filled..]).await?;
            if n == 0 {
                if self.filled > 0 {
                    debug!("discarding {} bytes of a partial frame at EOF", self.filled);
                }
                self.filled = 0;
                return Err(TransportError::ConnectionBroken);
            }
            self.filled += n;
        }
        self.filled = 0;
        Ok(self.pending)
    }

    /// Shuts down the write side of the stream.  Errors are ignored: the
    /// stream is being abandoned either way.
    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

impl<S> FramedTransport<S, FRAME_LEN>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Encodes and sends one protocol message.
    pub async fn send_message(&mut self, msg: &Message) -> Result<(), TransportError> {
        self.send(&encode_message(msg)).await
    }

    /// Receives and decodes one protocol message.
    ///
    /// Cancel-safe in the same way as [`recv`](Self::recv).
    pub async fn recv_message(&mut self) -> Result<Message, TransportError> {
        let frame = self.recv().await?;
        Ok(decode_message(&frame)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;
    use tokio_test::io::Builder;

    use super::*;

    /// A stream whose writes always accept zero bytes.
    struct StalledWriter;

    impl AsyncRead for StalledWriter {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for StalledWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(0))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_recv_assembles_frame_from_partial_reads() {
        // Arrange – the frame arrives one byte, then two bytes.
        let stream = Builder::new().read(&[3]).read(&[24, 1]).build();
        let mut transport: FramedTransport<_> = FramedTransport::new(stream);

        // Act
        let frame = transport.recv().await.unwrap();

        // Assert
        assert_eq!(frame, [3, 24, 1]);
    }

    #[tokio::test]
    async fn test_recv_returns_back_to_back_frames_in_order() {
        let stream = Builder::new().read(&[4, 2, 0, 5, 0]).read(&[0]).build();
        let mut transport: FramedTransport<_> = FramedTransport::new(stream);

        assert_eq!(transport.recv().await.unwrap(), [4, 2, 0]);
        assert_eq!(transport.recv().await.unwrap(), [5, 0, 0]);
    }

    #[tokio::test]
    async fn test_recv_on_eof_mid_frame_is_connection_broken() {
        let stream = Builder::new().read(&[3, 24]).build();
        let mut transport: FramedTransport<_> = FramedTransport::new(stream);

        let result = transport.recv().await;

        assert!(matches!(result, Err(TransportError::ConnectionBroken)));
    }

    #[tokio::test]
    async fn test_send_writes_whole_frame() {
        let stream = Builder::new().write(&[1, 0, 0]).build();
        let mut transport: FramedTransport<_> = FramedTransport::new(stream);

        transport.send(&[1, 0, 0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_on_zero_byte_write_is_connection_broken() {
        let mut transport: FramedTransport<_> = FramedTransport::new(StalledWriter);

        let result = transport.send(&[5, 0, 0]).await;

        assert!(matches!(result, Err(TransportError::ConnectionBroken)));
    }

    #[tokio::test]
    async fn test_recv_message_surfaces_protocol_error_as_non_fatal() {
        let stream = Builder::new().read(&[0x7F, 0, 0]).build();
        let mut transport: FramedTransport<_> = FramedTransport::new(stream);

        let err = transport.recv_message().await.unwrap_err();

        assert!(matches!(err, TransportError::Protocol(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_custom_frame_length_is_respected() {
        let stream = Builder::new().read(&[1, 2, 3, 4, 5]).build();
        let mut transport: FramedTransport<_, 5> = FramedTransport::new(stream);

        assert_eq!(transport.recv().await.unwrap(), [1, 2, 3, 4, 5]);
    }
}
