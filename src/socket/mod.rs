//! The frame-adapter seam between the hub and a WebSocket
//! implementation.
//!
//! The hub never touches a concrete transport. A [`Socket`] is split
//! into a [`SocketReader`] and a [`SocketWriter`] once per session;
//! the halves are then driven by the session's reader loop and writer
//! task. The crate ships [`AxumSocket`] for upgraded axum
//! connections; tests use an in-memory scripted socket.

mod axum;
#[cfg(test)]
pub(crate) mod mock;

pub use self::axum::{AxumReader, AxumSocket, AxumWriter};

use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::{close_code, FrameKind, Incoming};

/// Transport failures reported by socket adapters.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// The peer sent a close frame.
    #[error("peer closed the connection (code {code}, reason {reason:?})")]
    CloseFrame { code: u16, reason: String },

    /// The connection ended without a close handshake.
    #[error("connection reset without close handshake")]
    ConnectionReset,

    /// A write was attempted after a close frame had already been sent.
    #[error("close frame already sent")]
    CloseSent,

    /// An inbound frame exceeded the configured read limit.
    #[error("frame of {size} bytes exceeds the read limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SocketError {
    pub(crate) fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }

    /// Whether this is an ordinary peer departure rather than a fault.
    ///
    /// Only a close frame carrying a going-away, no-status or abnormal
    /// code qualifies; a connection that ends without any close
    /// handshake is reported like every other read failure.
    #[must_use]
    pub fn is_benign_departure(&self) -> bool {
        match self {
            Self::CloseFrame { code, .. } => close_code::is_benign_departure(*code),
            _ => false,
        }
    }
}

/// Read half of a frame endpoint.
#[async_trait]
pub trait SocketReader: Send {
    /// Deliver the next inbound frame.
    ///
    /// Close frames and transport failures surface as errors; see
    /// [`SocketError::is_benign_departure`] for the departure
    /// classification.
    async fn read_frame(&mut self) -> Result<Incoming, SocketError>;
}

/// Write half of a frame endpoint.
#[async_trait]
pub trait SocketWriter: Send {
    /// Put one frame on the wire.
    ///
    /// After a [`FrameKind::Close`] has been written, every further
    /// write must fail with [`SocketError::CloseSent`].
    async fn write_frame(&mut self, kind: FrameKind, payload: Bytes) -> Result<(), SocketError>;

    /// Finish the protocol close handshake and release the transport.
    /// Idempotent.
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// A duplex frame endpoint over an upgraded connection.
pub trait Socket: Send + 'static {
    type Reader: SocketReader + 'static;
    type Writer: SocketWriter + 'static;

    /// Cap the size of inbound payloads; larger frames fail the read
    /// with [`SocketError::FrameTooLarge`].
    fn set_read_limit(&mut self, bytes: usize);

    /// Split into independently-driven halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}
