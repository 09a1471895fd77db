//! Outbound packets and inbound frame events.

use bytes::Bytes;

/// Frame kinds the hub can place on the wire.
///
/// Discriminants are the RFC 6455 opcodes, which is also the numeric
/// kind reported by the per-send log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// UTF-8 text frame.
    Text = 1,
    /// Binary frame.
    Binary = 2,
    /// Connection close.
    Close = 8,
    /// Keep-alive ping.
    Ping = 9,
}

impl FrameKind {
    /// The RFC 6455 opcode.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A frame queued for delivery to one session. Immutable once built.
#[derive(Debug, Clone)]
pub struct Packet {
    kind: FrameKind,
    payload: Bytes,
}

impl Packet {
    /// Packet with an explicit kind and payload.
    #[must_use]
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Text packet.
    #[must_use]
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Text, payload)
    }

    /// Binary packet.
    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Binary, payload)
    }

    /// Empty keep-alive ping.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(FrameKind::Ping, Bytes::new())
    }

    /// Empty close frame.
    #[must_use]
    pub fn close() -> Self {
        Self::new(FrameKind::Close, Bytes::new())
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub(crate) fn into_parts(self) -> (FrameKind, Bytes) {
        (self.kind, self.payload)
    }
}

/// A non-close frame delivered by a socket reader. Close frames are
/// reported as errors so the reader loop can classify the departure.
#[derive(Debug)]
pub enum Incoming {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
}
