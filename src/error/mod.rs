//! Hub error types.
//!
//! Everything recoverable flows through the installed error handler as
//! a [`HubError`]; nothing in the steady state panics.

use std::time::Duration;

use crate::socket::SocketError;

/// Errors surfaced to the installed error handler.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The session's outbound mailbox was full; the packet was dropped.
    #[error("mailbox full (capacity {capacity})")]
    MailboxFull { capacity: usize },

    /// No frame arrived within the pong grace period.
    #[error("read deadline exceeded after {0:?}")]
    ReadDeadline(Duration),

    /// A frame write did not complete within the write period.
    #[error("write deadline exceeded after {0:?}")]
    WriteDeadline(Duration),

    /// Transport-level failure reported by the socket adapter.
    #[error(transparent)]
    Socket(#[from] SocketError),
}

impl HubError {
    /// True when a write raced with an already-sent close frame.
    #[must_use]
    pub fn is_close_sent(&self) -> bool {
        matches!(self, Self::Socket(SocketError::CloseSent))
    }

    /// True when a packet was dropped due to mailbox backpressure.
    #[must_use]
    pub fn is_mailbox_full(&self) -> bool {
        matches!(self, Self::MailboxFull { .. })
    }
}
