//! Hub tunables.
//!
//! All timing and sizing knobs live here. Construct a [`HubConfig`]
//! with struct-update syntax over [`Default`] and hand it to
//! [`Hub::with_config`](crate::Hub::with_config).

use std::time::Duration;

/// Smallest accepted per-session mailbox capacity.
pub const MIN_MESSAGE_QUEUE_SIZE: usize = 5;

/// Immutable hub tunables.
///
/// `ping_period` should be kept below `pong_period`, otherwise the read
/// deadline expires before the first keep-alive ping can solicit a pong
/// and healthy sessions are torn down.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Longest a single frame write may take before the session is
    /// torn down.
    pub write_period: Duration,
    /// Interval between keep-alive pings.
    pub ping_period: Duration,
    /// Read-deadline grace granted initially and refreshed by each
    /// pong.
    pub pong_period: Duration,
    /// Read-side payload limit in bytes.
    pub max_message_size: usize,
    /// Per-session mailbox capacity.
    pub message_queue_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            write_period: Duration::from_secs(10),
            ping_period: Duration::from_secs(30),
            pong_period: Duration::from_secs(90),
            max_message_size: 512,
            message_queue_size: 100,
        }
    }
}

impl HubConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.message_queue_size < MIN_MESSAGE_QUEUE_SIZE {
            return Err(ConfigError::MessageQueueTooSmall {
                requested: self.message_queue_size,
                minimum: MIN_MESSAGE_QUEUE_SIZE,
            });
        }
        Ok(())
    }
}

/// Configuration rejected at hub construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("message queue size {requested} is below the minimum of {minimum}")]
    MessageQueueTooSmall { requested: usize, minimum: usize },
}
