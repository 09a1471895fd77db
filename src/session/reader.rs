//! The per-session reader loop.
//!
//! Dispatches inbound frames to the handler table and enforces the
//! pong deadline: the deadline is set once at startup and pushed
//! forward only when a pong arrives, so an unresponsive peer is torn
//! down within one pong period.

use std::sync::Arc;

use tokio::time::{timeout_at, Instant};

use super::Session;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::protocol::Incoming;
use crate::socket::{SocketError, SocketReader};

pub(crate) async fn run_reader<R: SocketReader>(
    session: Arc<Session>,
    mut reader: R,
    config: Arc<HubConfig>,
) {
    let mut deadline = Instant::now() + config.pong_period;
    loop {
        let frame = match timeout_at(deadline, reader.read_frame()).await {
            Err(_) => {
                session.report_error(&HubError::ReadDeadline(config.pong_period));
                return;
            }
            Ok(Err(err)) => {
                if let SocketError::CloseFrame { code, reason } = &err {
                    session.handlers.close(*code, reason);
                }
                if !err.is_benign_departure() {
                    session.report_error(&err.into());
                }
                return;
            }
            Ok(Ok(frame)) => frame,
        };
        match frame {
            Incoming::Text(payload) => session.handlers.received_text(&session, &payload),
            Incoming::Binary(payload) => session.handlers.received_binary(&session, &payload),
            Incoming::Ping(payload) => session.handlers.ping(&session, &payload),
            Incoming::Pong(payload) => {
                deadline = Instant::now() + config.pong_period;
                session.handlers.pong(&session, &payload);
            }
        }
    }
}
