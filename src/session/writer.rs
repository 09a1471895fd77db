//! The per-session writer task.
//!
//! Drains the mailbox onto the socket and emits keep-alive pings,
//! both under the configured write deadline. The task exits when the
//! mailbox is closed and drained, or on the first write failure; in
//! either case it accounts for every packet that will no longer reach
//! the wire, so the drain barrier always returns to zero.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, timeout, Instant};

use super::Session;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::protocol::{FrameKind, Packet};
use crate::socket::SocketWriter;

pub(crate) async fn run_writer<W: SocketWriter>(
    session: Arc<Session>,
    mut writer: W,
    mut mailbox: mpsc::Receiver<Packet>,
    config: Arc<HubConfig>,
) {
    let mut ticker = time::interval_at(
        Instant::now() + config.ping_period,
        config.ping_period,
    );
    // Ticks missed while a write stalls the loop coalesce into one
    // late ping instead of bursting.
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let clean = loop {
        tokio::select! {
            received = mailbox.recv() => match received {
                Some(packet) => {
                    session.log(&format!(
                        "SENDING_MESSAGE >> Message: {} Type: {}",
                        String::from_utf8_lossy(packet.payload()),
                        packet.kind().as_u8(),
                    ));
                    session.barrier.done();
                    if let Err(err) = write_packet(&session, &mut writer, &config, packet).await {
                        session.report_error(&err);
                        break false;
                    }
                }
                // Mailbox closed and drained.
                None => break true,
            },
            _ = ticker.tick() => {
                if let Err(err) = write_packet(&session, &mut writer, &config, Packet::ping()).await {
                    // A ping racing an already-sent close frame is
                    // expected during shutdown.
                    if err.is_close_sent() {
                        continue;
                    }
                    session.report_error(&err);
                    break false;
                }
            }
        }
    };

    drain(&session, &mut mailbox);

    match writer.close().await {
        Ok(()) => {}
        Err(err) if clean => session.report_error(&err.into()),
        Err(err) => {
            // The transport already failed; a close error adds nothing.
            tracing::debug!(
                session_id = %session.id(),
                error = %err,
                "socket close after write failure"
            );
        }
    }
}

async fn write_packet<W: SocketWriter>(
    session: &Arc<Session>,
    writer: &mut W,
    config: &HubConfig,
    packet: Packet,
) -> Result<(), HubError> {
    let (kind, payload) = packet.into_parts();
    match timeout(config.write_period, writer.write_frame(kind, payload.clone())).await {
        Err(_) => return Err(HubError::WriteDeadline(config.write_period)),
        Ok(Err(err)) => return Err(err.into()),
        Ok(Ok(())) => {}
    }
    match kind {
        FrameKind::Text => session.handlers.sent_text(session, &payload),
        FrameKind::Binary => session.handlers.sent_binary(session, &payload),
        FrameKind::Ping => session.handlers.sent_ping(session, &payload),
        FrameKind::Close => {}
    }
    Ok(())
}

/// Account for packets that will never reach the wire.
fn drain(session: &Session, mailbox: &mut mpsc::Receiver<Packet>) {
    mailbox.close();
    while mailbox.try_recv().is_ok() {
        session.barrier.done();
    }
}
