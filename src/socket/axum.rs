//! Frame adapter over an upgraded axum WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use super::{Socket, SocketError, SocketReader, SocketWriter};
use crate::protocol::{close_code, FrameKind, Incoming};

/// Adapter over [`axum::extract::ws::WebSocket`].
///
/// The read limit is enforced per frame here in addition to whatever
/// cap was configured on the upgrade itself.
pub struct AxumSocket {
    socket: WebSocket,
    read_limit: usize,
}

impl AxumSocket {
    #[must_use]
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            read_limit: usize::MAX,
        }
    }
}

impl Socket for AxumSocket {
    type Reader = AxumReader;
    type Writer = AxumWriter;

    fn set_read_limit(&mut self, bytes: usize) {
        self.read_limit = bytes;
    }

    fn split(self) -> (AxumReader, AxumWriter) {
        let (sink, stream) = self.socket.split();
        (
            AxumReader {
                stream,
                read_limit: self.read_limit,
            },
            AxumWriter {
                sink,
                close_sent: false,
            },
        )
    }
}

/// Read half of an [`AxumSocket`].
pub struct AxumReader {
    stream: SplitStream<WebSocket>,
    read_limit: usize,
}

#[async_trait]
impl SocketReader for AxumReader {
    async fn read_frame(&mut self) -> Result<Incoming, SocketError> {
        match self.stream.next().await {
            None => Err(SocketError::ConnectionReset),
            Some(Err(err)) => Err(SocketError::transport(err)),
            Some(Ok(message)) => {
                let size = payload_len(&message);
                if size > self.read_limit {
                    return Err(SocketError::FrameTooLarge {
                        size,
                        limit: self.read_limit,
                    });
                }
                match message {
                    Message::Text(text) => {
                        Ok(Incoming::Text(Bytes::copy_from_slice(text.as_bytes())))
                    }
                    Message::Binary(payload) => Ok(Incoming::Binary(payload)),
                    Message::Ping(payload) => Ok(Incoming::Ping(payload)),
                    Message::Pong(payload) => Ok(Incoming::Pong(payload)),
                    Message::Close(Some(frame)) => Err(SocketError::CloseFrame {
                        code: frame.code,
                        reason: frame.reason.to_string(),
                    }),
                    Message::Close(None) => Err(SocketError::CloseFrame {
                        code: close_code::NO_STATUS,
                        reason: String::new(),
                    }),
                }
            }
        }
    }
}

/// Write half of an [`AxumSocket`].
pub struct AxumWriter {
    sink: SplitSink<WebSocket, Message>,
    close_sent: bool,
}

#[async_trait]
impl SocketWriter for AxumWriter {
    async fn write_frame(&mut self, kind: FrameKind, payload: Bytes) -> Result<(), SocketError> {
        if self.close_sent {
            return Err(SocketError::CloseSent);
        }
        let message = match kind {
            FrameKind::Text => {
                let text = String::from_utf8(payload.to_vec()).map_err(SocketError::transport)?;
                Message::Text(text.into())
            }
            FrameKind::Binary => Message::Binary(payload),
            FrameKind::Ping => Message::Ping(payload),
            FrameKind::Close => {
                self.close_sent = true;
                Message::Close(None)
            }
        };
        self.sink.send(message).await.map_err(SocketError::transport)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.sink.close().await.map_err(SocketError::transport)
    }
}

fn payload_len(message: &Message) -> usize {
    match message {
        Message::Text(text) => text.len(),
        Message::Binary(payload) | Message::Ping(payload) | Message::Pong(payload) => {
            payload.len()
        }
        Message::Close(_) => 0,
    }
}
