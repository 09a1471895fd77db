//! # wshub
//!
//! Embeddable WebSocket hub for axum servers: upgrades inbound HTTP
//! connections to sessions, tracks the live session set with a tag
//! index, and fans out text/binary/close frames to subsets selected
//! by identity, tag, or predicate. The hub does not own the listener;
//! mount its entry points inside a host router.
//!
//! Each session runs a reader loop and a writer task over a bounded
//! outbound mailbox, with keep-alive pings and read/write deadlines.
//! [`Hub::shutdown`] closes the hub, asks every peer to leave, and
//! waits until every queued packet has drained.
//!
//! ```no_run
//! use axum::extract::{State, WebSocketUpgrade};
//! use axum::http::request::Parts;
//! use axum::response::Response;
//! use axum::{routing::get, Router};
//! use wshub::{Hub, Packet};
//!
//! async fn ws(State(hub): State<Hub>, parts: Parts, ws: WebSocketUpgrade) -> Response {
//!     hub.handle_request(parts, ws, |_session| {})
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = Hub::new();
//!     hub.handle_received_text(|session, payload| {
//!         session.enqueue(Packet::text(payload.to_vec()));
//!     });
//!
//!     let app = Router::new().route("/ws", get(ws)).with_state(hub);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
mod registry;
pub mod session;
pub mod socket;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::{ConfigError, HubConfig, MIN_MESSAGE_QUEUE_SIZE};
pub use error::HubError;
pub use hub::Hub;
pub use protocol::{close_code, FrameKind, Incoming, Packet};
pub use registry::{CANNOT_SEND_TO_CLOSED_SESSION, SESSION_REGISTERED, SESSION_UNREGISTERED};
pub use session::Session;
pub use socket::{AxumSocket, Socket, SocketError, SocketReader, SocketWriter};
