//! The public hub facade.
//!
//! A [`Hub`] is cheap to clone and safe to share; all state lives
//! behind shared references. The expected setup installs handlers
//! first, then mounts [`Hub::handle_request`] (or
//! [`Hub::handle_request_with_tags`]) inside a host router and
//! broadcasts from wherever the application likes.

mod drain;
mod handlers;

pub(crate) use drain::DrainBarrier;
pub(crate) use handlers::HandlerTable;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::request::Parts;
use tokio::time;

use crate::config::{ConfigError, HubConfig};
use crate::error::HubError;
use crate::protocol::Packet;
use crate::registry::Registry;
use crate::session::{run_reader, run_writer, Session};
use crate::socket::{AxumSocket, Socket};

/// How often the shutdown observer re-reads the drain counter.
const SHUTDOWN_OBSERVE_PERIOD: Duration = Duration::from_millis(500);

/// The hub: upgrade entry points, lifecycle handlers, broadcast
/// selectors and graceful shutdown over a shared session registry.
#[derive(Clone)]
pub struct Hub {
    config: Arc<HubConfig>,
    handlers: Arc<HandlerTable>,
    registry: Arc<Registry>,
    barrier: Arc<DrainBarrier>,
}

impl Hub {
    /// Hub with default tunables.
    #[must_use]
    pub fn new() -> Self {
        Self::assemble(HubConfig::default())
    }

    /// Hub with caller-supplied tunables.
    pub fn with_config(config: HubConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config))
    }

    fn assemble(config: HubConfig) -> Self {
        let handlers = Arc::new(HandlerTable::new());
        Self {
            config: Arc::new(config),
            registry: Arc::new(Registry::new(handlers.clone())),
            handlers,
            barrier: Arc::new(DrainBarrier::new()),
        }
    }

    /// The tunables this hub was built with.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Handler installers. Install before the hub starts serving.
    // ------------------------------------------------------------------

    /// Fired after a session is registered.
    pub fn handle_connect(&self, f: impl Fn(&Arc<Session>) + Send + Sync + 'static) {
        self.handlers.set_connect(Arc::new(f));
    }

    /// Fired after a session is unregistered.
    pub fn handle_disconnect(&self, f: impl Fn(&Arc<Session>) + Send + Sync + 'static) {
        self.handlers.set_disconnect(Arc::new(f));
    }

    /// Fired for every recoverable error in a session's lifecycle.
    pub fn handle_error(&self, f: impl Fn(&Arc<Session>, &HubError) + Send + Sync + 'static) {
        self.handlers.set_error(Arc::new(f));
    }

    /// Fired when a text frame arrives.
    pub fn handle_received_text(&self, f: impl Fn(&Arc<Session>, &[u8]) + Send + Sync + 'static) {
        self.handlers.set_received_text(Arc::new(f));
    }

    /// Fired when a binary frame arrives.
    pub fn handle_received_binary(
        &self,
        f: impl Fn(&Arc<Session>, &[u8]) + Send + Sync + 'static,
    ) {
        self.handlers.set_received_binary(Arc::new(f));
    }

    /// Fired after a text frame is written to the wire.
    pub fn handle_sent_text(&self, f: impl Fn(&Arc<Session>, &[u8]) + Send + Sync + 'static) {
        self.handlers.set_sent_text(Arc::new(f));
    }

    /// Fired after a binary frame is written to the wire.
    pub fn handle_sent_binary(&self, f: impl Fn(&Arc<Session>, &[u8]) + Send + Sync + 'static) {
        self.handlers.set_sent_binary(Arc::new(f));
    }

    /// Fired after a keep-alive ping is written to the wire.
    pub fn handle_sent_ping(&self, f: impl Fn(&Arc<Session>, &[u8]) + Send + Sync + 'static) {
        self.handlers.set_sent_ping(Arc::new(f));
    }

    /// Fired when the peer pings us.
    pub fn handle_ping(&self, f: impl Fn(&Arc<Session>, &[u8]) + Send + Sync + 'static) {
        self.handlers.set_ping(Arc::new(f));
    }

    /// Fired when the peer answers a keep-alive ping.
    pub fn handle_pong(&self, f: impl Fn(&Arc<Session>, &[u8]) + Send + Sync + 'static) {
        self.handlers.set_pong(Arc::new(f));
    }

    /// Fired when the peer sends a close frame.
    pub fn handle_close(&self, f: impl Fn(u16, &str) + Send + Sync + 'static) {
        self.handlers.set_close(Arc::new(f));
    }

    /// Replaces the log sink for the hub's stable log events. The
    /// default forwards to `tracing` at info level.
    pub fn handle_log(&self, f: impl Fn(&Arc<Session>, &str) + Send + Sync + 'static) {
        self.handlers.set_log(Arc::new(f));
    }

    // ------------------------------------------------------------------
    // Upgrade entry points.
    // ------------------------------------------------------------------

    /// Upgrade an inbound request and run the session to completion.
    ///
    /// `on_upgrade` runs synchronously before the session becomes
    /// visible to broadcasts, so per-session state can be installed
    /// ahead of any traffic. A closed hub answers with
    /// `503 Service Unavailable` without upgrading.
    pub fn handle_request<F>(&self, parts: Parts, ws: WebSocketUpgrade, on_upgrade: F) -> Response
    where
        F: FnOnce(&Arc<Session>) + Send + 'static,
    {
        self.handle_request_with_tags(parts, ws, HashSet::new(), on_upgrade)
    }

    /// Like [`Hub::handle_request`], registering the session under the
    /// given tags for selective fan-out.
    pub fn handle_request_with_tags<F>(
        &self,
        parts: Parts,
        ws: WebSocketUpgrade,
        tags: HashSet<String>,
        on_upgrade: F,
    ) -> Response
    where
        F: FnOnce(&Arc<Session>) + Send + 'static,
    {
        if !self.registry.is_open() {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        let hub = self.clone();
        ws.max_message_size(self.config.max_message_size)
            .on_upgrade(move |socket| async move {
                hub.serve(AxumSocket::new(socket), parts, tags, on_upgrade)
                    .await;
            })
    }

    /// Run one session over an already-upgraded socket and block until
    /// the peer disconnects.
    ///
    /// This is the adapter-agnostic core behind
    /// [`Hub::handle_request`]; hosts embedding a different frame
    /// library implement [`Socket`] and call this directly.
    pub async fn serve<S>(
        &self,
        mut socket: S,
        parts: Parts,
        tags: HashSet<String>,
        on_upgrade: impl FnOnce(&Arc<Session>),
    ) where
        S: Socket,
    {
        if !self.registry.is_open() {
            return;
        }
        socket.set_read_limit(self.config.max_message_size);
        let (reader, writer) = socket.split();
        let (session, mailbox) = Session::new(
            parts,
            self.config.message_queue_size,
            self.handlers.clone(),
            self.barrier.clone(),
        );

        on_upgrade(&session);
        self.registry.register(&session, tags);
        self.handlers.connect(&session);

        let writer_task = tokio::spawn(run_writer(
            session.clone(),
            writer,
            mailbox,
            self.config.clone(),
        ));

        // Tell the peer which session it got.
        let notification = serde_json::json!({ "sessionId": session.id() }).to_string();
        self.registry
            .broadcast_to(std::slice::from_ref(&session), Packet::text(notification));

        run_reader(session.clone(), reader, self.config.clone()).await;

        session.close();
        if writer_task.await.is_err() {
            tracing::error!(session_id = %session.id(), "writer task panicked");
        }
        self.registry.unregister(&session);
        self.handlers.disconnect(&session);
    }

    // ------------------------------------------------------------------
    // Broadcast selectors.
    // ------------------------------------------------------------------

    /// Send a text frame to every live session.
    pub fn broadcast_text_to_all(&self, message: impl Into<Bytes>) {
        self.registry
            .broadcast_to(&self.registry.all(), Packet::text(message));
    }

    /// Send a text frame to an explicit set of sessions.
    pub fn broadcast_text_to(&self, message: impl Into<Bytes>, sessions: &[Arc<Session>]) {
        self.registry.broadcast_to(sessions, Packet::text(message));
    }

    /// Send a text frame to every session registered under `tag`.
    pub fn broadcast_text_to_tag(&self, message: impl Into<Bytes>, tag: &str) {
        self.registry
            .broadcast_to(&self.registry.by_tag(tag), Packet::text(message));
    }

    /// Send a text frame to every session matching `predicate`.
    pub fn broadcast_text_with_filtering(
        &self,
        message: impl Into<Bytes>,
        predicate: impl Fn(&Session) -> bool,
    ) {
        self.registry
            .broadcast_to(&self.registry.filter(predicate), Packet::text(message));
    }

    /// Send a binary frame to every live session.
    pub fn broadcast_binary_to_all(&self, message: impl Into<Bytes>) {
        self.registry
            .broadcast_to(&self.registry.all(), Packet::binary(message));
    }

    /// Send a binary frame to an explicit set of sessions.
    pub fn broadcast_binary_to(&self, message: impl Into<Bytes>, sessions: &[Arc<Session>]) {
        self.registry.broadcast_to(sessions, Packet::binary(message));
    }

    /// Send a binary frame to every session registered under `tag`.
    pub fn broadcast_binary_to_tag(&self, message: impl Into<Bytes>, tag: &str) {
        self.registry
            .broadcast_to(&self.registry.by_tag(tag), Packet::binary(message));
    }

    /// Send a binary frame to every session matching `predicate`.
    pub fn broadcast_binary_with_filtering(
        &self,
        message: impl Into<Bytes>,
        predicate: impl Fn(&Session) -> bool,
    ) {
        self.registry
            .broadcast_to(&self.registry.filter(predicate), Packet::binary(message));
    }

    /// Ask every live session to close.
    pub fn broadcast_exit(&self) {
        self.registry
            .broadcast_to(&self.registry.all(), Packet::close());
    }

    /// Ask an explicit set of sessions to close.
    pub fn broadcast_exit_to(&self, sessions: &[Arc<Session>]) {
        self.registry.broadcast_to(sessions, Packet::close());
    }

    // ------------------------------------------------------------------
    // Introspection and lifecycle.
    // ------------------------------------------------------------------

    /// Materialized snapshot of every live session.
    #[must_use]
    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.registry.all()
    }

    /// Whether the hub still accepts upgrades and broadcasts.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.registry.is_open()
    }

    /// Close the hub, send every session a close frame, and wait until
    /// every queued packet has drained to the wire or been dropped.
    ///
    /// No deadline is imposed here; per-write and read deadlines bound
    /// each unresponsive session, and hosts that need a hard cap can
    /// wrap this call in their own timeout. Calling it again behaves
    /// like the first call.
    pub async fn shutdown(&self) {
        self.registry.close();
        self.broadcast_exit();

        let barrier = self.barrier.clone();
        let observer = tokio::spawn(async move {
            let mut last = 0;
            loop {
                let outstanding = barrier.outstanding();
                if outstanding != last {
                    tracing::info!(outstanding, "draining queued packets");
                    last = outstanding;
                }
                time::sleep(SHUTDOWN_OBSERVE_PERIOD).await;
            }
        });

        self.barrier.wait().await;
        observer.abort();
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("sessions", &self.registry.len())
            .field("open", &self.registry.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use parking_lot::Mutex as PlMutex;
    use tokio::sync::mpsc;

    use super::*;
    use crate::protocol::{close_code, FrameKind, Incoming};
    use crate::socket::mock::{MockShared, MockSocket, ScriptStep};
    use crate::test_util::test_parts;

    fn registered_session(
        hub: &Hub,
        tags: &[&str],
    ) -> (Arc<Session>, mpsc::Receiver<Packet>) {
        let (session, rx) = Session::new(
            test_parts(),
            hub.config.message_queue_size,
            hub.handlers.clone(),
            hub.barrier.clone(),
        );
        let tags = tags.iter().map(|tag| (*tag).to_owned()).collect();
        hub.registry.register(&session, tags);
        (session, rx)
    }

    fn payloads(rx: &mut mpsc::Receiver<Packet>) -> Vec<(FrameKind, Bytes)> {
        let mut out = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            let kind = packet.kind();
            out.push((kind, packet.payload().clone()));
        }
        out
    }

    #[tokio::test]
    async fn rejected_construction_below_minimum_queue_size() {
        let config = HubConfig {
            message_queue_size: 4,
            ..Default::default()
        };
        assert!(Hub::with_config(config).is_err());

        let config = HubConfig {
            message_queue_size: 5,
            ..Default::default()
        };
        assert!(Hub::with_config(config).is_ok());
    }

    #[tokio::test]
    async fn tag_broadcast_reaches_exactly_the_tagged_sessions() {
        let hub = Hub::new();
        let (_s1, mut rx1) = registered_session(&hub, &["a"]);
        let (_s2, mut rx2) = registered_session(&hub, &["a", "b"]);
        let (_s3, mut rx3) = registered_session(&hub, &["b"]);

        hub.broadcast_text_to_tag("x", "a");

        assert_eq!(payloads(&mut rx1), vec![(FrameKind::Text, Bytes::from("x"))]);
        assert_eq!(payloads(&mut rx2), vec![(FrameKind::Text, Bytes::from("x"))]);
        assert!(payloads(&mut rx3).is_empty());
    }

    #[tokio::test]
    async fn predicate_broadcast_reaches_exactly_the_matching_session() {
        let hub = Hub::new();
        let (_s1, mut rx1) = registered_session(&hub, &[]);
        let (s2, mut rx2) = registered_session(&hub, &[]);
        let (_s3, mut rx3) = registered_session(&hub, &[]);

        let wanted = s2.id();
        hub.broadcast_text_with_filtering("p", move |session| session.id() == wanted);

        assert!(payloads(&mut rx1).is_empty());
        assert_eq!(payloads(&mut rx2), vec![(FrameKind::Text, Bytes::from("p"))]);
        assert!(payloads(&mut rx3).is_empty());
    }

    #[tokio::test]
    async fn explicit_set_and_binary_broadcasts() {
        let hub = Hub::new();
        let (s1, mut rx1) = registered_session(&hub, &[]);
        let (_s2, mut rx2) = registered_session(&hub, &[]);

        hub.broadcast_binary_to(Bytes::from_static(b"\x01\x02"), &[s1.clone()]);
        hub.broadcast_binary_to_all(Bytes::from_static(b"\x03"));

        assert_eq!(
            payloads(&mut rx1),
            vec![
                (FrameKind::Binary, Bytes::from_static(b"\x01\x02")),
                (FrameKind::Binary, Bytes::from_static(b"\x03")),
            ]
        );
        assert_eq!(
            payloads(&mut rx2),
            vec![(FrameKind::Binary, Bytes::from_static(b"\x03"))]
        );
    }

    #[tokio::test]
    async fn serve_runs_an_echo_session_end_to_end() {
        let hub = Hub::new();

        let connected: Arc<PlMutex<Option<String>>> = Arc::new(PlMutex::new(None));
        let disconnected: Arc<PlMutex<Option<String>>> = Arc::new(PlMutex::new(None));
        {
            let connected = connected.clone();
            hub.handle_connect(move |session| {
                *connected.lock() = Some(session.id());
            });
            let disconnected = disconnected.clone();
            hub.handle_disconnect(move |session| {
                *disconnected.lock() = Some(session.id());
            });
        }
        hub.handle_received_text(|session, payload| {
            session.enqueue(Packet::text(payload.to_vec()));
        });

        let (socket, shared) = MockSocket::new(vec![ScriptStep::Frame(Incoming::Text(
            Bytes::from("message"),
        ))]);

        let mut upgraded_id: Option<String> = None;
        hub.serve(socket, test_parts(), HashSet::new(), |session| {
            upgraded_id = Some(session.id());
        })
        .await;

        let written = shared.written.lock();
        assert_eq!(written.len(), 2, "initial notification plus echo");
        assert_eq!(written[0].0, FrameKind::Text);
        let session_id = connected.lock().clone().expect("connect handler fired");
        assert_eq!(
            written[0].1.as_ref(),
            format!("{{\"sessionId\":\"{session_id}\"}}").as_bytes()
        );
        assert_eq!(written[1].0, FrameKind::Text);
        assert_eq!(written[1].1.as_ref(), b"message");

        assert_eq!(upgraded_id.as_deref(), Some(session_id.as_str()));
        assert_eq!(disconnected.lock().clone(), Some(session_id));
        assert!(shared.closed.load(Ordering::SeqCst), "socket released");
        assert!(hub.all_sessions().is_empty(), "session unregistered");
        assert_eq!(hub.barrier.outstanding(), 0);
        assert_eq!(
            shared.read_limit.load(Ordering::SeqCst),
            hub.config.max_message_size
        );
    }

    #[tokio::test]
    async fn serve_on_a_closed_hub_is_a_no_op() {
        let hub = Hub::new();
        hub.registry.close();

        let connects = Arc::new(AtomicUsize::new(0));
        {
            let connects = connects.clone();
            hub.handle_connect(move |_| {
                connects.fetch_add(1, Ordering::SeqCst);
            });
        }

        let (socket, shared) = MockSocket::new(vec![ScriptStep::Idle]);
        hub.serve(socket, test_parts(), HashSet::new(), |_| {}).await;

        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(shared.written.lock().is_empty());
        assert!(hub.all_sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_every_session_and_drains() {
        let hub = Hub::new();

        let mut serving = Vec::new();
        let mut shares: Vec<Arc<MockShared>> = Vec::new();
        for _ in 0..3 {
            let (socket, shared) = MockSocket::new(vec![ScriptStep::AwaitClose {
                code: close_code::NO_STATUS,
            }]);
            shares.push(shared);
            let hub = hub.clone();
            serving.push(tokio::spawn(async move {
                hub.serve(socket, test_parts(), HashSet::new(), |_| {}).await;
            }));
        }

        while hub.all_sessions().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        hub.shutdown().await;
        assert!(!hub.is_open());

        for task in serving {
            task.await.expect("serve task");
        }
        for shared in &shares {
            assert!(
                shared
                    .written
                    .lock()
                    .iter()
                    .any(|(kind, _)| *kind == FrameKind::Close),
                "every session must see a close frame"
            );
        }
        assert!(hub.all_sessions().is_empty());
        assert_eq!(hub.barrier.outstanding(), 0);

        // A second shutdown is a no-op.
        hub.shutdown().await;

        // New upgrades are rejected quietly.
        let (socket, shared) = MockSocket::new(vec![ScriptStep::Idle]);
        hub.serve(socket, test_parts(), HashSet::new(), |_| {}).await;
        assert!(shared.written.lock().is_empty());
    }
}
