//! The lifecycle handler table.
//!
//! One replaceable slot per event. Slots are expected to be installed
//! before the hub starts serving; dispatch clones the slot out of the
//! lock before invoking it, so a handler may freely call back into the
//! hub (for example to enqueue an echo).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::HubError;
use crate::session::Session;

pub(crate) type SessionFn = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;
pub(crate) type SessionMessageFn = Arc<dyn Fn(&Arc<Session>, &[u8]) + Send + Sync>;
pub(crate) type SessionErrorFn = Arc<dyn Fn(&Arc<Session>, &HubError) + Send + Sync>;
pub(crate) type CloseFn = Arc<dyn Fn(u16, &str) + Send + Sync>;
pub(crate) type LogFn = Arc<dyn Fn(&Arc<Session>, &str) + Send + Sync>;

struct Handlers {
    connect: SessionFn,
    disconnect: SessionFn,
    error: SessionErrorFn,
    received_text: SessionMessageFn,
    received_binary: SessionMessageFn,
    sent_text: SessionMessageFn,
    sent_binary: SessionMessageFn,
    sent_ping: SessionMessageFn,
    ping: SessionMessageFn,
    pong: SessionMessageFn,
    close: CloseFn,
    log: LogFn,
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            connect: Arc::new(|_| {}),
            disconnect: Arc::new(|_| {}),
            error: Arc::new(|session, err| {
                tracing::error!(session_id = %session.id(), error = %err, "session error");
            }),
            received_text: Arc::new(|_, _| {}),
            received_binary: Arc::new(|_, _| {}),
            sent_text: Arc::new(|_, _| {}),
            sent_binary: Arc::new(|_, _| {}),
            sent_ping: Arc::new(|_, _| {}),
            ping: Arc::new(|_, _| {}),
            pong: Arc::new(|_, _| {}),
            close: Arc::new(|_, _| {}),
            log: Arc::new(|session, message| {
                tracing::info!(session_id = %session.id(), "{message}");
            }),
        }
    }
}

pub(crate) struct HandlerTable {
    inner: RwLock<Handlers>,
}

impl HandlerTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(Handlers::default()),
        }
    }

    pub(crate) fn set_connect(&self, f: SessionFn) {
        self.inner.write().connect = f;
    }

    pub(crate) fn set_disconnect(&self, f: SessionFn) {
        self.inner.write().disconnect = f;
    }

    pub(crate) fn set_error(&self, f: SessionErrorFn) {
        self.inner.write().error = f;
    }

    pub(crate) fn set_received_text(&self, f: SessionMessageFn) {
        self.inner.write().received_text = f;
    }

    pub(crate) fn set_received_binary(&self, f: SessionMessageFn) {
        self.inner.write().received_binary = f;
    }

    pub(crate) fn set_sent_text(&self, f: SessionMessageFn) {
        self.inner.write().sent_text = f;
    }

    pub(crate) fn set_sent_binary(&self, f: SessionMessageFn) {
        self.inner.write().sent_binary = f;
    }

    pub(crate) fn set_sent_ping(&self, f: SessionMessageFn) {
        self.inner.write().sent_ping = f;
    }

    pub(crate) fn set_ping(&self, f: SessionMessageFn) {
        self.inner.write().ping = f;
    }

    pub(crate) fn set_pong(&self, f: SessionMessageFn) {
        self.inner.write().pong = f;
    }

    pub(crate) fn set_close(&self, f: CloseFn) {
        self.inner.write().close = f;
    }

    pub(crate) fn set_log(&self, f: LogFn) {
        self.inner.write().log = f;
    }

    pub(crate) fn connect(&self, session: &Arc<Session>) {
        let f = self.inner.read().connect.clone();
        f(session);
    }

    pub(crate) fn disconnect(&self, session: &Arc<Session>) {
        let f = self.inner.read().disconnect.clone();
        f(session);
    }

    pub(crate) fn error(&self, session: &Arc<Session>, err: &HubError) {
        let f = self.inner.read().error.clone();
        f(session, err);
    }

    pub(crate) fn received_text(&self, session: &Arc<Session>, payload: &[u8]) {
        let f = self.inner.read().received_text.clone();
        f(session, payload);
    }

    pub(crate) fn received_binary(&self, session: &Arc<Session>, payload: &[u8]) {
        let f = self.inner.read().received_binary.clone();
        f(session, payload);
    }

    pub(crate) fn sent_text(&self, session: &Arc<Session>, payload: &[u8]) {
        let f = self.inner.read().sent_text.clone();
        f(session, payload);
    }

    pub(crate) fn sent_binary(&self, session: &Arc<Session>, payload: &[u8]) {
        let f = self.inner.read().sent_binary.clone();
        f(session, payload);
    }

    pub(crate) fn sent_ping(&self, session: &Arc<Session>, payload: &[u8]) {
        let f = self.inner.read().sent_ping.clone();
        f(session, payload);
    }

    pub(crate) fn ping(&self, session: &Arc<Session>, payload: &[u8]) {
        let f = self.inner.read().ping.clone();
        f(session, payload);
    }

    pub(crate) fn pong(&self, session: &Arc<Session>, payload: &[u8]) {
        let f = self.inner.read().pong.clone();
        f(session, payload);
    }

    pub(crate) fn close(&self, code: u16, reason: &str) {
        let f = self.inner.read().close.clone();
        f(code, reason);
    }

    pub(crate) fn log(&self, session: &Arc<Session>, message: &str) {
        let f = self.inner.read().log.clone();
        f(session, message);
    }
}
