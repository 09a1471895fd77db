//! Per-peer session state and lifecycle.
//!
//! A [`Session`] owns the bounded outbound mailbox for one connected
//! peer, the tags it was registered under, and a session-local
//! key/value scratchpad for the host application. Two tasks drive it:
//! a writer that drains the mailbox onto the socket and a reader that
//! dispatches inbound frames; both live in this module's submodules.

mod reader;
mod writer;

pub(crate) use reader::run_reader;
pub(crate) use writer::run_writer;

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use http::request::Parts;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::HubError;
use crate::hub::{DrainBarrier, HandlerTable};
use crate::protocol::Packet;

/// One connected peer.
pub struct Session {
    id: Uuid,
    request: Parts,
    tags: RwLock<HashSet<String>>,
    kv: DashMap<String, Arc<dyn Any + Send + Sync>>,
    mailbox: Mutex<Option<mpsc::Sender<Packet>>>,
    closed: AtomicBool,
    capacity: usize,
    handlers: Arc<HandlerTable>,
    barrier: Arc<DrainBarrier>,
    weak: Weak<Session>,
}

enum Deposit {
    Accepted,
    Full,
    Gone,
}

impl Session {
    /// Fresh session with a bounded mailbox of `capacity` packets.
    /// Returns the receiving end for the writer task.
    pub(crate) fn new(
        request: Parts,
        capacity: usize,
        handlers: Arc<HandlerTable>,
        barrier: Arc<DrainBarrier>,
    ) -> (Arc<Self>, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = Arc::new_cyclic(|weak| Self {
            id: Uuid::new_v4(),
            request,
            tags: RwLock::new(HashSet::new()),
            kv: DashMap::new(),
            mailbox: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
            capacity,
            handlers,
            barrier,
            weak: weak.clone(),
        });
        (session, rx)
    }

    /// Stable identifier, canonical hyphenated form.
    #[must_use]
    pub fn id(&self) -> String {
        self.id.to_string()
    }

    pub(crate) fn uuid(&self) -> Uuid {
        self.id
    }

    /// The request that initiated this session.
    #[must_use]
    pub fn request(&self) -> &Parts {
        &self.request
    }

    /// Tags this session was registered under.
    #[must_use]
    pub fn tags(&self) -> HashSet<String> {
        self.tags.read().clone()
    }

    pub(crate) fn insert_tag(&self, tag: &str) {
        self.tags.write().insert(tag.to_owned());
    }

    /// Store a session-local value under `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.kv.insert(key.into(), Arc::new(value));
    }

    /// Fetch a session-local value, downcast to `T`. Returns `None`
    /// when the key is absent or holds a different type.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.kv.get(key)?.value().clone();
        value.downcast::<T>().ok()
    }

    /// Whether the session has finished closing.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queue a packet for the writer task. Never blocks: on a full
    /// mailbox the packet is dropped and the error handler fires with
    /// [`HubError::MailboxFull`].
    pub fn enqueue(&self, packet: Packet) {
        // Speculative increment first so the drain barrier can never
        // miss a packet that made it into the mailbox.
        self.barrier.add();
        let deposit = {
            let mailbox = self.mailbox.lock();
            match mailbox.as_ref() {
                Some(tx) => match tx.try_send(packet) {
                    Ok(()) => Deposit::Accepted,
                    Err(mpsc::error::TrySendError::Full(_)) => Deposit::Full,
                    Err(mpsc::error::TrySendError::Closed(_)) => Deposit::Gone,
                },
                None => Deposit::Gone,
            }
        };
        match deposit {
            Deposit::Accepted => {}
            Deposit::Full => {
                self.barrier.done();
                self.report_error(&HubError::MailboxFull {
                    capacity: self.capacity,
                });
            }
            Deposit::Gone => {
                // The writer is gone; the packet has nowhere to go.
                self.barrier.done();
                tracing::debug!(session_id = %self.id(), "packet dropped on closed mailbox");
            }
        }
    }

    /// Mark the session closed and close the mailbox. Runs once, after
    /// the reader has returned; the writer drains what is left and
    /// then releases the socket.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.mailbox.lock().take();
    }

    pub(crate) fn report_error(&self, err: &HubError) {
        if let Some(session) = self.weak.upgrade() {
            self.handlers.error(&session, err);
        }
    }

    pub(crate) fn log(&self, message: &str) {
        if let Some(session) = self.weak.upgrade() {
            self.handlers.log(&session, message);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
