//! The live session set and its tag index.
//!
//! Membership and the tag index are held in separate concurrent maps.
//! Registration inserts into the tag index before membership and
//! unregistration removes membership first, so a tag bucket may
//! briefly reference a session that is mid-removal; every selector
//! resolves tag entries through the member map, which keeps such
//! sessions out of any returned view.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::hub::HandlerTable;
use crate::protocol::{FrameKind, Packet};
use crate::session::Session;

/// Log event emitted when a session joins the registry.
pub const SESSION_REGISTERED: &str = "SESSION_REGISTERED";

/// Log event emitted when a session leaves the registry.
pub const SESSION_UNREGISTERED: &str = "SESSION_UNREGISTERED";

/// Log event emitted when a broadcast skips a session that has already
/// closed.
pub const CANNOT_SEND_TO_CLOSED_SESSION: &str = "CANNOT_SEND_TO_CLOSED_SESSION";

pub(crate) struct Registry {
    members: DashMap<Uuid, Arc<Session>>,
    by_tag: DashMap<String, HashSet<Uuid>>,
    handlers: Arc<HandlerTable>,
    open: AtomicBool,
}

impl Registry {
    pub(crate) fn new(handlers: Arc<HandlerTable>) -> Self {
        Self {
            members: DashMap::new(),
            by_tag: DashMap::new(),
            handlers,
            open: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// One-way transition; broadcasts other than close frames are
    /// dropped afterwards.
    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Insert the session into the tag index, then into membership.
    pub(crate) fn register(&self, session: &Arc<Session>, tags: HashSet<String>) {
        for tag in tags {
            session.insert_tag(&tag);
            self.by_tag.entry(tag).or_default().insert(session.uuid());
        }
        self.members.insert(session.uuid(), session.clone());
        self.handlers.log(session, SESSION_REGISTERED);
    }

    /// Remove from membership, then from each tag bucket. Empty
    /// buckets are dropped.
    pub(crate) fn unregister(&self, session: &Arc<Session>) {
        self.members.remove(&session.uuid());
        for tag in session.tags() {
            self.by_tag.alter(&tag, |_, mut bucket| {
                bucket.remove(&session.uuid());
                bucket
            });
            self.by_tag.remove_if(&tag, |_, bucket| bucket.is_empty());
        }
        self.handlers.log(session, SESSION_UNREGISTERED);
    }

    /// Materialized snapshot of every live session.
    pub(crate) fn all(&self) -> Vec<Arc<Session>> {
        self.members
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Materialized snapshot of the sessions under `tag`.
    pub(crate) fn by_tag(&self, tag: &str) -> Vec<Arc<Session>> {
        self.by_tag
            .get(tag)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|id| self.members.get(id).map(|entry| entry.value().clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Materialized snapshot of the sessions matching `predicate`.
    /// The predicate runs while map shards are read-locked, so it must
    /// be pure and fast.
    pub(crate) fn filter(&self, predicate: impl Fn(&Session) -> bool) -> Vec<Arc<Session>> {
        self.members
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Fan one packet out to the given sessions. On a closed hub only
    /// close frames pass; sessions that already closed are skipped
    /// with a log event.
    pub(crate) fn broadcast_to(&self, sessions: &[Arc<Session>], packet: Packet) {
        if !self.is_open() && packet.kind() != FrameKind::Close {
            return;
        }
        for session in sessions {
            if session.is_closed() {
                self.handlers.log(session, CANNOT_SEND_TO_CLOSED_SESSION);
                continue;
            }
            session.enqueue(packet.clone());
        }
    }
}
