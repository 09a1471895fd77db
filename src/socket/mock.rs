//! Scripted in-memory socket for exercising sessions without a
//! network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{Socket, SocketError, SocketReader, SocketWriter};
use crate::protocol::{FrameKind, Incoming};

/// One step of a scripted read sequence.
pub(crate) enum ScriptStep {
    /// Deliver one inbound frame.
    Frame(Incoming),
    /// Fail the read with the given error.
    Fail(SocketError),
    /// Block until a close frame has been written, then report the
    /// peer's answering close.
    AwaitClose { code: u16 },
    /// Block forever.
    Idle,
}

/// State shared between the two halves and the test body.
pub(crate) struct MockShared {
    pub written: Mutex<Vec<(FrameKind, Bytes)>>,
    pub close_sent: AtomicBool,
    pub closed: AtomicBool,
    pub read_limit: AtomicUsize,
    pub fail_writes: AtomicBool,
    /// When set, every write sleeps this long before completing.
    pub stall_writes: Mutex<Option<Duration>>,
}

pub(crate) struct MockSocket {
    script: VecDeque<ScriptStep>,
    shared: Arc<MockShared>,
}

impl MockSocket {
    pub(crate) fn new(script: Vec<ScriptStep>) -> (Self, Arc<MockShared>) {
        let shared = Arc::new(MockShared {
            written: Mutex::new(Vec::new()),
            close_sent: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            read_limit: AtomicUsize::new(usize::MAX),
            fail_writes: AtomicBool::new(false),
            stall_writes: Mutex::new(None),
        });
        (
            Self {
                script: script.into(),
                shared: shared.clone(),
            },
            shared,
        )
    }
}

impl Socket for MockSocket {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn set_read_limit(&mut self, bytes: usize) {
        self.shared.read_limit.store(bytes, Ordering::SeqCst);
    }

    fn split(self) -> (MockReader, MockWriter) {
        (
            MockReader {
                script: self.script,
                shared: self.shared.clone(),
            },
            MockWriter { shared: self.shared },
        )
    }
}

pub(crate) struct MockReader {
    script: VecDeque<ScriptStep>,
    shared: Arc<MockShared>,
}

#[async_trait]
impl SocketReader for MockReader {
    async fn read_frame(&mut self) -> Result<Incoming, SocketError> {
        match self.script.pop_front() {
            None => Err(SocketError::ConnectionReset),
            Some(ScriptStep::Frame(frame)) => Ok(frame),
            Some(ScriptStep::Fail(err)) => Err(err),
            Some(ScriptStep::AwaitClose { code }) => {
                while !self.shared.close_sent.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Err(SocketError::CloseFrame {
                    code,
                    reason: String::new(),
                })
            }
            Some(ScriptStep::Idle) => std::future::pending().await,
        }
    }
}

pub(crate) struct MockWriter {
    shared: Arc<MockShared>,
}

#[async_trait]
impl SocketWriter for MockWriter {
    async fn write_frame(&mut self, kind: FrameKind, payload: Bytes) -> Result<(), SocketError> {
        if self.shared.close_sent.load(Ordering::SeqCst) {
            return Err(SocketError::CloseSent);
        }
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(SocketError::transport(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        let stall = *self.shared.stall_writes.lock();
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        if kind == FrameKind::Close {
            self.shared.close_sent.store(true, Ordering::SeqCst);
        }
        self.shared.written.lock().push((kind, payload));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
