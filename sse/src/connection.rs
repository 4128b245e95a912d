use crate::message::Message;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};

pub type MessageSender = mpsc::Sender<Message>;
pub type MessageReceiver = mpsc::Receiver<Message>;

// Process-wide arrival counter, used only to order snapshots
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a subscriber connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId {
    uuid: uuid::Uuid,
    sequence: u64,
}

impl SubscriberId {
    pub fn new() -> Self {
        Self {
            uuid: uuid::Uuid::new_v4(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Position of this subscriber in arrival order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Open,
    Closed,
}

/// Why a subscriber left the `Open` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client went away or the transport completed the response
    Disconnected,
    /// A write did not complete within the write deadline
    TimedOut,
    /// The write channel to the client is gone
    WriteFailed,
    /// The server is shutting down and ended the stream
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CloseReason::Disconnected => write!(f, "disconnected"),
            CloseReason::TimedOut => write!(f, "write timed out"),
            CloseReason::WriteFailed => write!(f, "write failed"),
            CloseReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// One live client connection.
///
/// The subscriber owns the sending half of its connection's queue. The
/// receiving half is drained by the transport; once the transport drops it,
/// every further write fails with `CloseReason::WriteFailed`.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    sender: MessageSender,
    closed: AtomicBool,
}

impl Subscriber {
    pub fn new(sender: MessageSender) -> Self {
        Self {
            id: SubscriberId::new(),
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn state(&self) -> SubscriberState {
        if self.closed.load(Ordering::Acquire) {
            SubscriberState::Closed
        } else {
            SubscriberState::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SubscriberState::Open
    }

    /// Move to `Closed`. Returns `true` only for the call that made the transition.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Queue one message for this subscriber, waiting at most `timeout` for room.
    pub async fn write(&self, message: Message, timeout: Duration) -> Result<(), CloseReason> {
        if !self.is_open() {
            return Err(CloseReason::WriteFailed);
        }

        self.sender
            .send_timeout(message, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => CloseReason::TimedOut,
                SendTimeoutError::Closed(_) => CloseReason::WriteFailed,
            })
    }
}
