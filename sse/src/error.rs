//! Error types for the `sse` crate.
use std::error::Error as StdError;
use std::fmt;

/// Errors returned by `BroadcastEngine` operations.
///
/// Only conditions the caller has to react to are modeled here. Failures that
/// belong to a single subscriber (a broken pipe, a stalled write) are handled
/// inside the engine and surface as `CloseReason`s and delivery counts, never
/// as an `Error`.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    // A publish-class operation found no registered subscribers
    NoSubscribers,
    // The configured subscriber limit has been reached
    CapacityExceeded { max_subscribers: usize },
    // Shutdown has begun and no new streams are accepted
    ShuttingDown,
}

impl Error {
    pub fn no_subscribers() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::NoSubscribers,
        }
    }

    pub fn capacity_exceeded(max_subscribers: usize) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::CapacityExceeded { max_subscribers },
        }
    }

    pub fn shutting_down() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::ShuttingDown,
        }
    }

    pub fn is_no_subscribers(&self) -> bool {
        self.error_kind == ErrorKind::NoSubscribers
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::NoSubscribers => write!(f, "SSE Error: no subscribers"),
            ErrorKind::CapacityExceeded { max_subscribers } => {
                write!(f, "SSE Error: subscriber limit of {max_subscribers} reached")
            }
            ErrorKind::ShuttingDown => write!(f, "SSE Error: shutting down"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
