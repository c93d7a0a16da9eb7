//! Per-event error types
//!
//! Every failure while handling a single change event is one of these
//! variants, so the consumer can decide per kind whether to drop, halt or
//! stop the process.

use thiserror::Error;
use vecsync_core::VecsyncError;

/// Why an event carried nothing actionable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("envelope has no payload object")]
    MissingPayload,

    #[error("no route for topic {topic}")]
    Unrouted { topic: String },

    #[error("delete event has no before image")]
    MissingBefore,

    #[error("event has no after image")]
    MissingAfter,

    #[error("record has no usable `{field}` value")]
    MissingRecordId { field: String },
}

/// Failure to apply one change event
#[derive(Error, Debug)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Malformed(#[from] MalformedEvent),

    #[error("embedding failed after {attempts} attempt(s): {source}")]
    Provider {
        attempts: u32,
        #[source]
        source: VecsyncError,
    },

    #[error("vector store call failed after {attempts} attempt(s): {source}")]
    Store {
        attempts: u32,
        #[source]
        source: VecsyncError,
    },

    #[error("embedding has {actual} dimensions, collections expect {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Closed classification of `EventError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing to apply; discard
    Malformed,
    /// Embedding provider failed
    Provider,
    /// Vector store failed
    Store,
    /// Deployment is misconfigured; no later event can succeed
    Config,
}

impl EventError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Store { .. } => ErrorKind::Store,
            Self::DimensionMismatch { .. } => ErrorKind::Config,
        }
    }

    /// Unrouted topics are expected noise, not a data problem
    pub fn is_unrouted(&self) -> bool {
        matches!(self, Self::Malformed(MalformedEvent::Unrouted { .. }))
    }
}
