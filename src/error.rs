//! Error types shared across the timer components

use std::path::PathBuf;

use thiserror::Error;

/// Persistence layer failure.
///
/// Callers must treat any of these as "state unknown": the write may or may
/// not have landed, so do not report success to a user on the strength of a
/// failed operation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode record for '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to decode record for '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
}

/// Rejection of a timer lifecycle request.
///
/// The precondition variants (`NotPausable`, `NotResumable`) mean the caller's
/// request was a no-op against the current state machine state. They are
/// reported as failures, never treated as fatal.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer duration must be greater than zero")]
    InvalidDuration,

    #[error("timer not active or already paused")]
    NotPausable,

    #[error("timer not active or not paused")]
    NotResumable,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure to deliver an event to a page context.
///
/// Never surfaced to users: an unreachable page self-detects expiry on its
/// next load.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("page context is gone")]
    ContextGone,

    #[error("page context has no listener installed")]
    NoListener,

    #[error("page context listener is closed")]
    ListenerClosed,

    #[error("listener cannot be installed into this context")]
    InstallFailed,
}

/// Failure of a request sent from a page context to the background context.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The background context could not be reached at all. Recoverable:
    /// log, surface a message, carry on.
    #[error("background context unreachable: {0}")]
    Unreachable(String),

    #[error(transparent)]
    Timer(#[from] TimerError),
}
