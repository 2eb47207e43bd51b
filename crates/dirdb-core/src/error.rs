//! Core error types.

use thiserror::Error;

use dirdb_proto::EntryId;

/// Core search engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// `get()` was called while the cursor is not positioned on an element.
    #[error("cursor is not positioned on an element")]
    InvalidCursorPosition,

    /// The cursor kind has no value ordering to seek on.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The cursor was used after `close()`.
    #[error("cursor has been closed")]
    CursorClosed,

    /// Required schema metadata is missing or a node was given to the
    /// wrong evaluator.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A combinator was constructed with too few branches or an argument
    /// is outside its domain.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] dirdb_proto::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Entry not found in the master table.
    #[error("entry {0} not found")]
    NotFound(EntryId),
}

impl Error {
    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        Error::UnsupportedOperation(what.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
