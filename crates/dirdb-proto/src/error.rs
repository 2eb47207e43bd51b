//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or validating protocol values.
#[derive(Debug, Error)]
pub enum Error {
    /// A filter node is structurally invalid.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A directory entry is malformed.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}
