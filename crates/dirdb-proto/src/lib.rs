//! DirDB protocol types.
//!
//! This crate defines the values exchanged with the DirDB search engine:
//! the filter expression tree and the directory entry model.
//!
//! # Modules
//!
//! - [`filter`] - Filter expression tree and search scope types
//! - [`entry`] - Directory entries and attributes
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! Entries derive `rkyv::Archive`, `rkyv::Serialize` and `rkyv::Deserialize`
//! for storage, and serde for configuration and fixtures. Filter trees are
//! recursive and derive serde only.

pub mod entry;
pub mod error;
pub mod filter;

pub use entry::{Attribute, Entry, EntryId};
pub use error::Error;
pub use filter::{DerefAliases, ExprNode, ScopeNode, SearchScope, SubstringNode};
