//! DirDB Core - Index storage, cursors and filter evaluation.
//!
//! This crate evaluates directory search filters against a partition: the
//! master table of entries plus sorted forward/reverse indices. Filters are
//! turned into bidirectional cursor trees that walk the matching entry ids
//! without a full scan whenever an index can drive them.

pub mod config;
pub mod cursor;
pub mod error;
pub mod schema;
pub mod search;
pub mod storage;

pub use config::{Backend, PartitionConfig, SearchConfig};
pub use cursor::{Cursor, CursorIds, CursorState, IndexCursor, IndexEntry};
pub use error::{Error, Result};
pub use schema::{AttributeType, MatchingRule, SchemaRegistry};
pub use search::{
    CursorBuilder, Evaluator, EvaluatorBuilder, FilterEvaluator, Optimizer, PlanNode,
    SearchCursor, SearchEngine,
};
pub use storage::{Index, MasterTable, Partition};

/// Re-export protocol types.
pub use dirdb_proto as proto;
