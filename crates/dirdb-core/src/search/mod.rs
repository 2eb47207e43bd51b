//! Filter evaluation over partition indices.
//!
//! A filter is evaluated in two forms:
//!
//! - [`FilterEvaluator`]: decides whether one candidate matches
//! - [`SearchCursor`]: walks the candidates of a filter, in both directions
//!
//! Leaf nodes read user and system indices directly. And, Or and Not nodes
//! combine a cursor for one child with evaluators for the others. The
//! [`Optimizer`] estimates candidate counts so the [`CursorBuilder`] can pick
//! the cheapest driving cursor, and [`SearchEngine`] ties the steps
//! together.

mod and;
mod builder;
mod cursor;
mod engine;
mod evaluator;
pub mod leaf;
mod not;
mod optimizer;
mod or;

pub use and::{AndCursor, AndEvaluator};
pub use builder::{CursorBuilder, EvaluatorBuilder};
pub use cursor::{EmptyCursor, ScanCursor, SearchCursor};
pub use engine::SearchEngine;
pub use evaluator::{Evaluator, FilterEvaluator};
pub use leaf::{
    EqualityCursor, EqualityEvaluator, ObjectScopeEvaluator, OneLevelScopeEvaluator,
    OrderingCursor, OrderingEvaluator, OrderingKind, PresenceCursor, PresenceEvaluator,
    ScopeCursor, SubstringCursor, SubstringEvaluator, SubtreeScopeEvaluator,
};
pub use not::{NotCursor, NotEvaluator};
pub use optimizer::{Optimizer, PlanNode};
pub use or::{OrCursor, OrEvaluator};
