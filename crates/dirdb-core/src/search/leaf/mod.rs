//! Leaf evaluators and cursors: one pair per assertion kind.

mod equality;
mod ordering;
mod presence;
mod scope;
mod substring;

use dirdb_proto::ExprNode;

use crate::cursor::IndexEntry;
use crate::error::{Error, Result};
use crate::schema::{AttributeType, MatchingRule};
use crate::storage::{Index, Partition};

pub use equality::{EqualityCursor, EqualityEvaluator};
pub use ordering::{OrderingCursor, OrderingEvaluator, OrderingKind};
pub use presence::{PresenceCursor, PresenceEvaluator};
pub use scope::{ObjectScopeEvaluator, OneLevelScopeEvaluator, ScopeCursor, SubtreeScopeEvaluator};
pub use substring::{SubstringCursor, SubstringEvaluator};

pub(crate) use substring::prefix_successor;

fn wrong_node(expected: &str, node: &ExprNode) -> Error {
    Error::IllegalState(format!(
        "{} evaluator cannot handle a {} node",
        expected,
        node.kind()
    ))
}

fn missing_index(at: &AttributeType) -> Error {
    Error::IllegalArgument(format!("attribute '{}' has no index", at.name()))
}

/// Raw or index-form values of `at` carried by a candidate.
///
/// Indexed attributes read the reverse index; others fetch the record.
fn candidate_values(
    partition: &Partition,
    at: &AttributeType,
    index: Option<&Index<String>>,
    candidate: &IndexEntry,
) -> Result<Vec<String>> {
    match index {
        Some(index) => index.values_of(candidate.id()),
        None => {
            let record = partition.fetch(candidate)?;
            Ok(record
                .attributes
                .iter()
                .filter(|attr| at.is_named(&attr.name))
                .flat_map(|attr| attr.values.iter().cloned())
                .collect())
        }
    }
}

/// Normalize a stored value; values the rule rejects never match.
fn normalized(rule: &MatchingRule, value: &str) -> Option<String> {
    rule.normalize(value).ok()
}
