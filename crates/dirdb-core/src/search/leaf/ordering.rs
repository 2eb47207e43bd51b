//! Ordering assertions: `(attr>=value)` and `(attr<=value)`.

use std::cmp::Ordering;
use std::ops::Bound;

use dirdb_proto::ExprNode;

use super::{candidate_values, missing_index, normalized, wrong_node};
use crate::cursor::{Cursor, CursorState, IndexCursor, IndexEntry};
use crate::error::{Error, Result};
use crate::schema::{AttributeType, MatchingRule};
use crate::search::cursor::{seek_matching, Direction};
use crate::search::evaluator::Evaluator;
use crate::storage::{ForwardKey, Index, Partition};

/// Direction of an ordering assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingKind {
    GreaterEq,
    LessEq,
}

impl OrderingKind {
    fn admits(self, ordering: Ordering) -> bool {
        match self {
            OrderingKind::GreaterEq => ordering != Ordering::Less,
            OrderingKind::LessEq => ordering != Ordering::Greater,
        }
    }
}

/// Split an ordering node into its parts.
fn parts(node: &ExprNode) -> Result<(OrderingKind, &str, &str)> {
    match node {
        ExprNode::GreaterEq { attribute, value } => {
            Ok((OrderingKind::GreaterEq, attribute.as_str(), value.as_str()))
        }
        ExprNode::LessEq { attribute, value } => {
            Ok((OrderingKind::LessEq, attribute.as_str(), value.as_str()))
        }
        _ => Err(wrong_node("ordering", node)),
    }
}

fn ordering_rule(at: &AttributeType) -> Result<&MatchingRule> {
    at.ordering().ok_or_else(|| {
        Error::IllegalState(format!(
            "attribute '{}' has no ordering matching rule",
            at.name()
        ))
    })
}

pub struct OrderingEvaluator<'a> {
    node: &'a ExprNode,
    partition: &'a Partition,
    attribute: &'a AttributeType,
    rule: &'a MatchingRule,
    index: Option<&'a Index<String>>,
    kind: OrderingKind,
    assertion: String,
}

impl<'a> OrderingEvaluator<'a> {
    /// Fails with `IllegalState` when the attribute has no ordering rule.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let (kind, attribute, value) = parts(node)?;
        let at = partition.schema().lookup(attribute)?;
        let rule = ordering_rule(at)?;
        Ok(Self {
            node,
            partition,
            attribute: at,
            rule,
            index: partition.user_index(at),
            kind,
            assertion: rule.normalize(value)?,
        })
    }

    pub fn kind(&self) -> OrderingKind {
        self.kind
    }
}

impl Evaluator for OrderingEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        let values = candidate_values(self.partition, self.attribute, self.index, candidate)?;
        Ok(values.iter().any(|value| {
            normalized(self.rule, value)
                .is_some_and(|n| self.kind.admits(self.rule.compare(&n, &self.assertion)))
        }))
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Bounds of an ordering cursor in index space.
struct Boundary<'a> {
    index: &'a Index<String>,
    kind: OrderingKind,
    value: String,
}

impl Boundary<'_> {
    fn contains(&self, value: &str) -> bool {
        self.kind.admits(value.cmp(self.value.as_str()))
    }

    /// Keep an element only at the smallest in-range value of its entry.
    fn accepts(&self, element: &IndexEntry) -> Result<bool> {
        let Some(value) = element.value() else {
            return Ok(false);
        };
        let first = self
            .index
            .first_value_where(element.id(), |v| Ok(self.contains(v)))?;
        Ok(first.as_deref() == Some(value.as_str()))
    }
}

/// Walks the index from the boundary up (`>=`) or from the start up to the
/// boundary (`<=`), in ascending value order.
///
/// `before`/`after` take an index-form value and are clamped to the range.
pub struct OrderingCursor<'a> {
    inner: IndexCursor<'a, ForwardKey<String>>,
    boundary: Boundary<'a>,
}

impl<'a> OrderingCursor<'a> {
    /// Fails with `IllegalState` without an ordering rule and with
    /// `IllegalArgument` without an index.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let (kind, attribute, value) = parts(node)?;
        let at = partition.schema().lookup(attribute)?;
        ordering_rule(at)?;
        let index = partition.user_index(at).ok_or_else(|| missing_index(at))?;

        let value = at.index_form(value)?;
        let inner = match kind {
            OrderingKind::GreaterEq => {
                index.forward_range(Bound::Included(&value), Bound::Unbounded)
            }
            OrderingKind::LessEq => index.forward_range(Bound::Unbounded, Bound::Included(&value)),
        };
        Ok(Self {
            inner,
            boundary: Boundary { index, kind, value },
        })
    }

    pub fn kind(&self) -> OrderingKind {
        self.boundary.kind
    }
}

impl Cursor for OrderingCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        self.inner.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.inner.after_last()
    }

    fn next(&mut self) -> Result<bool> {
        let boundary = &self.boundary;
        seek_matching(&mut self.inner, Direction::Forward, |e| boundary.accepts(e))
    }

    fn previous(&mut self) -> Result<bool> {
        let boundary = &self.boundary;
        seek_matching(&mut self.inner, Direction::Backward, |e| boundary.accepts(e))
    }

    fn before(&mut self, element: &IndexEntry) -> Result<()> {
        self.inner.before(element)
    }

    fn after(&mut self, element: &IndexEntry) -> Result<()> {
        self.inner.after(element)
    }

    fn state(&self) -> CursorState {
        self.inner.state()
    }

    fn get(&self) -> Result<&IndexEntry> {
        self.inner.get()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
