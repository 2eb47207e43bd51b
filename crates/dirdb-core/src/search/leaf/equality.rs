//! Equality assertions: `(attr=value)`.

use std::cmp::Ordering;

use dirdb_proto::ExprNode;

use super::{candidate_values, missing_index, normalized, wrong_node};
use crate::cursor::{Cursor, CursorState, IndexCursor, IndexEntry};
use crate::error::{Error, Result};
use crate::schema::{AttributeType, MatchingRule};
use crate::search::evaluator::Evaluator;
use crate::storage::{ForwardKey, Index, Partition};

fn parts(node: &ExprNode) -> Result<(&str, &str)> {
    match node {
        ExprNode::Equality { attribute, value } => Ok((attribute.as_str(), value.as_str())),
        _ => Err(wrong_node("equality", node)),
    }
}

fn equality_rule(at: &AttributeType) -> Result<&MatchingRule> {
    at.equality().ok_or_else(|| {
        Error::IllegalState(format!(
            "attribute '{}' has no equality matching rule",
            at.name()
        ))
    })
}

pub struct EqualityEvaluator<'a> {
    node: &'a ExprNode,
    partition: &'a Partition,
    attribute: &'a AttributeType,
    rule: &'a MatchingRule,
    index: Option<&'a Index<String>>,
    assertion: String,
}

impl<'a> EqualityEvaluator<'a> {
    /// Fails with `IllegalState` when the attribute has no equality rule.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let (attribute, value) = parts(node)?;
        let at = partition.schema().lookup(attribute)?;
        let rule = equality_rule(at)?;
        Ok(Self {
            node,
            partition,
            attribute: at,
            rule,
            index: partition.user_index(at),
            assertion: rule.normalize(value)?,
        })
    }
}

impl Evaluator for EqualityEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        // The index stores values in equality form already.
        if let Some(index) = self.index {
            return index.has(&self.assertion, candidate.id());
        }
        let values = candidate_values(self.partition, self.attribute, None, candidate)?;
        Ok(values.iter().any(|value| {
            normalized(self.rule, value)
                .is_some_and(|n| self.rule.compare(&n, &self.assertion) == Ordering::Equal)
        }))
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Walks the index entries of one value, in id order.
pub struct EqualityCursor<'a> {
    inner: IndexCursor<'a, ForwardKey<String>>,
}

impl<'a> EqualityCursor<'a> {
    /// Fails with `IllegalState` without an equality rule and with
    /// `IllegalArgument` without an index.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let (attribute, value) = parts(node)?;
        let at = partition.schema().lookup(attribute)?;
        let rule = equality_rule(at)?;
        let index = partition.user_index(at).ok_or_else(|| missing_index(at))?;
        Ok(Self {
            inner: index.forward_cursor_for(&rule.normalize(value)?),
        })
    }
}

impl Cursor for EqualityCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        self.inner.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.inner.after_last()
    }

    fn next(&mut self) -> Result<bool> {
        self.inner.next()
    }

    fn previous(&mut self) -> Result<bool> {
        self.inner.previous()
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirdb_proto::Entry;

    use super::*;
    use crate::schema::SchemaRegistry;

    fn partition(indexed: &[&str]) -> Partition {
        let partition =
            Partition::memory(Arc::new(SchemaRegistry::core()), indexed.iter().copied()).unwrap();
        partition.add(None, Entry::new("ou=Sales").with("ou", ["Sales"])).unwrap();
        partition.add(None, Entry::new("ou=Engineering").with("ou", ["Engineering"])).unwrap();
        partition
            .add(None, Entry::new("ou=Board").with("ou", ["Board of  Directors", "sales"]))
            .unwrap();
        partition
    }

    #[test]
    fn test_evaluator() {
        for indexed in [&["ou"][..], &[][..]] {
            let partition = partition(indexed);
            let node = ExprNode::eq("ou", " SALES ");
            let evaluator = EqualityEvaluator::new(&node, &partition).unwrap();
            let ids: Vec<u64> = (1..=3)
                .filter(|&id| evaluator.matches(&IndexEntry::reference(id)).unwrap())
                .collect();
            assert_eq!(ids, vec![1, 3]);

            let node = ExprNode::eq("ou", "board of directors");
            let evaluator = EqualityEvaluator::new(&node, &partition).unwrap();
            assert!(evaluator.matches(&IndexEntry::reference(3)).unwrap());
        }
    }

    #[test]
    fn test_cursor() {
        let partition = partition(&["ou"]);
        let node = ExprNode::eq("ou", "sales");
        let mut cursor = EqualityCursor::new(&node, &partition).unwrap();
        let ids: Vec<_> = cursor.ids().collect::<Result<_>>().unwrap();
        assert_eq!(ids, vec![1, 3]);
        assert!(cursor.last().unwrap());
        assert_eq!(cursor.get().unwrap().id(), 3);
        assert_eq!(cursor.get().unwrap().value().unwrap(), "sales");
    }

    #[test]
    fn test_preconditions() {
        let partition = partition(&[]);
        let node = ExprNode::eq("ou", "sales");
        assert!(matches!(
            EqualityCursor::new(&node, &partition),
            Err(Error::IllegalArgument(_))
        ));
        let node = ExprNode::present("ou");
        assert!(matches!(
            EqualityEvaluator::new(&node, &partition),
            Err(Error::IllegalState(_))
        ));
    }
}
