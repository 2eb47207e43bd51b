//! Negation.

use dirdb_proto::ExprNode;

use super::cursor::{seek_matching, Direction, SearchCursor};
use super::evaluator::{Evaluator, FilterEvaluator};
use crate::cursor::{ensure_open, Cursor, CursorState, IndexEntry};
use crate::error::{Error, Result};

pub struct NotEvaluator<'a> {
    node: &'a ExprNode,
    child: Box<FilterEvaluator<'a>>,
}

impl<'a> NotEvaluator<'a> {
    pub fn new(node: &'a ExprNode, child: FilterEvaluator<'a>) -> Self {
        Self {
            node,
            child: Box::new(child),
        }
    }

    pub fn child(&self) -> &FilterEvaluator<'a> {
        &self.child
    }
}

impl Evaluator for NotEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        Ok(!self.child.matches(candidate)?)
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Walks a universe cursor and keeps the candidates the negated evaluator
/// rejects.
pub struct NotCursor<'a> {
    node: &'a ExprNode,
    universe: Box<SearchCursor<'a>>,
    negated: FilterEvaluator<'a>,
}

impl<'a> NotCursor<'a> {
    pub fn new(node: &'a ExprNode, universe: SearchCursor<'a>, negated: FilterEvaluator<'a>) -> Self {
        Self {
            node,
            universe: Box::new(universe),
            negated,
        }
    }

    pub fn expression(&self) -> &'a ExprNode {
        self.node
    }

    fn walk(&mut self, direction: Direction) -> Result<bool> {
        let negated = &self.negated;
        seek_matching(self.universe.as_mut(), direction, |e| {
            Ok(!negated.matches(e)?)
        })
    }
}

impl Cursor for NotCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        self.universe.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.universe.after_last()
    }

    fn next(&mut self) -> Result<bool> {
        self.walk(Direction::Forward)
    }

    fn previous(&mut self) -> Result<bool> {
        self.walk(Direction::Backward)
    }

    fn before(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.state())?;
        Err(Error::unsupported("not cursors cannot seek"))
    }

    fn after(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.state())?;
        Err(Error::unsupported("not cursors cannot seek"))
    }

    fn state(&self) -> CursorState {
        self.universe.state()
    }

    fn get(&self) -> Result<&IndexEntry> {
        self.universe.get()
    }

    fn close(&mut self) -> Result<()> {
        self.universe.close()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirdb_proto::Entry;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::search::cursor::ScanCursor;
    use crate::search::EvaluatorBuilder;
    use crate::storage::Partition;

    fn partition() -> Partition {
        let p = Partition::memory(Arc::new(SchemaRegistry::core()), ["cn"]).unwrap();
        for cn in ["Jack", "Tony", "Jim", "Amy", "Joe"] {
            p.add(None, Entry::new(format!("cn={}", cn)).with("cn", [cn]))
                .unwrap();
        }
        p
    }

    #[test]
    fn test_not_cursor_is_symmetric() {
        let p = partition();
        let node = ExprNode::not(ExprNode::starts_with("cn", "j"));
        let negated = EvaluatorBuilder::new(&p).build(&node.children()[0]).unwrap();
        let mut cursor = NotCursor::new(&node, SearchCursor::Scan(ScanCursor::new(&p)), negated);

        let forward: Vec<_> = cursor.ids().collect::<Result<_>>().unwrap();
        assert_eq!(forward, vec![2, 4]);
        assert_eq!(cursor.state(), CursorState::AfterLast);

        let mut backward = Vec::new();
        while cursor.previous().unwrap() {
            backward.push(cursor.get().unwrap().id());
        }
        assert_eq!(backward, vec![4, 2]);
        assert_eq!(cursor.state(), CursorState::BeforeFirst);
    }

    #[test]
    fn test_not_cursor_cannot_seek_and_closes_universe() {
        let p = partition();
        let node = ExprNode::not(ExprNode::eq("cn", "tony"));
        let negated = EvaluatorBuilder::new(&p).build(&node.children()[0]).unwrap();
        let mut cursor = NotCursor::new(&node, SearchCursor::Scan(ScanCursor::new(&p)), negated);
        assert!(matches!(
            cursor.after(&IndexEntry::reference(1)),
            Err(Error::UnsupportedOperation(_))
        ));
        cursor.close().unwrap();
        cursor.close().unwrap();
        assert!(cursor.universe.is_closed());
        assert!(matches!(
            cursor.after(&IndexEntry::reference(1)),
            Err(Error::CursorClosed)
        ));
    }

    #[test]
    fn test_not_evaluator() {
        let p = partition();
        let node = ExprNode::not(ExprNode::eq("cn", "JIM"));
        let evaluator = EvaluatorBuilder::new(&p).build(&node).unwrap();
        let ids: Vec<u64> = (1..=5)
            .filter(|&id| evaluator.matches(&IndexEntry::reference(id)).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 4, 5]);
    }
}
