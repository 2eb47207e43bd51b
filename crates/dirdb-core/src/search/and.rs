//! Conjunction.

use dirdb_proto::ExprNode;

use super::cursor::{seek_matching, Direction, SearchCursor};
use super::evaluator::{all_match, Evaluator, FilterEvaluator};
use crate::cursor::{Cursor, CursorState, IndexEntry};
use crate::error::{Error, Result};

/// Matches when every child matches. An empty conjunction matches
/// everything.
pub struct AndEvaluator<'a> {
    node: &'a ExprNode,
    children: Vec<FilterEvaluator<'a>>,
}

impl<'a> AndEvaluator<'a> {
    pub fn new(node: &'a ExprNode, children: Vec<FilterEvaluator<'a>>) -> Self {
        Self { node, children }
    }

    pub fn children(&self) -> &[FilterEvaluator<'a>] {
        &self.children
    }
}

impl Evaluator for AndEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        all_match(&self.children, candidate)
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Walks a driving cursor and keeps the elements every other child's
/// evaluator accepts.
///
/// Positioning and seeks go to the driving cursor, so the And cursor is as
/// seekable as its driving cursor.
pub struct AndCursor<'a> {
    node: &'a ExprNode,
    driving: Box<SearchCursor<'a>>,
    others: Vec<FilterEvaluator<'a>>,
}

impl<'a> AndCursor<'a> {
    /// Fails with `IllegalArgument` when there is nothing to check the
    /// driving cursor against.
    pub fn new(
        node: &'a ExprNode,
        driving: SearchCursor<'a>,
        others: Vec<FilterEvaluator<'a>>,
    ) -> Result<Self> {
        if others.is_empty() {
            return Err(Error::IllegalArgument(
                "an And cursor needs at least one evaluator besides its driving cursor".into(),
            ));
        }
        Ok(Self {
            node,
            driving: Box::new(driving),
            others,
        })
    }

    pub fn expression(&self) -> &'a ExprNode {
        self.node
    }

    fn walk(&mut self, direction: Direction) -> Result<bool> {
        let others = &self.others;
        seek_matching(self.driving.as_mut(), direction, |e| all_match(others, e))
    }
}

impl Cursor for AndCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        self.driving.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.driving.after_last()
    }

    fn next(&mut self) -> Result<bool> {
        self.walk(Direction::Forward)
    }

    fn previous(&mut self) -> Result<bool> {
        self.walk(Direction::Backward)
    }

    fn before(&mut self, element: &IndexEntry) -> Result<()> {
        self.driving.before(element)
    }

    fn after(&mut self, element: &IndexEntry) -> Result<()> {
        self.driving.after(element)
    }

    fn state(&self) -> CursorState {
        self.driving.state()
    }

    fn get(&self) -> Result<&IndexEntry> {
        self.driving.get()
    }

    fn close(&mut self) -> Result<()> {
        self.driving.close()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirdb_proto::Entry;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::search::leaf::OrderingCursor;
    use crate::search::EvaluatorBuilder;
    use crate::storage::Partition;

    fn partition() -> Partition {
        let p = Partition::memory(Arc::new(SchemaRegistry::core()), ["postalCode", "cn"]).unwrap();
        let people = [
            ("Jack Daniels", "1"),
            ("Johnny Walker", "3"),
            ("Jim Bean", "4"),
            ("Tony Soprano", "5"),
            ("Jane", "6"),
        ];
        for (cn, code) in people {
            p.add(
                None,
                Entry::new(format!("cn={}", cn))
                    .with("cn", [cn])
                    .with("postalCode", [code]),
            )
            .unwrap();
        }
        p
    }

    #[test]
    fn test_and_cursor_is_symmetric() {
        let p = partition();
        let driving_node = ExprNode::ge("postalCode", "3");
        let other = ExprNode::starts_with("cn", "j");
        let node = ExprNode::and(vec![driving_node.clone(), other.clone()]);

        let driving = OrderingCursor::new(&driving_node, &p).unwrap();
        let evaluator = EvaluatorBuilder::new(&p).build(&other).unwrap();
        let mut cursor =
            AndCursor::new(&node, SearchCursor::Ordering(driving), vec![evaluator]).unwrap();

        let forward: Vec<_> = cursor.ids().collect::<Result<_>>().unwrap();
        assert_eq!(forward, vec![2, 3, 5]);

        let mut backward = Vec::new();
        while cursor.previous().unwrap() {
            backward.push(cursor.get().unwrap().id());
        }
        assert_eq!(backward, vec![5, 3, 2]);
    }

    #[test]
    fn test_seeks_delegate_to_driving_cursor() {
        let p = partition();
        let driving_node = ExprNode::ge("postalCode", "1");
        let other = ExprNode::starts_with("cn", "j");
        let node = ExprNode::and(vec![driving_node.clone(), other.clone()]);
        let driving = OrderingCursor::new(&driving_node, &p).unwrap();
        let evaluator = EvaluatorBuilder::new(&p).build(&other).unwrap();
        let mut cursor =
            AndCursor::new(&node, SearchCursor::Ordering(driving), vec![evaluator]).unwrap();

        // Tony, at postal code 5, is rejected by the evaluator.
        cursor.after(&IndexEntry::new(0, "4".to_string())).unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get().unwrap().id(), 5);

        cursor.before(&IndexEntry::new(0, "5".to_string())).unwrap();
        assert!(cursor.previous().unwrap());
        assert_eq!(cursor.get().unwrap().id(), 3);
    }

    #[test]
    fn test_requires_an_evaluator() {
        let p = partition();
        let driving_node = ExprNode::ge("postalCode", "1");
        let node = ExprNode::and(vec![driving_node.clone()]);
        let driving = OrderingCursor::new(&driving_node, &p).unwrap();
        assert!(matches!(
            AndCursor::new(&node, SearchCursor::Ordering(driving), Vec::new()),
            Err(Error::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_and_evaluator() {
        let p = partition();
        let node = ExprNode::and(vec![
            ExprNode::le("postalCode", "4"),
            ExprNode::starts_with("cn", "j"),
        ]);
        let evaluator = EvaluatorBuilder::new(&p).build(&node).unwrap();
        let ids: Vec<u64> = (1..=5)
            .filter(|&id| evaluator.matches(&IndexEntry::reference(id)).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let empty = ExprNode::and(vec![]);
        let evaluator = EvaluatorBuilder::new(&p).build(&empty).unwrap();
        assert!(evaluator.matches(&IndexEntry::reference(4)).unwrap());
    }
}
