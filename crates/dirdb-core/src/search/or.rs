//! Disjunction.

use std::collections::HashSet;

use tracing::debug;

use dirdb_proto::{EntryId, ExprNode};

use super::cursor::{Direction, SearchCursor};
use super::evaluator::{any_match, Evaluator, FilterEvaluator};
use crate::cursor::{ensure_open, Cursor, CursorState, IndexEntry};
use crate::error::{Error, Result};

/// Matches when any child matches. An empty disjunction matches nothing.
pub struct OrEvaluator<'a> {
    node: &'a ExprNode,
    children: Vec<FilterEvaluator<'a>>,
}

impl<'a> OrEvaluator<'a> {
    pub fn new(node: &'a ExprNode, children: Vec<FilterEvaluator<'a>>) -> Self {
        Self { node, children }
    }

    pub fn children(&self) -> &[FilterEvaluator<'a>] {
        &self.children
    }
}

impl Evaluator for OrEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        any_match(&self.children, candidate)
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// One uninterrupted walk in one direction.
#[derive(Debug, Clone, Copy)]
struct Traversal {
    direction: Direction,
    /// Branch the walk started in.
    start: usize,
    /// Whether the walk started in the middle of `start`.
    partial: bool,
}

/// Concatenates its branches, dropping ids already emitted.
///
/// Forward walks visit branch 0 to n-1, backward walks visit n-1 to 0, each
/// branch in its own order. A backward walk is therefore not the reverse of
/// a forward walk when branches overlap.
///
/// Every walk in one direction (started by `before_first`, `after_last`,
/// `first`, `last` or by turning around) remembers the ids it emitted. Once
/// `seen_limit` ids are remembered, later candidates are checked against
/// the evaluators of the branches the walk already walked in full instead.
/// A walk that starts in the middle of a branch only covers part of it, so
/// the ids it emits from that branch are always remembered and its
/// evaluator is never consulted.
pub struct OrCursor<'a> {
    node: &'a ExprNode,
    branches: Vec<SearchCursor<'a>>,
    evaluators: Vec<FilterEvaluator<'a>>,
    current: usize,
    traversal: Traversal,
    seen: HashSet<EntryId>,
    /// Ids emitted from a partially walked start branch. Not bounded.
    start_seen: HashSet<EntryId>,
    seen_limit: usize,
    overflowed: bool,
    state: CursorState,
}

impl<'a> OrCursor<'a> {
    /// Fails with `IllegalArgument` for fewer than two branches or when
    /// every branch does not have exactly one evaluator.
    pub fn new(
        node: &'a ExprNode,
        branches: Vec<SearchCursor<'a>>,
        evaluators: Vec<FilterEvaluator<'a>>,
        seen_limit: usize,
    ) -> Result<Self> {
        if branches.len() < 2 {
            return Err(Error::IllegalArgument(format!(
                "an Or cursor needs at least two branches, got {}",
                branches.len()
            )));
        }
        if branches.len() != evaluators.len() {
            return Err(Error::IllegalArgument(format!(
                "{} Or branches but {} evaluators",
                branches.len(),
                evaluators.len()
            )));
        }
        Ok(Self {
            node,
            branches,
            evaluators,
            current: 0,
            traversal: Traversal {
                direction: Direction::Forward,
                start: 0,
                partial: false,
            },
            seen: HashSet::new(),
            start_seen: HashSet::new(),
            seen_limit,
            overflowed: false,
            state: CursorState::BeforeFirst,
        })
    }

    pub fn expression(&self) -> &'a ExprNode {
        self.node
    }

    fn last_branch(&self) -> usize {
        self.branches.len() - 1
    }

    /// Start a new walk from the current branch.
    fn begin(&mut self, direction: Direction) -> Result<()> {
        let keep = if self.state == CursorState::OnElement {
            Some(self.branches[self.current].get()?.id())
        } else {
            None
        };
        self.traversal = Traversal {
            direction,
            start: self.current,
            partial: keep.is_some(),
        };
        self.seen.clear();
        self.start_seen.clear();
        self.overflowed = false;
        if let Some(id) = keep {
            self.remember(self.current, id);
        }
        Ok(())
    }

    fn remember(&mut self, branch: usize, id: EntryId) {
        let Traversal { start, partial, .. } = self.traversal;
        if partial && branch == start {
            self.start_seen.insert(id);
        } else if self.seen.len() < self.seen_limit {
            self.seen.insert(id);
        } else if !self.overflowed {
            debug!(limit = self.seen_limit, "or cursor seen set full");
            self.overflowed = true;
        }
    }

    /// Whether the element under branch `branch` was already emitted in
    /// this walk.
    fn already_emitted(&self, branch: usize) -> Result<bool> {
        let candidate = self.branches[branch].get()?;
        let id = candidate.id();
        if self.seen.contains(&id) || self.start_seen.contains(&id) {
            return Ok(true);
        }
        if !self.overflowed {
            return Ok(false);
        }
        // Only fully walked branches can vouch for a candidate.
        let Traversal {
            direction,
            start,
            partial,
        } = self.traversal;
        let skip = usize::from(partial);
        let (from, to) = match direction {
            Direction::Forward => (start + skip, branch),
            Direction::Backward => (branch + 1, start + 1 - skip),
        };
        if from >= to {
            return Ok(false);
        }
        for evaluator in &self.evaluators[from..to] {
            if evaluator.matches(candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn walk(&mut self, direction: Direction) -> Result<bool> {
        ensure_open(self.state)?;
        let exhausted = match direction {
            Direction::Forward => CursorState::AfterLast,
            Direction::Backward => CursorState::BeforeFirst,
        };
        if self.state == exhausted {
            return Ok(false);
        }
        if self.traversal.direction != direction {
            self.begin(direction)?;
        }

        loop {
            if direction.step(&mut self.branches[self.current])? {
                if self.already_emitted(self.current)? {
                    continue;
                }
                let id = self.branches[self.current].get()?.id();
                self.remember(self.current, id);
                self.state = CursorState::OnElement;
                return Ok(true);
            }

            let next_branch = match direction {
                Direction::Forward if self.current < self.last_branch() => self.current + 1,
                Direction::Backward if self.current > 0 => self.current - 1,
                _ => {
                    self.state = exhausted;
                    return Ok(false);
                }
            };
            self.current = next_branch;
            match direction {
                Direction::Forward => self.branches[next_branch].before_first()?,
                Direction::Backward => self.branches[next_branch].after_last()?,
            }
        }
    }
}

impl Cursor for OrCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        ensure_open(self.state)?;
        for branch in &mut self.branches {
            branch.before_first()?;
        }
        self.current = 0;
        self.state = CursorState::BeforeFirst;
        self.begin(Direction::Forward)
    }

    fn after_last(&mut self) -> Result<()> {
        ensure_open(self.state)?;
        for branch in &mut self.branches {
            branch.after_last()?;
        }
        self.current = self.last_branch();
        self.state = CursorState::AfterLast;
        self.begin(Direction::Backward)
    }

    fn next(&mut self) -> Result<bool> {
        self.walk(Direction::Forward)
    }

    fn previous(&mut self) -> Result<bool> {
        self.walk(Direction::Backward)
    }

    fn before(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.state)?;
        Err(Error::unsupported("or cursors have no single value order"))
    }

    fn after(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.state)?;
        Err(Error::unsupported("or cursors have no single value order"))
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn get(&self) -> Result<&IndexEntry> {
        match self.state {
            CursorState::OnElement => self.branches[self.current].get(),
            CursorState::Closed => Err(Error::CursorClosed),
            _ => Err(Error::InvalidCursorPosition),
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.state == CursorState::Closed {
            return Ok(());
        }
        self.state = CursorState::Closed;
        let mut first_error = None;
        for branch in &mut self.branches {
            if let Err(e) = branch.close() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirdb_proto::Entry;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::search::leaf::{EqualityCursor, SubstringCursor};
    use crate::search::EvaluatorBuilder;
    use crate::storage::Partition;

    fn partition() -> Partition {
        let p = Partition::memory(Arc::new(SchemaRegistry::core()), ["cn", "sn", "ou"]).unwrap();
        let people = [
            ("Tony", "Soprano", "Sales"),     // 1
            ("Johnny", "Walker", "Sales"),    // 2
            ("Jim", "Bean", "Engineering"),   // 3
            ("Jack", "Daniels", "Sales"),     // 4
            ("Amy", "Winehouse", "Music"),    // 5
        ];
        for (cn, sn, ou) in people {
            p.add(
                None,
                Entry::new(format!("cn={}", cn))
                    .with("cn", [cn])
                    .with("sn", [sn])
                    .with("ou", [ou]),
            )
            .unwrap();
        }
        p
    }

    fn or_cursor<'a>(
        p: &'a Partition,
        node: &'a ExprNode,
        seen_limit: usize,
    ) -> OrCursor<'a> {
        let builder = EvaluatorBuilder::new(p);
        let mut branches = Vec::new();
        let mut evaluators = Vec::new();
        for child in node.children() {
            let cursor = match child {
                ExprNode::Substring(_) => {
                    SearchCursor::Substring(SubstringCursor::new(child, p).unwrap())
                }
                _ => SearchCursor::Equality(EqualityCursor::new(child, p).unwrap()),
            };
            branches.push(cursor);
            evaluators.push(builder.build(child).unwrap());
        }
        OrCursor::new(node, branches, evaluators, seen_limit).unwrap()
    }

    fn forward(cursor: &mut OrCursor<'_>) -> Vec<u64> {
        cursor.before_first().unwrap();
        cursor.ids().collect::<Result<_>>().unwrap()
    }

    fn backward(cursor: &mut OrCursor<'_>) -> Vec<u64> {
        cursor.after_last().unwrap();
        let mut ids = Vec::new();
        while cursor.previous().unwrap() {
            ids.push(cursor.get().unwrap().id());
        }
        ids
    }

    fn overlapping() -> ExprNode {
        ExprNode::or(vec![
            ExprNode::eq("ou", "sales"),
            ExprNode::starts_with("cn", "j"),
        ])
    }

    #[test]
    fn test_branch_sequential_without_duplicates() {
        let p = partition();
        let node = overlapping();
        let mut cursor = or_cursor(&p, &node, 1024);
        assert_eq!(forward(&mut cursor), vec![1, 2, 4, 3]);
        // Branch 1 walks johnny, jim, jack backward before branch 0 runs.
        assert_eq!(backward(&mut cursor), vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_bounded_seen_set_falls_back_to_evaluators() {
        let p = partition();
        let node = overlapping();
        for limit in [0, 1, 2] {
            let mut cursor = or_cursor(&p, &node, limit);
            assert_eq!(forward(&mut cursor), vec![1, 2, 4, 3]);
            assert_eq!(backward(&mut cursor), vec![2, 3, 4, 1]);
        }
    }

    #[test]
    fn test_turning_around_starts_a_new_walk() {
        let p = partition();
        let node = overlapping();
        let mut cursor = or_cursor(&p, &node, 1024);
        cursor.before_first().unwrap();
        for _ in 0..4 {
            assert!(cursor.next().unwrap());
        }
        assert_eq!(cursor.get().unwrap().id(), 3);
        // Walking back through branch 1 re-emits ids branch 0 produced.
        assert!(cursor.previous().unwrap());
        assert_eq!(cursor.get().unwrap().id(), 4);
        assert!(cursor.previous().unwrap());
        assert_eq!(cursor.get().unwrap().id(), 2);
    }

    /// Replays `moves` (`n` for next, `p` for previous) after `before_first`.
    fn trace(cursor: &mut OrCursor<'_>, moves: &str) -> Vec<Option<u64>> {
        cursor.before_first().unwrap();
        moves
            .chars()
            .map(|m| {
                let moved = match m {
                    'n' => cursor.next().unwrap(),
                    _ => cursor.previous().unwrap(),
                };
                moved.then(|| cursor.get().unwrap().id())
            })
            .collect()
    }

    #[test]
    fn test_turning_around_mid_branch_keeps_candidates() {
        let p = Partition::memory(Arc::new(SchemaRegistry::core()), ["cn", "sn"]).unwrap();
        p.add(None, Entry::new("cn=Jack").with("cn", ["Jack"]).with("sn", ["Wz"]))
            .unwrap();
        p.add(None, Entry::new("cn=Bob").with("cn", ["Bob"]).with("sn", ["Wa"]))
            .unwrap();
        let node = ExprNode::or(vec![
            ExprNode::starts_with("cn", "j"),
            ExprNode::starts_with("sn", "w"),
        ]);
        for limit in [0, 1024] {
            let mut cursor = or_cursor(&p, &node, limit);
            assert_eq!(
                trace(&mut cursor, "nnpp"),
                vec![Some(1), Some(2), Some(1), None],
                "seen limit {}",
                limit
            );
        }
    }

    #[test]
    fn test_turnaround_output_is_independent_of_seen_limit() {
        let p = partition();
        let node = overlapping();
        for moves in ["nnnppppnnnnn", "nnnnpppp", "nnnnnpppppnn", "nnpnnpnn"] {
            let mut unbounded = or_cursor(&p, &node, 1024);
            let expected = trace(&mut unbounded, moves);
            for limit in [0, 1, 2] {
                let mut bounded = or_cursor(&p, &node, limit);
                assert_eq!(
                    trace(&mut bounded, moves),
                    expected,
                    "moves {} with seen limit {}",
                    moves,
                    limit
                );
            }
        }
        let mut cursor = or_cursor(&p, &node, 0);
        assert_eq!(
            trace(&mut cursor, "nnnnppp"),
            vec![Some(1), Some(2), Some(4), Some(3), Some(4), Some(2), Some(1)]
        );
    }

    #[test]
    fn test_exhaustion_is_sticky() {
        let p = partition();
        let node = overlapping();
        let mut cursor = or_cursor(&p, &node, 1024);
        assert_eq!(forward(&mut cursor).len(), 4);
        assert!(!cursor.next().unwrap());
        assert_eq!(cursor.state(), CursorState::AfterLast);
        assert!(matches!(cursor.get(), Err(Error::InvalidCursorPosition)));

        cursor.before_first().unwrap();
        assert!(!cursor.previous().unwrap());
        assert_eq!(cursor.state(), CursorState::BeforeFirst);
        assert!(cursor.first().unwrap());
        assert_eq!(cursor.get().unwrap().id(), 1);
        assert!(cursor.last().unwrap());
        assert_eq!(cursor.get().unwrap().id(), 2);
    }

    #[test]
    fn test_construction_errors() {
        let p = partition();
        let node = ExprNode::or(vec![ExprNode::eq("ou", "sales")]);
        let only = SearchCursor::Equality(EqualityCursor::new(&node.children()[0], &p).unwrap());
        assert!(matches!(
            OrCursor::new(&node, vec![only], Vec::new(), 16),
            Err(Error::IllegalArgument(_))
        ));

        let node = overlapping();
        let builder = EvaluatorBuilder::new(&p);
        let branches = vec![
            SearchCursor::Equality(EqualityCursor::new(&node.children()[0], &p).unwrap()),
            SearchCursor::Substring(SubstringCursor::new(&node.children()[1], &p).unwrap()),
        ];
        let evaluators = vec![builder.build(&node.children()[0]).unwrap()];
        assert!(matches!(
            OrCursor::new(&node, branches, evaluators, 16),
            Err(Error::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_seek_and_close() {
        let p = partition();
        let node = overlapping();
        let mut cursor = or_cursor(&p, &node, 16);
        assert!(matches!(
            cursor.before(&IndexEntry::new(0, "sales".to_string())),
            Err(Error::UnsupportedOperation(_))
        ));
        cursor.close().unwrap();
        cursor.close().unwrap();
        assert!(cursor.branches.iter().all(|b| b.is_closed()));
        assert!(matches!(cursor.next(), Err(Error::CursorClosed)));
    }

    #[test]
    fn test_or_evaluator() {
        let p = partition();
        let node = overlapping();
        let evaluator = EvaluatorBuilder::new(&p).build(&node).unwrap();
        let ids: Vec<u64> = (1..=5)
            .filter(|&id| evaluator.matches(&IndexEntry::reference(id)).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let empty = ExprNode::or(vec![]);
        let evaluator = EvaluatorBuilder::new(&p).build(&empty).unwrap();
        assert!(!evaluator.matches(&IndexEntry::reference(1)).unwrap());
    }
}
