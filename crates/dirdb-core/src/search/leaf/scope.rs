//! Scope restrictions: base object, one level and subtree.
//!
//! When the node dereferences aliases while searching, alias entries inside
//! the scope are dropped. Their targets are not substituted; resolving them
//! is the caller's job.

use dirdb_proto::{EntryId, ExprNode, ScopeNode, SearchScope};

use super::wrong_node;
use crate::cursor::{ensure_open, Cursor, CursorState, IndexCursor, IndexEntry};
use crate::error::{Error, Result};
use crate::search::cursor::Direction;
use crate::search::evaluator::Evaluator;
use crate::storage::{ForwardKey, Index, Partition};

fn scope_node(node: &ExprNode, expected: SearchScope) -> Result<&ScopeNode> {
    match node {
        ExprNode::Scope(scope) if scope.scope == expected => Ok(scope),
        ExprNode::Scope(scope) => Err(Error::IllegalState(format!(
            "expected a {:?} scope node, got {:?}",
            expected, scope.scope
        ))),
        _ => Err(wrong_node("scope", node)),
    }
}

/// Accepts only the base entry.
pub struct ObjectScopeEvaluator<'a> {
    node: &'a ExprNode,
    base: EntryId,
}

impl<'a> ObjectScopeEvaluator<'a> {
    pub fn new(node: &'a ExprNode, _partition: &'a Partition) -> Result<Self> {
        let scope = scope_node(node, SearchScope::Object)?;
        Ok(Self {
            node,
            base: scope.base,
        })
    }
}

impl Evaluator for ObjectScopeEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        Ok(candidate.id() == self.base)
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Shared check of the one-level and subtree evaluators.
struct Membership<'a> {
    partition: &'a Partition,
    index: &'a Index<EntryId>,
    base: EntryId,
    skip_aliases: bool,
}

impl<'a> Membership<'a> {
    fn new(partition: &'a Partition, index: &'a Index<EntryId>, scope: &ScopeNode) -> Self {
        Self {
            partition,
            index,
            base: scope.base,
            skip_aliases: scope.deref.derefs_in_searching(),
        }
    }

    fn contains(&self, id: EntryId) -> Result<bool> {
        if self.skip_aliases && self.partition.is_alias(id)? {
            return Ok(false);
        }
        self.index.has(&self.base, id)
    }
}

/// Accepts the immediate children of the base.
pub struct OneLevelScopeEvaluator<'a> {
    node: &'a ExprNode,
    membership: Membership<'a>,
}

impl<'a> OneLevelScopeEvaluator<'a> {
    /// Fails with `IllegalState` unless the node is a one-level scope.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let scope = scope_node(node, SearchScope::OneLevel)?;
        Ok(Self {
            node,
            membership: Membership::new(partition, partition.one_level_index(), scope),
        })
    }
}

impl Evaluator for OneLevelScopeEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        self.membership.contains(candidate.id())
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Accepts the base and all its descendants.
pub struct SubtreeScopeEvaluator<'a> {
    node: &'a ExprNode,
    membership: Membership<'a>,
}

impl<'a> SubtreeScopeEvaluator<'a> {
    /// Fails with `IllegalState` unless the node is a subtree scope.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let scope = scope_node(node, SearchScope::Subtree)?;
        Ok(Self {
            node,
            membership: Membership::new(partition, partition.sub_level_index(), scope),
        })
    }
}

impl Evaluator for SubtreeScopeEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        self.membership.contains(candidate.id())
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Walks the entries inside a scope in id order.
pub struct ScopeCursor<'a> {
    partition: &'a Partition,
    scope: SearchScope,
    skip_aliases: bool,
    inner: IndexCursor<'a, ForwardKey<EntryId>>,
    slot: IndexEntry,
}

impl<'a> ScopeCursor<'a> {
    /// Cursor for any scope node.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        match node {
            ExprNode::Scope(scope) => match scope.scope {
                SearchScope::Object => Self::object(node, partition),
                SearchScope::OneLevel => Self::one_level(node, partition),
                SearchScope::Subtree => Self::subtree(node, partition),
            },
            _ => Err(wrong_node("scope", node)),
        }
    }

    /// The base entry alone.
    pub fn object(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let scope = scope_node(node, SearchScope::Object)?;
        Ok(Self::over(partition, partition.entry_index(), scope, false))
    }

    /// Immediate children of the base.
    pub fn one_level(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let scope = scope_node(node, SearchScope::OneLevel)?;
        let skip = scope.deref.derefs_in_searching();
        Ok(Self::over(partition, partition.one_level_index(), scope, skip))
    }

    /// The base and all its descendants.
    pub fn subtree(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let scope = scope_node(node, SearchScope::Subtree)?;
        let skip = scope.deref.derefs_in_searching();
        Ok(Self::over(partition, partition.sub_level_index(), scope, skip))
    }

    fn over(
        partition: &'a Partition,
        index: &'a Index<EntryId>,
        scope: &ScopeNode,
        skip_aliases: bool,
    ) -> Self {
        Self {
            partition,
            scope: scope.scope,
            skip_aliases,
            inner: index.forward_cursor_for(&scope.base),
            slot: IndexEntry::default(),
        }
    }

    pub fn scope(&self) -> SearchScope {
        self.scope
    }

    fn walk(&mut self, direction: Direction) -> Result<bool> {
        while direction.step(&mut self.inner)? {
            let id = self.inner.get()?.id();
            if self.skip_aliases && self.partition.is_alias(id)? {
                continue;
            }
            self.slot.set(id, None);
            return Ok(true);
        }
        Ok(false)
    }
}

impl Cursor for ScopeCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        self.inner.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.inner.after_last()
    }

    fn next(&mut self) -> Result<bool> {
        self.walk(Direction::Forward)
    }

    fn previous(&mut self) -> Result<bool> {
        self.walk(Direction::Backward)
    }

    fn before(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.inner.state())?;
        Err(Error::unsupported("scope cursors cannot seek"))
    }

    fn after(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.inner.state())?;
        Err(Error::unsupported("scope cursors cannot seek"))
    }

    fn state(&self) -> CursorState {
        self.inner.state()
    }

    fn get(&self) -> Result<&IndexEntry> {
        match self.inner.state() {
            CursorState::OnElement => Ok(&self.slot),
            CursorState::Closed => Err(Error::CursorClosed),
            _ => Err(Error::InvalidCursorPosition),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirdb_proto::{DerefAliases, Entry};

    use super::*;
    use crate::schema::SchemaRegistry;

    /// ```text
    /// 1 o=Good Times Co.
    /// ├── 2 ou=Sales
    /// │   ├── 4 cn=JOhnny WAlkeR
    /// │   └── 6 cn=alias -> 5
    /// └── 3 ou=Engineering
    ///     └── 5 cn=Jack Daniels
    /// ```
    fn partition() -> Partition {
        let p = Partition::memory(Arc::new(SchemaRegistry::core()), ["cn"]).unwrap();
        p.add(None, Entry::new("o=Good Times Co.")).unwrap();
        p.add(Some(1), Entry::new("ou=Sales")).unwrap();
        p.add(Some(1), Entry::new("ou=Engineering")).unwrap();
        p.add(Some(2), Entry::new("cn=JOhnny WAlkeR")).unwrap();
        p.add(Some(3), Entry::new("cn=Jack Daniels")).unwrap();
        let alias = Entry::new("cn=alias").with("objectClass", ["alias"]);
        p.add_alias(Some(2), alias, 5).unwrap();
        p
    }

    fn walk(cursor: &mut ScopeCursor<'_>) -> (Vec<u64>, Vec<u64>) {
        let forward: Vec<_> = cursor.ids().collect::<Result<_>>().unwrap();
        let mut backward = Vec::new();
        while cursor.previous().unwrap() {
            backward.push(cursor.get().unwrap().id());
        }
        (forward, backward)
    }

    #[test]
    fn test_one_level() {
        let p = partition();
        let node = ExprNode::one_level(2, DerefAliases::Never);
        let mut cursor = ScopeCursor::new(&node, &p).unwrap();
        assert_eq!(walk(&mut cursor), (vec![4, 6], vec![6, 4]));

        let node = ExprNode::one_level(2, DerefAliases::Always);
        let mut cursor = ScopeCursor::one_level(&node, &p).unwrap();
        assert_eq!(walk(&mut cursor), (vec![4], vec![4]));

        let evaluator = OneLevelScopeEvaluator::new(&node, &p).unwrap();
        assert!(evaluator.matches(&IndexEntry::reference(4)).unwrap());
        assert!(!evaluator.matches(&IndexEntry::reference(6)).unwrap());
        assert!(!evaluator.matches(&IndexEntry::reference(2)).unwrap());
        assert!(!evaluator.matches(&IndexEntry::reference(5)).unwrap());
    }

    #[test]
    fn test_subtree() {
        let p = partition();
        let node = ExprNode::subtree(1, DerefAliases::FindingBaseObject);
        let mut cursor = ScopeCursor::new(&node, &p).unwrap();
        assert_eq!(
            walk(&mut cursor),
            (vec![1, 2, 3, 4, 5, 6], vec![6, 5, 4, 3, 2, 1])
        );

        let node = ExprNode::subtree(2, DerefAliases::InSearching);
        let mut cursor = ScopeCursor::subtree(&node, &p).unwrap();
        assert_eq!(walk(&mut cursor), (vec![2, 4], vec![4, 2]));

        let evaluator = SubtreeScopeEvaluator::new(&node, &p).unwrap();
        let matching: Vec<u64> = (1..=6)
            .filter(|&id| evaluator.matches(&IndexEntry::reference(id)).unwrap())
            .collect();
        assert_eq!(matching, vec![2, 4]);
    }

    #[test]
    fn test_object() {
        let p = partition();
        let node = ExprNode::object_scope(3);
        let mut cursor = ScopeCursor::new(&node, &p).unwrap();
        assert_eq!(walk(&mut cursor), (vec![3], vec![3]));
        let evaluator = ObjectScopeEvaluator::new(&node, &p).unwrap();
        assert!(evaluator.matches(&IndexEntry::reference(3)).unwrap());
        assert!(!evaluator.matches(&IndexEntry::reference(1)).unwrap());

        let missing = ExprNode::object_scope(42);
        let mut cursor = ScopeCursor::new(&missing, &p).unwrap();
        assert!(!cursor.first().unwrap());
    }

    #[test]
    fn test_wrong_scope_kind() {
        let p = partition();
        let node = ExprNode::subtree(1, DerefAliases::Never);
        assert!(matches!(
            OneLevelScopeEvaluator::new(&node, &p),
            Err(Error::IllegalState(_))
        ));
        assert!(matches!(
            ScopeCursor::one_level(&node, &p),
            Err(Error::IllegalState(_))
        ));
        let mut cursor = ScopeCursor::subtree(&node, &p).unwrap();
        assert!(matches!(
            cursor.before(&IndexEntry::new(0, String::new())),
            Err(Error::UnsupportedOperation(_))
        ));
    }
}
