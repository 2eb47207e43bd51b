//! Presence assertions: `(attr=*)`.

use dirdb_proto::ExprNode;

use super::{missing_index, wrong_node};
use crate::cursor::{ensure_open, Cursor, CursorState, IndexCursor, IndexEntry};
use crate::error::{Error, Result};
use crate::schema::AttributeType;
use crate::search::evaluator::Evaluator;
use crate::storage::{ForwardKey, Partition};

pub struct PresenceEvaluator<'a> {
    node: &'a ExprNode,
    partition: &'a Partition,
    attribute: &'a AttributeType,
    oid: String,
    indexed: bool,
}

impl<'a> PresenceEvaluator<'a> {
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let ExprNode::Presence { attribute } = node else {
            return Err(wrong_node("presence", node));
        };
        let at = partition.schema().lookup(attribute)?;
        Ok(Self {
            node,
            partition,
            attribute: at,
            oid: at.oid().to_string(),
            indexed: partition.user_index(at).is_some(),
        })
    }

    pub fn attribute_type(&self) -> &'a AttributeType {
        self.attribute
    }
}

impl Evaluator for PresenceEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        if self.attribute.is_always_present() {
            return Ok(true);
        }
        if self.indexed {
            return self.partition.presence_index().has(&self.oid, candidate.id());
        }
        let record = self.partition.fetch(candidate)?;
        Ok(record
            .attributes
            .iter()
            .any(|attr| self.attribute.is_named(&attr.name)))
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Walks the presence index for one attribute. Elements carry the
/// attribute OID as their value.
pub struct PresenceCursor<'a> {
    inner: IndexCursor<'a, ForwardKey<String>>,
}

impl<'a> PresenceCursor<'a> {
    /// Fails with `IllegalArgument` for attributes every entry carries and
    /// for attributes without an index.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let ExprNode::Presence { attribute } = node else {
            return Err(wrong_node("presence", node));
        };
        let at = partition.schema().lookup(attribute)?;
        if at.is_always_present() {
            return Err(Error::IllegalArgument(format!(
                "'{}' is present in every entry and has no presence cursor",
                at.name()
            )));
        }
        if partition.user_index(at).is_none() {
            return Err(missing_index(at));
        }
        Ok(Self {
            inner: partition
                .presence_index()
                .forward_cursor_for(&at.oid().to_string()),
        })
    }
}

impl Cursor for PresenceCursor<'_> {
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

    fn before(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.inner.state())?;
        Err(Error::unsupported("presence cursors cannot seek"))
    }

    fn after(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.inner.state())?;
        Err(Error::unsupported("presence cursors cannot seek"))
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
