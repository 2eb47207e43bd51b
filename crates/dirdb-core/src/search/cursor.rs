//! The search cursor sum type and the cursors every plan can fall back to.

use tracing::trace;

use dirdb_proto::EntryId;

use super::and::AndCursor;
use super::evaluator::{Evaluator, FilterEvaluator};
use super::leaf::{
    EqualityCursor, OrderingCursor, PresenceCursor, ScopeCursor, SubstringCursor,
};
use super::not::NotCursor;
use super::or::OrCursor;
use crate::cursor::{ensure_open, Cursor, CursorState, IndexCursor, IndexEntry};
use crate::error::{Error, Result};
use crate::storage::{ForwardKey, Partition};

/// Direction of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub(crate) fn step<C: Cursor + ?Sized>(self, cursor: &mut C) -> Result<bool> {
        match self {
            Direction::Forward => cursor.next(),
            Direction::Backward => cursor.previous(),
        }
    }
}

/// Step `cursor` in `direction` until `accept` passes the element under it.
///
/// Returns false once the cursor runs out.
pub(crate) fn seek_matching<C, F>(cursor: &mut C, direction: Direction, mut accept: F) -> Result<bool>
where
    C: Cursor + ?Sized,
    F: FnMut(&IndexEntry<C::Value>) -> Result<bool>,
{
    while direction.step(cursor)? {
        if accept(cursor.get()?)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Any cursor a [`CursorBuilder`](super::CursorBuilder) can produce.
///
/// Closes itself when dropped.
pub enum SearchCursor<'a> {
    Empty(EmptyCursor),
    Scan(ScanCursor<'a>),
    Presence(PresenceCursor<'a>),
    Substring(SubstringCursor<'a>),
    Ordering(OrderingCursor<'a>),
    Equality(EqualityCursor<'a>),
    Scope(ScopeCursor<'a>),
    And(AndCursor<'a>),
    Or(OrCursor<'a>),
    Not(NotCursor<'a>),
}

macro_rules! dispatch {
    ($self:expr, $cursor:ident => $body:expr) => {
        match $self {
            SearchCursor::Empty($cursor) => $body,
            SearchCursor::Scan($cursor) => $body,
            SearchCursor::Presence($cursor) => $body,
            SearchCursor::Substring($cursor) => $body,
            SearchCursor::Ordering($cursor) => $body,
            SearchCursor::Equality($cursor) => $body,
            SearchCursor::Scope($cursor) => $body,
            SearchCursor::And($cursor) => $body,
            SearchCursor::Or($cursor) => $body,
            SearchCursor::Not($cursor) => $body,
        }
    };
}

impl SearchCursor<'_> {
    /// Short name of the cursor kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchCursor::Empty(_) => "empty",
            SearchCursor::Scan(_) => "scan",
            SearchCursor::Presence(_) => "presence",
            SearchCursor::Substring(_) => "substring",
            SearchCursor::Ordering(_) => "ordering",
            SearchCursor::Equality(_) => "equality",
            SearchCursor::Scope(_) => "scope",
            SearchCursor::And(_) => "and",
            SearchCursor::Or(_) => "or",
            SearchCursor::Not(_) => "not",
        }
    }
}

impl Cursor for SearchCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        dispatch!(self, c => c.before_first())
    }

    fn after_last(&mut self) -> Result<()> {
        dispatch!(self, c => c.after_last())
    }

    fn first(&mut self) -> Result<bool> {
        dispatch!(self, c => c.first())
    }

    fn last(&mut self) -> Result<bool> {
        dispatch!(self, c => c.last())
    }

    fn next(&mut self) -> Result<bool> {
        dispatch!(self, c => c.next())
    }

    fn previous(&mut self) -> Result<bool> {
        dispatch!(self, c => c.previous())
    }

    fn before(&mut self, element: &IndexEntry) -> Result<()> {
        dispatch!(self, c => c.before(element))
    }

    fn after(&mut self, element: &IndexEntry) -> Result<()> {
        dispatch!(self, c => c.after(element))
    }

    fn state(&self) -> CursorState {
        dispatch!(self, c => c.state())
    }

    fn get(&self) -> Result<&IndexEntry> {
        dispatch!(self, c => c.get())
    }

    fn close(&mut self) -> Result<()> {
        dispatch!(self, c => c.close())
    }
}

impl Drop for SearchCursor<'_> {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            trace!(kind = self.kind(), error = %e, "close on drop failed");
        }
    }
}

/// Cursor over nothing.
#[derive(Debug)]
pub struct EmptyCursor {
    state: CursorState,
}

impl EmptyCursor {
    pub fn new() -> Self {
        Self {
            state: CursorState::BeforeFirst,
        }
    }

    fn move_to(&mut self, state: CursorState) -> Result<bool> {
        ensure_open(self.state)?;
        self.state = state;
        Ok(false)
    }
}

impl Default for EmptyCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor for EmptyCursor {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        self.move_to(CursorState::BeforeFirst).map(drop)
    }

    fn after_last(&mut self) -> Result<()> {
        self.move_to(CursorState::AfterLast).map(drop)
    }

    fn next(&mut self) -> Result<bool> {
        self.move_to(CursorState::AfterLast)
    }

    fn previous(&mut self) -> Result<bool> {
        self.move_to(CursorState::BeforeFirst)
    }

    fn before(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.state)?;
        Err(Error::unsupported("empty cursor has no value order"))
    }

    fn after(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.state)?;
        Err(Error::unsupported("empty cursor has no value order"))
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn get(&self) -> Result<&IndexEntry> {
        ensure_open(self.state)?;
        Err(Error::InvalidCursorPosition)
    }

    fn close(&mut self) -> Result<()> {
        self.state = CursorState::Closed;
        Ok(())
    }
}

/// Walks every entry of a partition in id order, optionally keeping only
/// the entries an evaluator accepts.
pub struct ScanCursor<'a> {
    inner: IndexCursor<'a, ForwardKey<EntryId>>,
    filter: Option<Box<FilterEvaluator<'a>>>,
    slot: IndexEntry,
}

impl<'a> ScanCursor<'a> {
    /// Cursor over every entry.
    pub fn new(partition: &'a Partition) -> Self {
        Self {
            inner: partition.entry_index().forward_cursor(),
            filter: None,
            slot: IndexEntry::default(),
        }
    }

    /// Cursor over the entries `filter` accepts.
    pub fn filtered(partition: &'a Partition, filter: FilterEvaluator<'a>) -> Self {
        Self {
            filter: Some(Box::new(filter)),
            ..Self::new(partition)
        }
    }

    /// Evaluator applied to each entry, if any.
    pub fn filter(&self) -> Option<&FilterEvaluator<'a>> {
        self.filter.as_deref()
    }

    fn walk(&mut self, direction: Direction) -> Result<bool> {
        while direction.step(&mut self.inner)? {
            let id = self.inner.get()?.id();
            self.slot.set(id, None);
            match &self.filter {
                Some(filter) if !filter.matches(&self.slot)? => continue,
                _ => return Ok(true),
            }
        }
        Ok(false)
    }
}

impl Cursor for ScanCursor<'_> {
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
        ensure_open(self.state())?;
        Err(Error::unsupported("a full scan has no value order"))
    }

    fn after(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.state())?;
        Err(Error::unsupported("a full scan has no value order"))
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
