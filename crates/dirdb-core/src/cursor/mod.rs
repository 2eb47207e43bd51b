//! Bidirectional cursor protocol.
//!
//! Every cursor in DirDB, from a raw index walk to the root of a search
//! tree, implements [`Cursor`]. A cursor sits either before its first
//! element, on an element, after its last element, or is closed. Moving
//! never skips or repeats an element: a full `next()` walk and a full
//! `previous()` walk of the same cursor are mirror images (except for Or
//! cursors, which are branch-sequential).
//!
//! Cursors own a single [`IndexEntry`] slot that they overwrite on every
//! move. [`Cursor::get`] hands out a borrow of that slot, so a reference is
//! only usable until the next positioning call.

mod index_cursor;

use std::cell::OnceCell;
use std::sync::Arc;

use dirdb_proto::{Entry, EntryId};

use crate::error::{Error, Result};

pub use index_cursor::IndexCursor;

/// Position of a cursor relative to its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Before the first element, or in a gap left by `before`/`after`.
    BeforeFirst,
    /// On an element; `get()` succeeds.
    OnElement,
    /// After the last element.
    AfterLast,
    /// Closed; only `close()` and `is_closed()` are allowed.
    Closed,
}

/// Candidate produced by a cursor: an entry id, the index value it was found
/// under, and a lazily fetched copy of the record.
#[derive(Debug, Clone)]
pub struct IndexEntry<V = String> {
    id: EntryId,
    value: Option<V>,
    record: OnceCell<Arc<Entry>>,
}

impl<V> IndexEntry<V> {
    /// Create a candidate carrying an index value.
    pub fn new(id: EntryId, value: V) -> Self {
        Self {
            id,
            value: Some(value),
            record: OnceCell::new(),
        }
    }

    /// Create a candidate that only references a record.
    pub fn reference(id: EntryId) -> Self {
        Self {
            id,
            value: None,
            record: OnceCell::new(),
        }
    }

    /// Entry id.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Index value the entry was found under, if any.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Record payload, if it has been fetched.
    pub fn record(&self) -> Option<&Arc<Entry>> {
        self.record.get()
    }

    /// Attach the record payload. A payload that is already attached wins.
    pub fn attach(&self, record: Arc<Entry>) -> &Arc<Entry> {
        self.record.get_or_init(|| record)
    }

    /// Reposition the slot on another element, dropping any fetched record.
    pub(crate) fn set(&mut self, id: EntryId, value: Option<V>) {
        self.id = id;
        self.value = value;
        self.record = OnceCell::new();
    }
}

impl<V> Default for IndexEntry<V> {
    fn default() -> Self {
        Self {
            id: 0,
            value: None,
            record: OnceCell::new(),
        }
    }
}

/// Bidirectional cursor over index candidates.
pub trait Cursor {
    /// Type of the index values the cursor walks.
    type Value;

    /// Position before the first element.
    fn before_first(&mut self) -> Result<()>;

    /// Position after the last element.
    fn after_last(&mut self) -> Result<()>;

    /// Move to the first element.
    fn first(&mut self) -> Result<bool> {
        self.before_first()?;
        self.next()
    }

    /// Move to the last element.
    fn last(&mut self) -> Result<bool> {
        self.after_last()?;
        self.previous()
    }

    /// Advance to the next element. Returns false, and stays after the
    /// last element, when there is none.
    fn next(&mut self) -> Result<bool>;

    /// Move back to the previous element. Returns false, and stays before
    /// the first element, when there is none.
    fn previous(&mut self) -> Result<bool>;

    /// Position just before the first element whose value is >= the value
    /// of `element`.
    fn before(&mut self, element: &IndexEntry<Self::Value>) -> Result<()>;

    /// Position just after the last element whose value is <= the value of
    /// `element`.
    fn after(&mut self, element: &IndexEntry<Self::Value>) -> Result<()>;

    /// Current position.
    fn state(&self) -> CursorState;

    /// Whether `get()` would succeed.
    fn available(&self) -> bool {
        self.state() == CursorState::OnElement
    }

    /// Element under the cursor.
    fn get(&self) -> Result<&IndexEntry<Self::Value>>;

    /// Release the cursor and its children. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether the cursor has been closed.
    fn is_closed(&self) -> bool {
        self.state() == CursorState::Closed
    }

    /// Cursors overwrite one slot on every move.
    fn is_element_reused(&self) -> bool {
        true
    }

    /// Iterate the ids of the remaining elements, walking forward.
    fn ids(&mut self) -> CursorIds<'_, Self>
    where
        Self: Sized,
    {
        CursorIds {
            cursor: self,
            done: false,
        }
    }
}

/// Fails with `CursorClosed` when `state` is closed.
pub(crate) fn ensure_open(state: CursorState) -> Result<()> {
    if state == CursorState::Closed {
        Err(Error::CursorClosed)
    } else {
        Ok(())
    }
}

/// Iterator over the entry ids a cursor yields from its current position.
///
/// Stops after the first error.
pub struct CursorIds<'c, C> {
    cursor: &'c mut C,
    done: bool,
}

impl<C: Cursor> Iterator for CursorIds<'_, C> {
    type Item = Result<EntryId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = match self.cursor.next() {
            Ok(true) => self.cursor.get().map(IndexEntry::id),
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };
        if step.is_err() {
            self.done = true;
        }
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_resets_record() {
        let mut slot: IndexEntry = IndexEntry::new(1, "a".to_string());
        slot.attach(Arc::new(Entry::new("cn=a")));
        assert!(slot.record().is_some());

        slot.set(2, Some("b".to_string()));
        assert_eq!(slot.id(), 2);
        assert_eq!(slot.value().map(String::as_str), Some("b"));
        assert!(slot.record().is_none());
    }

    #[test]
    fn test_attach_keeps_first() {
        let slot: IndexEntry = IndexEntry::reference(7);
        slot.attach(Arc::new(Entry::new("cn=first")));
        let kept = slot.attach(Arc::new(Entry::new("cn=second")));
        assert_eq!(kept.dn, "cn=first");
        assert!(slot.value().is_none());
    }

    #[test]
    fn test_ensure_open() {
        assert!(ensure_open(CursorState::AfterLast).is_ok());
        assert!(matches!(
            ensure_open(CursorState::Closed),
            Err(Error::CursorClosed)
        ));
    }
}
