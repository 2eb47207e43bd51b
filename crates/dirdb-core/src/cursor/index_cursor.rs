//! Cursor over one side of an index.

use std::cmp::Ordering;
use std::ops::Bound;

use super::{ensure_open, Cursor, CursorState, IndexEntry};
use crate::error::{Error, Result};
use crate::storage::{OrderedTable, TableKey};

#[derive(Debug, Clone)]
enum Position<K> {
    BeforeFirst,
    AfterLast,
    On(K),
    /// Between two keys, as left by `before`/`after`.
    Gap {
        next: Bound<K>,
        previous: Bound<K>,
    },
    Closed,
}

/// Value-ordered cursor over the keys of an [`OrderedTable`] inside a key
/// range.
///
/// Over a forward table (`(value, id)` keys) it walks entries by value; over
/// a reverse table (`(id, value)` keys) it walks the values of each id.
pub struct IndexCursor<'a, K: TableKey> {
    table: &'a dyn OrderedTable<K>,
    lower: Bound<K>,
    upper: Bound<K>,
    position: Position<K>,
    slot: IndexEntry<K::Value>,
}

impl<'a, K: TableKey> IndexCursor<'a, K> {
    /// Create a cursor over `table` restricted to `(lower, upper)`.
    pub fn new(table: &'a dyn OrderedTable<K>, lower: Bound<K>, upper: Bound<K>) -> Self {
        Self {
            table,
            lower,
            upper,
            position: Position::BeforeFirst,
            slot: IndexEntry::default(),
        }
    }

    /// Key under the cursor.
    pub fn key(&self) -> Option<&K> {
        match &self.position {
            Position::On(key) => Some(key),
            _ => None,
        }
    }

    fn land(&mut self, found: Option<K>, exhausted: Position<K>) -> bool {
        match found {
            Some(key) => {
                self.slot
                    .set(key.entry_id(), Some(key.entry_value().clone()));
                self.position = Position::On(key);
                true
            }
            None => {
                self.position = exhausted;
                false
            }
        }
    }

    fn cursor_state(&self) -> CursorState {
        match self.position {
            Position::BeforeFirst | Position::Gap { .. } => CursorState::BeforeFirst,
            Position::AfterLast => CursorState::AfterLast,
            Position::On(_) => CursorState::OnElement,
            Position::Closed => CursorState::Closed,
        }
    }
}

impl<K: TableKey> Cursor for IndexCursor<'_, K> {
    type Value = K::Value;

    fn before_first(&mut self) -> Result<()> {
        ensure_open(self.cursor_state())?;
        self.position = Position::BeforeFirst;
        Ok(())
    }

    fn after_last(&mut self) -> Result<()> {
        ensure_open(self.cursor_state())?;
        self.position = Position::AfterLast;
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        let lower = match &self.position {
            Position::Closed => return Err(Error::CursorClosed),
            Position::AfterLast => return Ok(false),
            Position::BeforeFirst => self.lower.clone(),
            Position::On(key) => tighter_lower(Bound::Excluded(key.clone()), &self.lower),
            Position::Gap { next, .. } => tighter_lower(next.clone(), &self.lower),
        };
        let found = self.table.first_in(lower.as_ref(), self.upper.as_ref())?;
        Ok(self.land(found, Position::AfterLast))
    }

    fn previous(&mut self) -> Result<bool> {
        let upper = match &self.position {
            Position::Closed => return Err(Error::CursorClosed),
            Position::BeforeFirst => return Ok(false),
            Position::AfterLast => self.upper.clone(),
            Position::On(key) => tighter_upper(Bound::Excluded(key.clone()), &self.upper),
            Position::Gap { previous, .. } => tighter_upper(previous.clone(), &self.upper),
        };
        let found = self.table.last_in(self.lower.as_ref(), upper.as_ref())?;
        Ok(self.land(found, Position::BeforeFirst))
    }

    fn before(&mut self, element: &IndexEntry<K::Value>) -> Result<()> {
        ensure_open(self.cursor_state())?;
        let key = K::lowest_for(element)?;
        self.position = Position::Gap {
            next: Bound::Included(key.clone()),
            previous: Bound::Excluded(key),
        };
        Ok(())
    }

    fn after(&mut self, element: &IndexEntry<K::Value>) -> Result<()> {
        ensure_open(self.cursor_state())?;
        let key = K::highest_for(element)?;
        self.position = Position::Gap {
            next: Bound::Excluded(key.clone()),
            previous: Bound::Included(key),
        };
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.cursor_state()
    }

    fn get(&self) -> Result<&IndexEntry<K::Value>> {
        match self.position {
            Position::On(_) => Ok(&self.slot),
            Position::Closed => Err(Error::CursorClosed),
            _ => Err(Error::InvalidCursorPosition),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.position = Position::Closed;
        Ok(())
    }
}

/// The more restrictive of two lower bounds.
fn tighter_lower<K: Ord + Clone>(a: Bound<K>, b: &Bound<K>) -> Bound<K> {
    let keep_a = match (&a, b) {
        (_, Bound::Unbounded) => true,
        (Bound::Unbounded, _) => false,
        (
            Bound::Included(x) | Bound::Excluded(x),
            Bound::Included(y) | Bound::Excluded(y),
        ) => match x.cmp(y) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => matches!(a, Bound::Excluded(_)),
        },
    };
    if keep_a {
        a
    } else {
        b.clone()
    }
}

/// The more restrictive of two upper bounds.
fn tighter_upper<K: Ord + Clone>(a: Bound<K>, b: &Bound<K>) -> Bound<K> {
    let keep_a = match (&a, b) {
        (_, Bound::Unbounded) => true,
        (Bound::Unbounded, _) => false,
        (
            Bound::Included(x) | Bound::Excluded(x),
            Bound::Included(y) | Bound::Excluded(y),
        ) => match x.cmp(y) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => matches!(a, Bound::Excluded(_)),
        },
    };
    if keep_a {
        a
    } else {
        b.clone()
    }
}
