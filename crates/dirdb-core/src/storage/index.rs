//! Forward/reverse attribute index.

use std::ops::Bound;

use dirdb_proto::EntryId;

use super::sled_table::SledTable;
use super::table::{ForwardKey, IndexValue, MemoryTable, OrderedTable, ReverseKey};
use crate::cursor::IndexCursor;
use crate::error::Result;

/// Prefix of the sled tree holding an index's forward table.
pub const INDEX_FORWARD_PREFIX: &str = "index:fwd:";

/// Prefix of the sled tree holding an index's reverse table.
pub const INDEX_REVERSE_PREFIX: &str = "index:rev:";

/// Sorted index over `(value, id)` pairs.
///
/// The forward table orders pairs by value then id; the reverse table
/// orders the same pairs by id then value. Both always hold the same set.
pub struct Index<V: IndexValue> {
    name: String,
    forward: Box<dyn OrderedTable<ForwardKey<V>> + Send + Sync>,
    reverse: Box<dyn OrderedTable<ReverseKey<V>> + Send + Sync>,
}

impl<V: IndexValue> Index<V> {
    /// Create an in-memory index.
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            forward: Box::new(MemoryTable::new()),
            reverse: Box::new(MemoryTable::new()),
        }
    }

    /// Open (or create) an index stored in `db`.
    pub fn sled(name: impl Into<String>, db: &sled::Db) -> Result<Self> {
        let name = name.into();
        let forward = db.open_tree(format!("{}{}", INDEX_FORWARD_PREFIX, name))?;
        let reverse = db.open_tree(format!("{}{}", INDEX_REVERSE_PREFIX, name))?;
        Ok(Self {
            name,
            forward: Box::new(SledTable::new(forward)),
            reverse: Box::new(SledTable::new(reverse)),
        })
    }

    /// Index name (attribute OID for user indices).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add the pair `(value, id)`.
    pub fn insert(&self, value: V, id: EntryId) -> Result<()> {
        self.forward.insert(ForwardKey::new(value.clone(), id))?;
        self.reverse.insert(ReverseKey::new(id, value))?;
        Ok(())
    }

    /// Remove the pair `(value, id)`.
    pub fn remove(&self, value: V, id: EntryId) -> Result<()> {
        self.forward.remove(&ForwardKey::new(value.clone(), id))?;
        self.reverse.remove(&ReverseKey::new(id, value))?;
        Ok(())
    }

    /// Cursor over every pair in value order.
    pub fn forward_cursor(&self) -> IndexCursor<'_, ForwardKey<V>> {
        IndexCursor::new(self.forward.as_ref(), Bound::Unbounded, Bound::Unbounded)
    }

    /// Cursor over the pairs carrying exactly `value`.
    pub fn forward_cursor_for(&self, value: &V) -> IndexCursor<'_, ForwardKey<V>> {
        self.forward_range(Bound::Included(value), Bound::Included(value))
    }

    /// Cursor over the pairs whose value lies in `(lower, upper)`.
    pub fn forward_range(&self, lower: Bound<&V>, upper: Bound<&V>) -> IndexCursor<'_, ForwardKey<V>> {
        IndexCursor::new(self.forward.as_ref(), lower_key(lower), upper_key(upper))
    }

    /// Cursor over every pair in id order.
    pub fn reverse_cursor(&self) -> IndexCursor<'_, ReverseKey<V>> {
        IndexCursor::new(self.reverse.as_ref(), Bound::Unbounded, Bound::Unbounded)
    }

    /// Cursor over the values of `id`.
    pub fn reverse_cursor_for(&self, id: EntryId) -> IndexCursor<'_, ReverseKey<V>> {
        let (lower, upper) = reverse_bounds(id);
        IndexCursor::new(self.reverse.as_ref(), lower, upper)
    }

    /// Number of pairs.
    pub fn count(&self) -> Result<u64> {
        self.forward.count_in(Bound::Unbounded, Bound::Unbounded)
    }

    /// Number of pairs carrying `value`.
    pub fn count_value(&self, value: &V) -> Result<u64> {
        self.count_range(Bound::Included(value), Bound::Included(value))
    }

    /// Number of pairs whose value lies in `(lower, upper)`.
    pub fn count_range(&self, lower: Bound<&V>, upper: Bound<&V>) -> Result<u64> {
        let lower = lower_key(lower);
        let upper = upper_key(upper);
        self.forward.count_in(lower.as_ref(), upper.as_ref())
    }

    /// Whether the pair `(value, id)` exists.
    pub fn has(&self, value: &V, id: EntryId) -> Result<bool> {
        let key = ReverseKey::new(id, value.clone());
        Ok(self
            .reverse
            .first_in(Bound::Included(&key), Bound::Included(&key))?
            .is_some())
    }

    /// Whether `id` has any value.
    pub fn has_id(&self, id: EntryId) -> Result<bool> {
        let (lower, upper) = reverse_bounds(id);
        Ok(self.reverse.first_in(lower.as_ref(), upper.as_ref())?.is_some())
    }

    /// Values of `id` in ascending order.
    pub fn values_of(&self, id: EntryId) -> Result<Vec<V>> {
        let mut values = Vec::new();
        self.scan_values(id, |value| {
            values.push(value.clone());
            Ok(false)
        })?;
        Ok(values)
    }

    /// Smallest value of `id` accepted by `accept`.
    pub fn first_value_where<F>(&self, id: EntryId, mut accept: F) -> Result<Option<V>>
    where
        F: FnMut(&V) -> Result<bool>,
    {
        let mut found = None;
        self.scan_values(id, |value| {
            if accept(value)? {
                found = Some(value.clone());
                Ok(true)
            } else {
                Ok(false)
            }
        })?;
        Ok(found)
    }

    /// Visit the values of `id` in ascending order until `visit` returns true.
    fn scan_values<F>(&self, id: EntryId, mut visit: F) -> Result<()>
    where
        F: FnMut(&V) -> Result<bool>,
    {
        let (mut lower, upper) = reverse_bounds(id);
        while let Some(key) = self.reverse.first_in(lower.as_ref(), upper.as_ref())? {
            if visit(&key.value)? {
                break;
            }
            lower = Bound::Excluded(key);
        }
        Ok(())
    }
}

fn lower_key<V: IndexValue>(bound: Bound<&V>) -> Bound<ForwardKey<V>> {
    match bound {
        Bound::Included(v) => Bound::Included(ForwardKey::new(v.clone(), EntryId::MIN)),
        Bound::Excluded(v) => Bound::Excluded(ForwardKey::new(v.clone(), EntryId::MAX)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn upper_key<V: IndexValue>(bound: Bound<&V>) -> Bound<ForwardKey<V>> {
    match bound {
        Bound::Included(v) => Bound::Included(ForwardKey::new(v.clone(), EntryId::MAX)),
        Bound::Excluded(v) => Bound::Excluded(ForwardKey::new(v.clone(), EntryId::MIN)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn reverse_bounds<V: IndexValue>(id: EntryId) -> (Bound<ReverseKey<V>>, Bound<ReverseKey<V>>) {
    let lower = Bound::Included(ReverseKey::new(id, V::min_value()));
    let upper = match id.checked_add(1) {
        Some(next) => Bound::Excluded(ReverseKey::new(next, V::min_value())),
        None => Bound::Unbounded,
    };
    (lower, upper)
}
