//! Ordered key tables backing the indices.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;

use parking_lot::RwLock;

use dirdb_proto::EntryId;

use super::sled_table::KeyCodec;
use crate::cursor::IndexEntry;
use crate::error::{Error, Result};

/// Sorted set of keys with range seeks.
pub trait OrderedTable<K> {
    /// Smallest key inside the range.
    fn first_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<Option<K>>;

    /// Largest key inside the range.
    fn last_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<Option<K>>;

    /// Number of keys inside the range.
    fn count_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<u64>;

    /// Insert a key. Returns false if it was already present.
    fn insert(&self, key: K) -> Result<bool>;

    /// Remove a key. Returns false if it was absent.
    fn remove(&self, key: &K) -> Result<bool>;
}

/// Whether a range cannot contain any key.
///
/// `BTreeSet::range` panics on inverted ranges, and cursors clamp their
/// bounds in ways that can invert them.
pub(crate) fn is_empty_range<K: Ord>(lower: Bound<&K>, upper: Bound<&K>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

/// In-memory table.
pub struct MemoryTable<K> {
    keys: RwLock<BTreeSet<K>>,
}

impl<K: Ord> MemoryTable<K> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(BTreeSet::new()),
        }
    }
}

impl<K: Ord> Default for MemoryTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> OrderedTable<K> for MemoryTable<K> {
    fn first_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<Option<K>> {
        if is_empty_range(lower, upper) {
            return Ok(None);
        }
        Ok(self.keys.read().range::<K, _>((lower, upper)).next().cloned())
    }

    fn last_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<Option<K>> {
        if is_empty_range(lower, upper) {
            return Ok(None);
        }
        Ok(self
            .keys
            .read()
            .range::<K, _>((lower, upper))
            .next_back()
            .cloned())
    }

    fn count_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<u64> {
        if is_empty_range(lower, upper) {
            return Ok(0);
        }
        Ok(self.keys.read().range::<K, _>((lower, upper)).count() as u64)
    }

    fn insert(&self, key: K) -> Result<bool> {
        Ok(self.keys.write().insert(key))
    }

    fn remove(&self, key: &K) -> Result<bool> {
        Ok(self.keys.write().remove(key))
    }
}

/// Value type an index can hold.
pub trait IndexValue: Ord + Clone + fmt::Debug + KeyCodec + Send + Sync + 'static {
    /// Smallest value of the type.
    fn min_value() -> Self;
}

impl IndexValue for String {
    fn min_value() -> Self {
        String::new()
    }
}

impl IndexValue for EntryId {
    fn min_value() -> Self {
        EntryId::MIN
    }
}

/// Key of an index table: an entry id paired with an index value.
pub trait TableKey: Ord + Clone + fmt::Debug {
    /// Index value type.
    type Value: Clone;

    /// Entry id part.
    fn entry_id(&self) -> EntryId;

    /// Value part.
    fn entry_value(&self) -> &Self::Value;

    /// Smallest key a `before(element)` seek may land on.
    fn lowest_for(element: &IndexEntry<Self::Value>) -> Result<Self>;

    /// Largest key an `after(element)` seek may land on.
    fn highest_for(element: &IndexEntry<Self::Value>) -> Result<Self>;
}

fn seek_value<V: Clone>(element: &IndexEntry<V>) -> Result<V> {
    element
        .value()
        .cloned()
        .ok_or_else(|| Error::IllegalArgument("seek element carries no index value".into()))
}

/// Forward index key, ordered by value then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForwardKey<V> {
    pub value: V,
    pub id: EntryId,
}

impl<V> ForwardKey<V> {
    pub fn new(value: V, id: EntryId) -> Self {
        Self { value, id }
    }
}

impl<V: Ord + Clone + fmt::Debug> TableKey for ForwardKey<V> {
    type Value = V;

    fn entry_id(&self) -> EntryId {
        self.id
    }

    fn entry_value(&self) -> &V {
        &self.value
    }

    fn lowest_for(element: &IndexEntry<V>) -> Result<Self> {
        Ok(Self::new(seek_value(element)?, EntryId::MIN))
    }

    fn highest_for(element: &IndexEntry<V>) -> Result<Self> {
        Ok(Self::new(seek_value(element)?, EntryId::MAX))
    }
}

/// Reverse index key, ordered by id then value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReverseKey<V> {
    pub id: EntryId,
    pub value: V,
}

impl<V> ReverseKey<V> {
    pub fn new(id: EntryId, value: V) -> Self {
        Self { id, value }
    }
}

impl<V: Ord + Clone + fmt::Debug> TableKey for ReverseKey<V> {
    type Value = V;

    fn entry_id(&self) -> EntryId {
        self.id
    }

    fn entry_value(&self) -> &V {
        &self.value
    }

    fn lowest_for(element: &IndexEntry<V>) -> Result<Self> {
        Ok(Self::new(element.id(), seek_value(element)?))
    }

    fn highest_for(element: &IndexEntry<V>) -> Result<Self> {
        Ok(Self::new(element.id(), seek_value(element)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_range_guard() {
        assert!(is_empty_range(Bound::Included(&5), Bound::Included(&4)));
        assert!(is_empty_range(Bound::Excluded(&5), Bound::Included(&5)));
        assert!(!is_empty_range(Bound::Included(&5), Bound::Included(&5)));
        assert!(!is_empty_range::<u64>(Bound::Unbounded, Bound::Excluded(&0)));
    }

    #[test]
    fn test_memory_table_seeks() {
        let table = MemoryTable::new();
        for key in [10u64, 20, 30, 40] {
            assert!(table.insert(key).unwrap());
        }
        assert!(!table.insert(20).unwrap());

        assert_eq!(
            table.first_in(Bound::Excluded(&20), Bound::Unbounded).unwrap(),
            Some(30)
        );
        assert_eq!(
            table.last_in(Bound::Unbounded, Bound::Excluded(&30)).unwrap(),
            Some(20)
        );
        assert_eq!(
            table.count_in(Bound::Included(&15), Bound::Included(&40)).unwrap(),
            3
        );
        // Inverted range must not panic.
        assert_eq!(
            table.first_in(Bound::Included(&40), Bound::Included(&10)).unwrap(),
            None
        );

        assert!(table.remove(&20).unwrap());
        assert!(!table.remove(&20).unwrap());
        assert_eq!(table.count_in(Bound::Unbounded, Bound::Unbounded).unwrap(), 3);
    }

    #[test]
    fn test_key_ordering() {
        let a = ForwardKey::new("a".to_string(), 9);
        let b = ForwardKey::new("b".to_string(), 1);
        assert!(a < b);

        let r1 = ReverseKey::new(1, "z".to_string());
        let r2 = ReverseKey::new(2, "a".to_string());
        assert!(r1 < r2);
    }

    #[test]
    fn test_seek_keys() {
        let element = IndexEntry::new(5, "m".to_string());
        assert_eq!(
            ForwardKey::lowest_for(&element).unwrap(),
            ForwardKey::new("m".to_string(), 0)
        );
        assert_eq!(
            ForwardKey::highest_for(&element).unwrap(),
            ForwardKey::new("m".to_string(), u64::MAX)
        );
        assert_eq!(
            ReverseKey::lowest_for(&element).unwrap(),
            ReverseKey::new(5, "m".to_string())
        );

        let bare: IndexEntry = IndexEntry::reference(5);
        assert!(matches!(
            ForwardKey::lowest_for(&bare),
            Err(Error::IllegalArgument(_))
        ));
    }
}
