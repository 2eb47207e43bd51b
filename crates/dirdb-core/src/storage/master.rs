//! Master table: entry id to record.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use dirdb_proto::{Entry, EntryId};

use crate::error::{Error, Result};

/// Tree name of the sled master table.
pub const MASTER_TREE: &str = "master";

/// Primary store of entries keyed by id.
pub trait MasterTable: Send + Sync {
    /// Fetch a record.
    fn get(&self, id: EntryId) -> Result<Option<Arc<Entry>>>;

    /// Store a record, replacing any previous one.
    fn put(&self, id: EntryId, entry: Arc<Entry>) -> Result<()>;

    /// Number of records.
    fn len(&self) -> Result<u64>;

    /// Highest id in use.
    fn last_id(&self) -> Result<Option<EntryId>>;
}

/// In-memory master table.
#[derive(Default)]
pub struct MemoryMasterTable {
    entries: RwLock<BTreeMap<EntryId, Arc<Entry>>>,
}

impl MemoryMasterTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MasterTable for MemoryMasterTable {
    fn get(&self, id: EntryId) -> Result<Option<Arc<Entry>>> {
        Ok(self.entries.read().get(&id).cloned())
    }

    fn put(&self, id: EntryId, entry: Arc<Entry>) -> Result<()> {
        self.entries.write().insert(id, entry);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.entries.read().len() as u64)
    }

    fn last_id(&self) -> Result<Option<EntryId>> {
        Ok(self.entries.read().keys().next_back().copied())
    }
}

/// Master table stored in a sled tree, records encoded with rkyv.
pub struct SledMasterTable {
    tree: sled::Tree,
}

impl SledMasterTable {
    /// Open the master tree of `db`.
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(MASTER_TREE)?,
        })
    }
}

fn decode_id(bytes: &[u8]) -> Result<EntryId> {
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
    Ok(EntryId::from_be_bytes(bytes))
}

impl MasterTable for SledMasterTable {
    fn get(&self, id: EntryId) -> Result<Option<Arc<Entry>>> {
        match self.tree.get(id.to_be_bytes())? {
            Some(bytes) => {
                let entry = Entry::from_bytes(&bytes)
                    .map_err(|e| Error::Deserialization(e.to_string()))?;
                Ok(Some(Arc::new(entry)))
            }
            None => Ok(None),
        }
    }

    fn put(&self, id: EntryId, entry: Arc<Entry>) -> Result<()> {
        let bytes = entry
            .to_bytes()
            .map_err(|e| Error::Serialization(e.to_string()))?;
        self.tree.insert(id.to_be_bytes(), bytes)?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.tree.len() as u64)
    }

    fn last_id(&self) -> Result<Option<EntryId>> {
        match self.tree.last()? {
            Some((key, _)) => Ok(Some(decode_id(&key)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(table: &dyn MasterTable) {
        assert_eq!(table.last_id().unwrap(), None);
        table
            .put(2, Arc::new(Entry::new("cn=b").with("cn", ["b"])))
            .unwrap();
        table.put(1, Arc::new(Entry::new("cn=a"))).unwrap();

        assert_eq!(table.len().unwrap(), 2);
        assert_eq!(table.last_id().unwrap(), Some(2));
        assert_eq!(table.get(2).unwrap().unwrap().dn, "cn=b");
        assert!(table.get(3).unwrap().is_none());
    }

    #[test]
    fn test_memory_master_table() {
        check(&MemoryMasterTable::new());
    }

    #[test]
    fn test_sled_master_table() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let table = SledMasterTable::open(&db).unwrap();
        check(&table);
        assert_eq!(
            table.get(2).unwrap().unwrap().get("cn").unwrap().values,
            vec!["b"]
        );
    }
}
