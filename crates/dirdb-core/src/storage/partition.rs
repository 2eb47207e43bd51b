//! A partition: master table plus the system and user indices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use dirdb_proto::{Entry, EntryId};

use super::index::Index;
use super::master::{MasterTable, MemoryMasterTable, SledMasterTable};
use crate::config::{Backend, PartitionConfig};
use crate::cursor::IndexEntry;
use crate::error::{Error, Result};
use crate::schema::{AttributeType, SchemaRegistry};

const PRESENCE_INDEX: &str = "presence";
const ONE_LEVEL_INDEX: &str = "one_level";
const SUB_LEVEL_INDEX: &str = "sub_level";
const ALIAS_INDEX: &str = "alias";
const ENTRY_INDEX: &str = "entry";

/// Entries of one naming context and the indices over them.
///
/// System indices:
/// - presence: attribute OID to the ids carrying it (indexed attributes only)
/// - one-level: parent id to child ids
/// - sub-level: ancestor id to descendant ids, each id also maps to itself
/// - alias: alias target id to alias ids
/// - entry: every id mapped to itself, walked by full scans
pub struct Partition {
    config: PartitionConfig,
    schema: Arc<SchemaRegistry>,
    master: Box<dyn MasterTable>,
    presence: Index<String>,
    one_level: Index<EntryId>,
    sub_level: Index<EntryId>,
    alias: Index<EntryId>,
    entries: Index<EntryId>,
    user: HashMap<String, Index<String>>,
    next_id: AtomicU64,
    db: Option<sled::Db>,
}

impl Partition {
    /// Open a partition.
    ///
    /// Every name in `config.indexed_attributes` must resolve in `schema`.
    pub fn open(config: PartitionConfig, schema: Arc<SchemaRegistry>) -> Result<Self> {
        let mut user_oids = Vec::new();
        for name in &config.indexed_attributes {
            let at = schema.get(name).ok_or_else(|| {
                Error::IllegalArgument(format!("cannot index unknown attribute '{}'", name))
            })?;
            if !user_oids.iter().any(|oid: &String| oid == at.oid()) {
                user_oids.push(at.oid().to_string());
            }
        }

        let (master, db): (Box<dyn MasterTable>, Option<sled::Db>) = match config.backend {
            Backend::Memory => (Box::new(MemoryMasterTable::new()), None),
            Backend::Sled => {
                let db = config.to_sled_config().open()?;
                (Box::new(SledMasterTable::open(&db)?), Some(db))
            }
        };

        let index = |name: &str| -> Result<Index<EntryId>> {
            match &db {
                Some(db) => Index::sled(name, db),
                None => Ok(Index::memory(name)),
            }
        };
        let one_level = index(ONE_LEVEL_INDEX)?;
        let sub_level = index(SUB_LEVEL_INDEX)?;
        let alias = index(ALIAS_INDEX)?;
        let entries = index(ENTRY_INDEX)?;

        let string_index = |name: &str| -> Result<Index<String>> {
            match &db {
                Some(db) => Index::sled(name, db),
                None => Ok(Index::memory(name)),
            }
        };
        let presence = string_index(PRESENCE_INDEX)?;
        let mut user = HashMap::new();
        for oid in user_oids {
            let idx = string_index(&oid)?;
            user.insert(oid, idx);
        }

        let next_id = master.last_id()?.map_or(1, |id| id + 1);
        debug!(
            backend = ?config.backend,
            user_indices = user.len(),
            next_id,
            "opened partition"
        );

        Ok(Self {
            config,
            schema,
            master,
            presence,
            one_level,
            sub_level,
            alias,
            entries,
            user,
            next_id: AtomicU64::new(next_id),
            db,
        })
    }

    /// Open an in-memory partition indexing `attributes`.
    pub fn memory<I, S>(schema: Arc<SchemaRegistry>, attributes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::open(PartitionConfig::memory().with_indices(attributes), schema)
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Add an entry under `parent` (None for a context root).
    #[instrument(skip(self, entry), fields(dn = %entry.dn))]
    pub fn add(&self, parent: Option<EntryId>, entry: Entry) -> Result<EntryId> {
        entry.validate()?;
        if let Some(parent) = parent {
            if self.master.get(parent)?.is_none() {
                return Err(Error::NotFound(parent));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        // Indices must never reference an id without a record.
        let entry = Arc::new(entry);
        self.master.put(id, Arc::clone(&entry))?;
        self.index_attributes(id, &entry)?;
        self.entries.insert(id, id)?;

        self.sub_level.insert(id, id)?;
        let mut ancestor = parent;
        while let Some(a) = ancestor {
            self.sub_level.insert(a, id)?;
            ancestor = self.parent_of(a)?;
        }
        if let Some(parent) = parent {
            self.one_level.insert(parent, id)?;
        }

        debug!(id, "added entry");
        Ok(id)
    }

    /// Add an alias entry pointing at `target`.
    pub fn add_alias(&self, parent: Option<EntryId>, entry: Entry, target: EntryId) -> Result<EntryId> {
        if self.master.get(target)?.is_none() {
            return Err(Error::NotFound(target));
        }
        if !entry.is_alias() {
            warn!(dn = %entry.dn, "alias entry lacks the alias object class");
        }
        let id = self.add(parent, entry)?;
        self.alias.insert(target, id)?;
        Ok(id)
    }

    fn index_attributes(&self, id: EntryId, entry: &Entry) -> Result<()> {
        for attr in &entry.attributes {
            let Some(at) = self.schema.get(&attr.name) else {
                debug!(attribute = %attr.name, "skipping attribute without schema");
                continue;
            };
            let Some(index) = self.user.get(at.oid()) else {
                continue;
            };
            for value in &attr.values {
                match at.index_form(value) {
                    Ok(normalized) => index.insert(normalized, id)?,
                    Err(e) => warn!(attribute = %attr.name, error = %e, "value not indexed"),
                }
            }
            self.presence.insert(at.oid().to_string(), id)?;
        }
        Ok(())
    }

    /// Fetch a record.
    pub fn lookup(&self, id: EntryId) -> Result<Option<Arc<Entry>>> {
        self.master.get(id)
    }

    /// Record of a candidate, cached on the candidate.
    pub fn fetch<V>(&self, candidate: &IndexEntry<V>) -> Result<Arc<Entry>> {
        if let Some(record) = candidate.record() {
            return Ok(Arc::clone(record));
        }
        let record = self
            .master
            .get(candidate.id())?
            .ok_or(Error::NotFound(candidate.id()))?;
        Ok(Arc::clone(candidate.attach(record)))
    }

    /// Parent of an entry.
    pub fn parent_of(&self, id: EntryId) -> Result<Option<EntryId>> {
        Ok(self.one_level.values_of(id)?.into_iter().next())
    }

    /// Whether an entry was added as an alias.
    pub fn is_alias(&self, id: EntryId) -> Result<bool> {
        self.alias.has_id(id)
    }

    /// Number of entries.
    pub fn count(&self) -> Result<u64> {
        self.master.len()
    }

    /// User index of an attribute type, if it is indexed.
    pub fn user_index(&self, at: &AttributeType) -> Option<&Index<String>> {
        self.user.get(at.oid())
    }

    pub fn presence_index(&self) -> &Index<String> {
        &self.presence
    }

    pub fn one_level_index(&self) -> &Index<EntryId> {
        &self.one_level
    }

    pub fn sub_level_index(&self) -> &Index<EntryId> {
        &self.sub_level
    }

    pub fn alias_index(&self) -> &Index<EntryId> {
        &self.alias
    }

    pub fn entry_index(&self) -> &Index<EntryId> {
        &self.entries
    }

    /// Flush the sled backend. No-op in memory.
    pub fn flush(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.flush()?;
        }
        Ok(())
    }
}
