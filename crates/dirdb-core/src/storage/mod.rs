//! Storage layer: ordered tables, indices, master table and partitions.
//!
//! Both backends expose the same traits. The memory backend keeps keys in
//! `BTreeSet`s behind `parking_lot` locks; the sled backend keeps them as
//! the keys of sled trees with an order-preserving encoding.

mod index;
mod master;
mod partition;
mod sled_table;
mod table;

pub use index::{Index, INDEX_FORWARD_PREFIX, INDEX_REVERSE_PREFIX};
pub use master::{MasterTable, MemoryMasterTable, SledMasterTable, MASTER_TREE};
pub use partition::Partition;
pub use sled_table::{KeyCodec, SledTable};
pub use table::{ForwardKey, IndexValue, MemoryTable, OrderedTable, ReverseKey, TableKey};
