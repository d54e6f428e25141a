//! This module contains the [KeyValueStore] trait and a concrete in-memory implementation
//! of it, together with the [WriteBatch] type used to group the writes of one block commit
//! into a single atomic unit.

use crate::{StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// The logical column families of the chain database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Blocks, keyed by hash, plus the block-number → block-hash index (8-byte big-endian
    /// keys; the two key shapes never collide).
    Blocks,
    /// Confirmed transactions, keyed by transaction hash.
    Transactions,
    /// Transaction receipts, keyed by transaction hash.
    Receipts,
    /// Per-block log indices, keyed by block number (8-byte big-endian).
    BlockLogs,
    /// Merkle trie nodes and contract bytecode, keyed by keccak hash.
    Trie,
}

impl Column {
    /// All columns, in declaration order.
    pub const ALL: [Self; 5] =
        [Self::Blocks, Self::Transactions, Self::Receipts, Self::BlockLogs, Self::Trie];

    const fn index(self) -> usize {
        match self {
            Self::Blocks => 0,
            Self::Transactions => 1,
            Self::Receipts => 2,
            Self::BlockLogs => 3,
            Self::Trie => 4,
        }
    }
}

/// A single operation within a [WriteBatch].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put {
        /// The column to write into.
        column: Column,
        /// The key.
        key: Vec<u8>,
        /// The value.
        value: Vec<u8>,
    },
    /// Delete a key. Deleting an absent key is a no-op.
    Delete {
        /// The column to delete from.
        column: Column,
        /// The key.
        key: Vec<u8>,
    },
}

/// An ordered set of writes applied atomically. Batches are the only write path of the
/// store; a block save issues all of its puts and deletes through one batch.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Queues a put.
    pub fn put(&mut self, column: Column, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put { column, key: key.into(), value: value.into() });
    }

    /// Queues a delete.
    pub fn delete(&mut self, column: Column, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { column, key: key.into() });
    }

    /// Returns the queued operations in insertion order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Returns `true` if the batch holds no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Describes the interface of a simple, synchronous, column-oriented key-value store.
///
/// Reads are point lookups; writes only happen through [KeyValueStore::write], which must
/// apply the whole batch atomically or not at all.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Get the value associated with the given key.
    fn get(&self, column: Column, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically apply every operation in the batch, in order.
    fn write(&self, batch: WriteBatch) -> StorageResult<()>;
}

/// A simple, synchronous key-value store that keeps every column in memory. This is the
/// default backend of the development chain.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    columns: RwLock<[HashMap<Vec<u8>, Vec<u8>>; 5]>,
}

impl MemoryKeyValueStore {
    /// Create a new [MemoryKeyValueStore] with empty columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys in the given column.
    pub fn len(&self, column: Column) -> usize {
        self.columns.read().expect("kv lock poisoned")[column.index()].len()
    }

    /// Returns `true` if the given column holds no keys.
    pub fn is_empty(&self, column: Column) -> bool {
        self.len(column) == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, column: Column, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let columns = self
            .columns
            .read()
            .map_err(|_| StorageError::Backend("kv lock poisoned".to_string()))?;
        Ok(columns[column.index()].get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut columns = self
            .columns
            .write()
            .map_err(|_| StorageError::Backend("kv lock poisoned".to_string()))?;
        for op in batch.ops {
            match op {
                BatchOp::Put { column, key, value } => {
                    columns[column.index()].insert(key, value);
                }
                BatchOp::Delete { column, key } => {
                    columns[column.index()].remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Encodes a block number as the fixed-width big-endian key used by the number-indexed
/// columns.
pub(crate) const fn number_key(number: u64) -> [u8; 8] {
    number.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{collection::vec, prelude::*};

    #[test]
    fn test_write_then_get() {
        let store = MemoryKeyValueStore::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Trie, b"key".to_vec(), b"value".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.get(Column::Trie, b"key").unwrap(), Some(b"value".to_vec()));
        assert_eq!(store.get(Column::Blocks, b"key").unwrap(), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemoryKeyValueStore::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Receipts, b"a".to_vec(), b"1".to_vec());
        batch.delete(Column::Receipts, b"a".to_vec());
        batch.delete(Column::Receipts, b"never-existed".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.get(Column::Receipts, b"a").unwrap(), None);
    }

    #[test]
    fn test_batch_applies_in_order() {
        let store = MemoryKeyValueStore::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Blocks, b"k".to_vec(), b"first".to_vec());
        batch.put(Column::Blocks, b"k".to_vec(), b"second".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.get(Column::Blocks, b"k").unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_columns_are_disjoint() {
        let store = MemoryKeyValueStore::new();
        let mut batch = WriteBatch::new();
        for column in Column::ALL {
            batch.put(column, b"shared".to_vec(), format!("{column:?}").into_bytes());
        }
        store.write(batch).unwrap();

        for column in Column::ALL {
            assert_eq!(
                store.get(column, b"shared").unwrap(),
                Some(format!("{column:?}").into_bytes())
            );
        }
    }

    proptest! {
        /// Everything a batch puts (and does not subsequently delete) is readable afterwards.
        #[test]
        fn batch_roundtrip(entries in vec((vec(any::<u8>(), 1..32), vec(any::<u8>(), 0..64)), 1..32)) {
            let store = MemoryKeyValueStore::new();
            let mut batch = WriteBatch::new();
            for (key, value) in &entries {
                batch.put(Column::Trie, key.clone(), value.clone());
            }
            store.write(batch).unwrap();

            // Later writes win for duplicate keys, so compare against a map built in order.
            let mut expected = HashMap::new();
            for (key, value) in entries {
                expected.insert(key, value);
            }
            for (key, value) in expected {
                prop_assert_eq!(store.get(Column::Trie, &key).unwrap(), Some(value));
            }
        }
    }
}
