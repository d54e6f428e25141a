//! Indexed persistence for confirmed transactions.

use crate::{Column, KeyValueStore, StorageError, StorageResult, WriteBatch};
use alloy_primitives::B256;
use alloy_rlp::Decodable;
use cinder_primitives::StoredTransaction;
use std::sync::Arc;

/// A typed wrapper over the transactions column, keyed by transaction hash.
#[derive(Debug)]
pub struct TransactionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl TransactionStore {
    /// Creates a new [TransactionStore].
    pub const fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Fetches a confirmed transaction record by hash.
    pub fn get(&self, hash: B256) -> StorageResult<Option<StoredTransaction>> {
        let Some(raw) = self.kv.get(Column::Transactions, hash.as_slice())? else {
            return Ok(None);
        };
        StoredTransaction::decode(&mut raw.as_slice())
            .map(Some)
            .map_err(|e| StorageError::corrupt("transactions", e))
    }

    /// Queues the write of a confirmed transaction record.
    pub fn put(&self, batch: &mut WriteBatch, hash: B256, record: &StoredTransaction) {
        let mut body = Vec::new();
        alloy_rlp::Encodable::encode(record, &mut body);
        batch.put(Column::Transactions, hash.as_slice(), body);
    }

    /// Queues the deletion of a confirmed transaction record.
    pub fn delete(&self, batch: &mut WriteBatch, hash: B256) {
        batch.delete(Column::Transactions, hash.as_slice());
    }
}
