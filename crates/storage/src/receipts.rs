//! Indexed persistence for transaction receipts.

use crate::{Column, KeyValueStore, StorageError, StorageResult, WriteBatch};
use alloy_primitives::B256;
use alloy_rlp::Decodable;
use cinder_primitives::TransactionReceipt;
use std::sync::Arc;

/// A typed wrapper over the receipts column, keyed by transaction hash.
#[derive(Debug)]
pub struct ReceiptStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ReceiptStore {
    /// Creates a new [ReceiptStore].
    pub const fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Fetches a receipt by the hash of its transaction.
    pub fn get(&self, tx_hash: B256) -> StorageResult<Option<TransactionReceipt>> {
        let Some(raw) = self.kv.get(Column::Receipts, tx_hash.as_slice())? else {
            return Ok(None);
        };
        TransactionReceipt::decode(&mut raw.as_slice())
            .map(Some)
            .map_err(|e| StorageError::corrupt("receipts", e))
    }

    /// Queues the write of a receipt.
    pub fn put(&self, batch: &mut WriteBatch, tx_hash: B256, receipt: &TransactionReceipt) {
        let mut body = Vec::new();
        alloy_rlp::Encodable::encode(receipt, &mut body);
        batch.put(Column::Receipts, tx_hash.as_slice(), body);
    }

    /// Queues the deletion of a receipt.
    pub fn delete(&self, batch: &mut WriteBatch, tx_hash: B256) {
        batch.delete(Column::Receipts, tx_hash.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKeyValueStore;

    #[test]
    fn test_put_get_delete() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let store = ReceiptStore::new(kv.clone());
        let hash = B256::repeat_byte(0x10);
        let receipt = TransactionReceipt {
            status: true,
            cumulative_gas_used: 21_000,
            gas_used: 21_000,
            ..Default::default()
        };

        let mut batch = WriteBatch::new();
        store.put(&mut batch, hash, &receipt);
        kv.write(batch).unwrap();
        assert_eq!(store.get(hash).unwrap(), Some(receipt));

        let mut batch = WriteBatch::new();
        store.delete(&mut batch, hash);
        kv.write(batch).unwrap();
        assert_eq!(store.get(hash).unwrap(), None);
    }
}
