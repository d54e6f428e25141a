//! Indexed persistence for per-block log indices.

use crate::{kv::number_key, Column, KeyValueStore, StorageError, StorageResult, WriteBatch};
use alloy_rlp::Decodable;
use cinder_primitives::BlockLogs;
use std::sync::Arc;

/// A typed wrapper over the block-logs column, keyed by block number.
#[derive(Debug)]
pub struct BlockLogStore {
    kv: Arc<dyn KeyValueStore>,
}

impl BlockLogStore {
    /// Creates a new [BlockLogStore].
    pub const fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Fetches the log index of the given block number.
    pub fn get(&self, block_number: u64) -> StorageResult<Option<BlockLogs>> {
        let Some(raw) = self.kv.get(Column::BlockLogs, &number_key(block_number))? else {
            return Ok(None);
        };
        BlockLogs::decode(&mut raw.as_slice())
            .map(Some)
            .map_err(|e| StorageError::corrupt("block-logs", e))
    }

    /// Fetches the log indices of an inclusive block-number range. Block numbers are dense
    /// from genesis to head, so missing entries simply end the scan.
    pub fn range(&self, from: u64, to: u64) -> StorageResult<Vec<BlockLogs>> {
        let mut out = Vec::new();
        for number in from..=to {
            match self.get(number)? {
                Some(logs) => out.push(logs),
                None => break,
            }
        }
        Ok(out)
    }

    /// Queues the write of a block's log index.
    pub fn put(&self, batch: &mut WriteBatch, logs: &BlockLogs) {
        let mut body = Vec::new();
        alloy_rlp::Encodable::encode(logs, &mut body);
        batch.put(Column::BlockLogs, number_key(logs.block_number), body);
    }

    /// Queues the deletion of a block's log index.
    pub fn delete(&self, batch: &mut WriteBatch, block_number: u64) {
        batch.delete(Column::BlockLogs, number_key(block_number));
    }
}
