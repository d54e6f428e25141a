//! Indexed persistence for blocks.

use crate::{kv::number_key, Column, KeyValueStore, StorageError, StorageResult, WriteBatch};
use alloy_primitives::B256;
use alloy_rlp::Decodable;
use cinder_primitives::{Block, SealedBlock};
use std::sync::{Arc, RwLock};

/// Meta key within the blocks column holding the hash of the chain head. Six bytes, so it
/// can never collide with the 8-byte number index or the 32-byte hash keys.
const LATEST_KEY: &[u8] = b"latest";

/// A typed wrapper over the blocks column.
///
/// Blocks are stored by hash; a secondary index maps each block number (big-endian) to the
/// block hash. The store memoizes the `earliest` and `latest` pointers, and the controller
/// is the sole writer of `latest`.
#[derive(Debug)]
pub struct BlockStore {
    kv: Arc<dyn KeyValueStore>,
    earliest: RwLock<Option<SealedBlock>>,
    latest: RwLock<Option<SealedBlock>>,
}

impl BlockStore {
    /// Creates a new [BlockStore], hydrating the `earliest` and `latest` memos from the
    /// store if a chain is already present.
    pub fn open(kv: Arc<dyn KeyValueStore>) -> StorageResult<Self> {
        let store = Self { kv, earliest: RwLock::new(None), latest: RwLock::new(None) };

        if let Some(raw) = store.kv.get(Column::Blocks, LATEST_KEY)? {
            let hash = B256::from_slice(&raw);
            let latest = store
                .by_hash(hash)?
                .ok_or_else(|| StorageError::Backend("dangling latest pointer".to_string()))?;
            let earliest = store
                .by_number(0)?
                .ok_or_else(|| StorageError::Backend("missing genesis block".to_string()))?;
            *store.earliest.write().expect("memo lock poisoned") = Some(earliest);
            *store.latest.write().expect("memo lock poisoned") = Some(latest);
        }

        Ok(store)
    }

    /// Fetches a block by hash.
    pub fn by_hash(&self, hash: B256) -> StorageResult<Option<SealedBlock>> {
        let Some(raw) = self.kv.get(Column::Blocks, hash.as_slice())? else {
            return Ok(None);
        };
        let block = Block::decode(&mut raw.as_slice())
            .map_err(|e| StorageError::corrupt("blocks", e))?;
        Ok(Some(SealedBlock { block, hash }))
    }

    /// Fetches a block through the number index.
    pub fn by_number(&self, number: u64) -> StorageResult<Option<SealedBlock>> {
        match self.hash_by_number(number)? {
            Some(hash) => self.by_hash(hash),
            None => Ok(None),
        }
    }

    /// Resolves a block number to its hash.
    pub fn hash_by_number(&self, number: u64) -> StorageResult<Option<B256>> {
        Ok(self
            .kv
            .get(Column::Blocks, &number_key(number))?
            .map(|raw| B256::from_slice(&raw)))
    }

    /// The memoized chain head.
    pub fn latest(&self) -> Option<SealedBlock> {
        self.latest.read().expect("memo lock poisoned").clone()
    }

    /// The memoized earliest block (genesis).
    pub fn earliest(&self) -> Option<SealedBlock> {
        self.earliest.read().expect("memo lock poisoned").clone()
    }

    /// Queues the writes for a new block: the body by hash, the number index entry, and
    /// the head pointer. Must be called inside the controller's block-commit batch.
    pub fn put(&self, batch: &mut WriteBatch, sealed: &SealedBlock) {
        let mut body = Vec::new();
        alloy_rlp::Encodable::encode(&sealed.block, &mut body);
        batch.put(Column::Blocks, sealed.hash.as_slice(), body);
        batch.put(Column::Blocks, number_key(sealed.number()), sealed.hash.as_slice());
        batch.put(Column::Blocks, LATEST_KEY, sealed.hash.as_slice());
    }

    /// Queues the deletion of a block body and its number index entry.
    pub fn delete(&self, batch: &mut WriteBatch, hash: B256, number: u64) {
        batch.delete(Column::Blocks, hash.as_slice());
        batch.delete(Column::Blocks, number_key(number));
    }

    /// Queues a rewrite of the head pointer, used when a revert moves the head backwards.
    pub fn put_latest_pointer(&self, batch: &mut WriteBatch, hash: B256) {
        batch.put(Column::Blocks, LATEST_KEY, hash.as_slice());
    }

    /// Replaces the memoized head after its batch has been committed.
    pub fn set_latest(&self, sealed: SealedBlock) {
        let mut latest = self.latest.write().expect("memo lock poisoned");
        if sealed.number() == 0 {
            *self.earliest.write().expect("memo lock poisoned") = Some(sealed.clone());
        }
        *latest = Some(sealed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKeyValueStore;
    use alloy_consensus::Header;

    fn sealed(number: u64) -> SealedBlock {
        Block::new(Header { number, ..Default::default() }, Vec::new()).seal()
    }

    fn committed_store(blocks: &[SealedBlock]) -> BlockStore {
        let store = BlockStore::open(Arc::new(MemoryKeyValueStore::new())).unwrap();
        for block in blocks {
            let mut batch = WriteBatch::new();
            store.put(&mut batch, block);
            store.kv.write(batch).unwrap();
            store.set_latest(block.clone());
        }
        store
    }

    #[test]
    fn test_put_then_get_by_hash_and_number() {
        let genesis = sealed(0);
        let store = committed_store(std::slice::from_ref(&genesis));

        assert_eq!(store.by_hash(genesis.hash).unwrap(), Some(genesis.clone()));
        assert_eq!(store.by_number(0).unwrap(), Some(genesis.clone()));
        assert_eq!(store.hash_by_number(0).unwrap(), Some(genesis.hash));
        assert_eq!(store.by_number(1).unwrap(), None);
    }

    #[test]
    fn test_latest_and_earliest_memos() {
        let genesis = sealed(0);
        let one = sealed(1);
        let store = committed_store(&[genesis.clone(), one.clone()]);

        assert_eq!(store.earliest(), Some(genesis));
        assert_eq!(store.latest(), Some(one));
    }

    #[test]
    fn test_open_rehydrates_memos() {
        let genesis = sealed(0);
        let one = sealed(1);
        let kv = {
            let store = committed_store(&[genesis.clone(), one.clone()]);
            store.kv
        };

        let reopened = BlockStore::open(kv).unwrap();
        assert_eq!(reopened.earliest(), Some(genesis));
        assert_eq!(reopened.latest(), Some(one));
    }

    #[test]
    fn test_delete_removes_both_keys() {
        let genesis = sealed(0);
        let one = sealed(1);
        let store = committed_store(&[genesis.clone(), one.clone()]);

        let mut batch = WriteBatch::new();
        store.delete(&mut batch, one.hash, one.number());
        store.put_latest_pointer(&mut batch, genesis.hash);
        store.kv.write(batch).unwrap();
        store.set_latest(genesis.clone());

        assert_eq!(store.by_hash(one.hash).unwrap(), None);
        assert_eq!(store.hash_by_number(1).unwrap(), None);
        assert_eq!(store.latest(), Some(genesis));
    }
}
