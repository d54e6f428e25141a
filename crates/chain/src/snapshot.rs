//! The snapshot manager: captures (head, clock offset) pairs and tracks the blocks mined
//! after the earliest live snapshot, so a revert can walk from the head back to a
//! snapshot without re-reading the chain.

use alloy_primitives::B256;
use cinder_primitives::SealedBlock;

/// One captured snapshot.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    /// The head block hash at capture time.
    pub head_hash: B256,
    /// The head block number at capture time.
    pub head_number: u64,
    /// The head state root at capture time.
    pub state_root: B256,
    /// The clock offset at capture time, in milliseconds.
    pub time_offset_ms: i64,
}

/// The snapshot manager. Snapshot ids are 1-based and assigned by insertion order;
/// reverting to id `k` discards every snapshot with id ≥ `k`.
///
/// Retention is unbounded: snapshots live until an equal-or-lower revert or process end.
#[derive(Debug, Default)]
pub struct SnapshotManager {
    snaps: Vec<Snapshot>,
    /// Hashes of blocks saved after the earliest live snapshot, oldest first; the tail
    /// of the vector is the newest. Empty whenever `snaps` is empty.
    blocks: Vec<B256>,
}

impl SnapshotManager {
    /// Captures the given head and clock offset. Returns the new 1-based snapshot id.
    pub(crate) fn snapshot(&mut self, head: &SealedBlock, time_offset_ms: i64) -> u64 {
        self.snaps.push(Snapshot {
            head_hash: head.hash,
            head_number: head.number(),
            state_root: head.header().state_root,
            time_offset_ms,
        });
        debug!(target: "snapshot", id = self.snaps.len(), head = %head.hash, "snapshot taken");
        self.snaps.len() as u64
    }

    /// Records a freshly saved block. A no-op while no snapshot is live.
    pub(crate) fn on_block(&mut self, hash: B256) {
        if !self.snaps.is_empty() {
            self.blocks.push(hash);
        }
    }

    /// Whether the given id refers to a live snapshot.
    pub(crate) fn is_valid_id(&self, id: u64) -> bool {
        id >= 1 && id <= self.snaps.len() as u64
    }

    /// Takes snapshot `id`, discarding it and every later snapshot. Returns `None` for
    /// ids outside the live range.
    pub(crate) fn take(&mut self, id: u64) -> Option<Snapshot> {
        if !self.is_valid_id(id) {
            return None;
        }
        let snapshot = self.snaps[id as usize - 1].clone();
        self.snaps.truncate(id as usize - 1);
        Some(snapshot)
    }

    /// Collects, newest first, the post-snapshot block hashes above `target_head`, and
    /// resets the tracked list to the part at or below the target. When no snapshot
    /// remains live, tracking stops entirely.
    pub(crate) fn unwind_to(&mut self, target_head: B256) -> Vec<B256> {
        let mut doomed = Vec::new();
        while let Some(hash) = self.blocks.last().copied() {
            if hash == target_head {
                break;
            }
            self.blocks.pop();
            doomed.push(hash);
        }
        if self.snaps.is_empty() {
            self.blocks.clear();
        }
        doomed
    }

    /// Number of live snapshots.
    pub(crate) fn len(&self) -> usize {
        self.snaps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Header;
    use cinder_primitives::Block;

    fn head(number: u64) -> SealedBlock {
        Block::new(Header { number, ..Default::default() }, Vec::new()).seal()
    }

    #[test]
    fn test_ids_are_one_based_insertion_ordered() {
        let mut manager = SnapshotManager::default();
        assert_eq!(manager.snapshot(&head(0), 0), 1);
        assert_eq!(manager.snapshot(&head(1), 0), 2);
        assert!(manager.is_valid_id(1));
        assert!(manager.is_valid_id(2));
        assert!(!manager.is_valid_id(0));
        assert!(!manager.is_valid_id(3));
    }

    #[test]
    fn test_take_discards_higher_ids() {
        let mut manager = SnapshotManager::default();
        manager.snapshot(&head(0), 10);
        manager.snapshot(&head(1), 20);
        manager.snapshot(&head(2), 30);

        let snapshot = manager.take(2).unwrap();
        assert_eq!(snapshot.head_number, 1);
        assert_eq!(snapshot.time_offset_ms, 20);
        assert_eq!(manager.len(), 1);
        assert!(manager.take(2).is_none());
    }

    #[test]
    fn test_blocks_tracked_only_while_snapshots_live() {
        let mut manager = SnapshotManager::default();
        manager.on_block(B256::repeat_byte(0x01));
        assert!(manager.unwind_to(B256::ZERO).is_empty());

        manager.snapshot(&head(0), 0);
        manager.on_block(B256::repeat_byte(0x02));
        manager.on_block(B256::repeat_byte(0x03));

        manager.take(1).unwrap();
        let doomed = manager.unwind_to(head(0).hash);
        assert_eq!(doomed, vec![B256::repeat_byte(0x03), B256::repeat_byte(0x02)]);
        // No snapshot is live anymore, so tracking stopped.
        manager.on_block(B256::repeat_byte(0x04));
        assert!(manager.unwind_to(B256::ZERO).is_empty());
    }

    #[test]
    fn test_unwind_stops_at_target() {
        let mut manager = SnapshotManager::default();
        manager.snapshot(&head(0), 0);
        let kept = B256::repeat_byte(0xaa);
        manager.on_block(kept);
        manager.snapshot(&head(1), 0);
        manager.on_block(B256::repeat_byte(0xbb));

        manager.take(2).unwrap();
        let doomed = manager.unwind_to(kept);
        assert_eq!(doomed, vec![B256::repeat_byte(0xbb)]);

        // The earlier snapshot still tracks the kept block.
        let doomed = manager.unwind_to(head(0).hash);
        assert_eq!(doomed, vec![kept]);
    }
}
