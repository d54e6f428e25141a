//! The [StateTrie]: a checkpointable Merkle Patricia Trie bound to the `trie` column of
//! the key-value store.
//!
//! One [StateTrie] instance serves both the world trie (through [StateTrie::get] and
//! friends, which track the current world root) and the per-account storage tries
//! (through the `*_at` variants, which take and return sub-trie roots). All of them share
//! the same node overlay, so a single checkpoint scopes the whole state mutation of one
//! mining round.

use crate::{TrieError, TrieNode, TrieResult};
use alloy_primitives::{keccak256, Bytes, B256};
use alloy_rlp::Decodable;
use alloy_trie::EMPTY_ROOT_HASH;
use cinder_storage::{Column, KeyValueStore, WriteBatch};
use std::collections::HashMap;
use std::sync::Arc;

/// One overlay layer, opened by `checkpoint` and closed by `commit` or `revert`.
#[derive(Debug, Default)]
struct Checkpoint {
    /// The world root at checkpoint entry, restored on revert.
    prior_root: B256,
    /// Nodes written while this checkpoint was the top of the stack.
    nodes: HashMap<B256, Bytes>,
}

/// A Merkle Patricia Trie with stack-structured transactional mutation.
///
/// Writes land in the top overlay layer. `commit` folds the top layer into the one below
/// it; committing the outermost layer moves the nodes into the staging area, from which
/// `flush` drains them into a caller-supplied [WriteBatch]. `revert` drops the top layer
/// and restores the world root recorded at checkpoint entry. Nodes already persisted are
/// never deleted, so any historical root remains resolvable.
#[derive(Debug)]
pub struct StateTrie {
    kv: Arc<dyn KeyValueStore>,
    root: B256,
    staged: HashMap<B256, Bytes>,
    checkpoints: Vec<Checkpoint>,
}

impl StateTrie {
    /// Creates a trie over the given store, rooted at the empty trie.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv, root: EMPTY_ROOT_HASH, staged: HashMap::new(), checkpoints: Vec::new() }
    }

    /// Creates a trie over the given store at a known root.
    pub fn at_root(kv: Arc<dyn KeyValueStore>, root: B256) -> Self {
        Self { kv, root, staged: HashMap::new(), checkpoints: Vec::new() }
    }

    /// The current world-state root.
    pub const fn root(&self) -> B256 {
        self.root
    }

    /// Returns `true` while at least one checkpoint is open.
    pub fn is_checkpointed(&self) -> bool {
        !self.checkpoints.is_empty()
    }

    /// Reassigns the world root without flushing. Only legal while no checkpoint is open;
    /// this is the revert path, which relies on old nodes never being pruned.
    pub fn set_root(&mut self, root: B256) -> TrieResult<()> {
        if self.is_checkpointed() {
            return Err(TrieError::CheckpointOpen);
        }
        self.root = root;
        Ok(())
    }

    /// Opens a checkpoint. Mutations made until the matching `commit` or `revert` can be
    /// discarded as a unit.
    pub fn checkpoint(&mut self) {
        self.checkpoints.push(Checkpoint { prior_root: self.root, nodes: HashMap::new() });
    }

    /// Commits the top checkpoint, folding its nodes into the layer below (or into the
    /// staging area when it is the outermost checkpoint). The current root is kept.
    pub fn commit(&mut self) -> TrieResult<()> {
        let top = self.checkpoints.pop().ok_or(TrieError::NoCheckpoint)?;
        match self.checkpoints.last_mut() {
            Some(below) => below.nodes.extend(top.nodes),
            None => self.staged.extend(top.nodes),
        }
        Ok(())
    }

    /// Reverts the top checkpoint, dropping its nodes and restoring the world root
    /// recorded at checkpoint entry.
    pub fn revert(&mut self) -> TrieResult<()> {
        let top = self.checkpoints.pop().ok_or(TrieError::NoCheckpoint)?;
        self.root = top.prior_root;
        Ok(())
    }

    /// Drains the staged nodes into the given batch. Must be called with no open
    /// checkpoint; the caller owns batch atomicity.
    pub fn flush(&mut self, batch: &mut WriteBatch) -> TrieResult<()> {
        if self.is_checkpointed() {
            return Err(TrieError::CheckpointOpen);
        }
        for (hash, encoded) in self.staged.drain() {
            batch.put(Column::Trie, hash.as_slice(), encoded.to_vec());
        }
        Ok(())
    }

    /// Fetches the value stored under `key` in the world trie.
    pub fn get(&self, key: &[u8]) -> TrieResult<Option<Bytes>> {
        self.get_at(self.root, key)
    }

    /// Inserts `value` under `key` in the world trie and advances the world root.
    pub fn insert(&mut self, key: &[u8], value: Bytes) -> TrieResult<()> {
        self.root = self.insert_at(self.root, key, value)?;
        Ok(())
    }

    /// Deletes `key` from the world trie and advances the world root.
    pub fn delete(&mut self, key: &[u8]) -> TrieResult<()> {
        self.root = self.delete_at(self.root, key)?;
        Ok(())
    }

    /// Fetches the value stored under `key` in the sub-trie rooted at `root`.
    pub fn get_at(&self, root: B256, key: &[u8]) -> TrieResult<Option<Bytes>> {
        let mut node = self.node(root)?;
        let path = unpack_nibbles(key);
        let mut offset = 0;

        loop {
            match node {
                TrieNode::Empty => return Ok(None),
                TrieNode::Leaf { path: node_path, value } => {
                    return Ok((path[offset..] == node_path[..]).then_some(value));
                }
                TrieNode::Extension { path: prefix, child } => {
                    if !path[offset..].starts_with(&prefix) {
                        return Ok(None);
                    }
                    offset += prefix.len();
                    node = self.node(child)?;
                }
                TrieNode::Branch { children, value } => {
                    if offset == path.len() {
                        return Ok(value);
                    }
                    match children[path[offset] as usize] {
                        Some(child) => {
                            offset += 1;
                            node = self.node(child)?;
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Inserts `value` under `key` in the sub-trie rooted at `root`, returning the new
    /// sub-trie root.
    pub fn insert_at(&mut self, root: B256, key: &[u8], value: Bytes) -> TrieResult<B256> {
        let node = self.node(root)?;
        let new_node = self.insert_node(node, &unpack_nibbles(key), value)?;
        Ok(self.store_node(&new_node))
    }

    /// Deletes `key` from the sub-trie rooted at `root`, returning the new sub-trie root.
    /// Deleting an absent key leaves the root unchanged.
    pub fn delete_at(&mut self, root: B256, key: &[u8]) -> TrieResult<B256> {
        let node = self.node(root)?;
        match self.remove_node(node, &unpack_nibbles(key))? {
            None => Ok(root),
            Some(TrieNode::Empty) => Ok(EMPTY_ROOT_HASH),
            Some(new_node) => Ok(self.store_node(&new_node)),
        }
    }

    /// Stages a contract bytecode blob under its keccak hash. Code shares the trie column
    /// and its checkpoint lifecycle, so an aborted mining round drops staged code too.
    pub fn put_code(&mut self, code: &[u8]) -> B256 {
        let hash = keccak256(code);
        self.layer_mut().insert(hash, Bytes::copy_from_slice(code));
        hash
    }

    /// Fetches a contract bytecode blob by hash.
    pub fn code_by_hash(&self, hash: B256) -> TrieResult<Option<Bytes>> {
        self.raw(hash)
    }

    fn layer_mut(&mut self) -> &mut HashMap<B256, Bytes> {
        self.checkpoints.last_mut().map_or(&mut self.staged, |cp| &mut cp.nodes)
    }

    /// Resolves a raw preimage from the overlay stack, the staging area, or the store.
    fn raw(&self, hash: B256) -> TrieResult<Option<Bytes>> {
        for checkpoint in self.checkpoints.iter().rev() {
            if let Some(encoded) = checkpoint.nodes.get(&hash) {
                return Ok(Some(encoded.clone()));
            }
        }
        if let Some(encoded) = self.staged.get(&hash) {
            return Ok(Some(encoded.clone()));
        }
        Ok(self.kv.get(Column::Trie, hash.as_slice())?.map(Into::into))
    }

    /// Resolves and decodes the node referenced by `hash`.
    fn node(&self, hash: B256) -> TrieResult<TrieNode> {
        if hash == EMPTY_ROOT_HASH {
            return Ok(TrieNode::Empty);
        }
        let encoded = self.raw(hash)?.ok_or(TrieError::MissingNode(hash))?;
        Ok(TrieNode::decode(&mut encoded.as_ref())?)
    }

    /// Encodes and stages a node, returning its hash.
    fn store_node(&mut self, node: &TrieNode) -> B256 {
        if matches!(node, TrieNode::Empty) {
            return EMPTY_ROOT_HASH;
        }
        let encoded = Bytes::from(node.encoded());
        let hash = keccak256(&encoded);
        self.layer_mut().insert(hash, encoded);
        hash
    }

    fn insert_node(&mut self, node: TrieNode, path: &[u8], value: Bytes) -> TrieResult<TrieNode> {
        match node {
            TrieNode::Empty => Ok(TrieNode::Leaf { path: path.to_vec(), value }),
            TrieNode::Leaf { path: leaf_path, value: leaf_value } => {
                let common = common_prefix_len(&leaf_path, path);
                if common == leaf_path.len() && common == path.len() {
                    return Ok(TrieNode::Leaf { path: path.to_vec(), value });
                }

                let mut children = Box::new([None; 16]);
                let mut branch_value = None;
                if leaf_path.len() == common {
                    branch_value = Some(leaf_value);
                } else {
                    let child = TrieNode::Leaf {
                        path: leaf_path[common + 1..].to_vec(),
                        value: leaf_value,
                    };
                    children[leaf_path[common] as usize] = Some(self.store_node(&child));
                }
                if path.len() == common {
                    branch_value = Some(value);
                } else {
                    let child =
                        TrieNode::Leaf { path: path[common + 1..].to_vec(), value };
                    children[path[common] as usize] = Some(self.store_node(&child));
                }

                Ok(self.wrap_prefix(&path[..common], TrieNode::Branch { children, value: branch_value }))
            }
            TrieNode::Extension { path: ext_path, child } => {
                let common = common_prefix_len(&ext_path, path);
                if common == ext_path.len() {
                    let child_node = self.node(child)?;
                    let new_child = self.insert_node(child_node, &path[common..], value)?;
                    let child = self.store_node(&new_child);
                    return Ok(TrieNode::Extension { path: ext_path, child });
                }

                // The extension diverges: split it around a new branch.
                let mut children = Box::new([None; 16]);
                let mut branch_value = None;
                let ext_rest = &ext_path[common + 1..];
                children[ext_path[common] as usize] = Some(if ext_rest.is_empty() {
                    child
                } else {
                    self.store_node(&TrieNode::Extension { path: ext_rest.to_vec(), child })
                });
                if path.len() == common {
                    branch_value = Some(value);
                } else {
                    let leaf = TrieNode::Leaf { path: path[common + 1..].to_vec(), value };
                    children[path[common] as usize] = Some(self.store_node(&leaf));
                }

                Ok(self.wrap_prefix(&path[..common], TrieNode::Branch { children, value: branch_value }))
            }
            TrieNode::Branch { mut children, value: branch_value } => {
                if path.is_empty() {
                    return Ok(TrieNode::Branch { children, value: Some(value) });
                }
                let index = path[0] as usize;
                let child_node = match children[index] {
                    Some(hash) => self.node(hash)?,
                    None => TrieNode::Empty,
                };
                let new_child = self.insert_node(child_node, &path[1..], value)?;
                children[index] = Some(self.store_node(&new_child));
                Ok(TrieNode::Branch { children, value: branch_value })
            }
        }
    }

    /// Wraps `node` in an extension carrying `prefix`, when the prefix is non-empty.
    fn wrap_prefix(&mut self, prefix: &[u8], node: TrieNode) -> TrieNode {
        if prefix.is_empty() {
            node
        } else {
            let child = self.store_node(&node);
            TrieNode::Extension { path: prefix.to_vec(), child }
        }
    }

    /// Removes `path` from the subtree rooted at `node`. Returns `None` when the key was
    /// absent (the subtree is untouched), or the replacement node otherwise.
    fn remove_node(&mut self, node: TrieNode, path: &[u8]) -> TrieResult<Option<TrieNode>> {
        match node {
            TrieNode::Empty => Ok(None),
            TrieNode::Leaf { path: leaf_path, .. } => {
                Ok((leaf_path[..] == *path).then_some(TrieNode::Empty))
            }
            TrieNode::Extension { path: ext_path, child } => {
                if !path.starts_with(&ext_path) {
                    return Ok(None);
                }
                let child_node = self.node(child)?;
                let Some(new_child) = self.remove_node(child_node, &path[ext_path.len()..])?
                else {
                    return Ok(None);
                };
                // Splice the extension with whatever its subtree collapsed into.
                Ok(Some(match new_child {
                    TrieNode::Empty => TrieNode::Empty,
                    TrieNode::Leaf { path: rest, value } => {
                        TrieNode::Leaf { path: concat_paths(&ext_path, &rest), value }
                    }
                    TrieNode::Extension { path: rest, child } => {
                        TrieNode::Extension { path: concat_paths(&ext_path, &rest), child }
                    }
                    branch => {
                        let child = self.store_node(&branch);
                        TrieNode::Extension { path: ext_path, child }
                    }
                }))
            }
            TrieNode::Branch { mut children, value } => {
                if path.is_empty() {
                    if value.is_none() {
                        return Ok(None);
                    }
                    return self.normalize_branch(children, None).map(Some);
                }
                let index = path[0] as usize;
                let Some(child_hash) = children[index] else {
                    return Ok(None);
                };
                let child_node = self.node(child_hash)?;
                let Some(new_child) = self.remove_node(child_node, &path[1..])? else {
                    return Ok(None);
                };
                children[index] = match new_child {
                    TrieNode::Empty => None,
                    other => Some(self.store_node(&other)),
                };
                self.normalize_branch(children, value).map(Some)
            }
        }
    }

    /// Collapses a branch that may have dropped below two references: a branch with only
    /// a value becomes a leaf, a branch with a single child merges into it.
    fn normalize_branch(
        &mut self,
        children: Box<[Option<B256>; 16]>,
        value: Option<Bytes>,
    ) -> TrieResult<TrieNode> {
        let mut live = children.iter().enumerate().filter_map(|(i, c)| c.map(|h| (i as u8, h)));
        let first = live.next();
        let second = live.next();

        match (first, second, value) {
            (None, _, None) => Ok(TrieNode::Empty),
            (None, _, Some(value)) => Ok(TrieNode::Leaf { path: Vec::new(), value }),
            (Some((index, hash)), None, None) => Ok(match self.node(hash)? {
                TrieNode::Leaf { path, value } => {
                    TrieNode::Leaf { path: concat_paths(&[index], &path), value }
                }
                TrieNode::Extension { path, child } => {
                    TrieNode::Extension { path: concat_paths(&[index], &path), child }
                }
                _ => TrieNode::Extension { path: vec![index], child: hash },
            }),
            (_, _, value) => Ok(TrieNode::Branch { children, value }),
        }
    }
}

/// Unpacks a byte key into nibbles.
fn unpack_nibbles(key: &[u8]) -> Vec<u8> {
    key.iter().flat_map(|byte| [byte >> 4, byte & 0x0f]).collect()
}

/// The length of the shared prefix of two nibble paths.
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn concat_paths(prefix: &[u8], rest: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + rest.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_storage::MemoryKeyValueStore;
    use proptest::{collection::vec, prelude::*};
    use std::collections::BTreeMap;

    fn new_trie() -> StateTrie {
        StateTrie::new(Arc::new(MemoryKeyValueStore::new()))
    }

    fn key(byte: u8) -> [u8; 32] {
        keccak256([byte]).0
    }

    #[test]
    fn test_empty_trie_root() {
        let trie = new_trie();
        assert_eq!(trie.root(), EMPTY_ROOT_HASH);
        assert_eq!(trie.get(&key(0)).unwrap(), None);
    }

    #[test]
    fn test_insert_then_get() {
        let mut trie = new_trie();
        trie.insert(&key(1), Bytes::from(vec![0x01])).unwrap();
        trie.insert(&key(2), Bytes::from(vec![0x02])).unwrap();

        assert_eq!(trie.get(&key(1)).unwrap(), Some(Bytes::from(vec![0x01])));
        assert_eq!(trie.get(&key(2)).unwrap(), Some(Bytes::from(vec![0x02])));
        assert_eq!(trie.get(&key(3)).unwrap(), None);
    }

    #[test]
    fn test_overwrite_changes_root() {
        let mut trie = new_trie();
        trie.insert(&key(1), Bytes::from(vec![0x01])).unwrap();
        let first = trie.root();
        trie.insert(&key(1), Bytes::from(vec![0x02])).unwrap();
        assert_ne!(trie.root(), first);
        assert_eq!(trie.get(&key(1)).unwrap(), Some(Bytes::from(vec![0x02])));
    }

    #[test]
    fn test_delete_restores_prior_root() {
        let mut trie = new_trie();
        trie.insert(&key(1), Bytes::from(vec![0x01])).unwrap();
        let one = trie.root();
        trie.insert(&key(2), Bytes::from(vec![0x02])).unwrap();
        trie.delete(&key(2)).unwrap();
        assert_eq!(trie.root(), one);

        trie.delete(&key(1)).unwrap();
        assert_eq!(trie.root(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_delete_absent_key_is_noop() {
        let mut trie = new_trie();
        trie.insert(&key(1), Bytes::from(vec![0x01])).unwrap();
        let root = trie.root();
        trie.delete(&key(9)).unwrap();
        assert_eq!(trie.root(), root);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut forward = new_trie();
        let mut reverse = new_trie();
        for byte in 0..32u8 {
            forward.insert(&key(byte), Bytes::from(vec![byte])).unwrap();
        }
        for byte in (0..32u8).rev() {
            reverse.insert(&key(byte), Bytes::from(vec![byte])).unwrap();
        }
        assert_eq!(forward.root(), reverse.root());
    }

    #[test]
    fn test_checkpoint_revert_restores_root_and_state() {
        let mut trie = new_trie();
        trie.insert(&key(1), Bytes::from(vec![0x01])).unwrap();
        let root = trie.root();

        trie.checkpoint();
        trie.insert(&key(2), Bytes::from(vec![0x02])).unwrap();
        assert_ne!(trie.root(), root);
        trie.revert().unwrap();

        assert_eq!(trie.root(), root);
        assert_eq!(trie.get(&key(2)).unwrap(), None);
    }

    #[test]
    fn test_nested_checkpoints() {
        let mut trie = new_trie();
        trie.checkpoint();
        trie.insert(&key(1), Bytes::from(vec![0x01])).unwrap();
        trie.checkpoint();
        trie.insert(&key(2), Bytes::from(vec![0x02])).unwrap();

        trie.revert().unwrap();
        assert_eq!(trie.get(&key(2)).unwrap(), None);
        assert_eq!(trie.get(&key(1)).unwrap(), Some(Bytes::from(vec![0x01])));

        trie.commit().unwrap();
        assert!(!trie.is_checkpointed());
        assert_eq!(trie.get(&key(1)).unwrap(), Some(Bytes::from(vec![0x01])));
    }

    #[test]
    fn test_set_root_rejected_under_checkpoint() {
        let mut trie = new_trie();
        trie.checkpoint();
        assert_eq!(trie.set_root(EMPTY_ROOT_HASH), Err(TrieError::CheckpointOpen));
        trie.revert().unwrap();
        assert!(trie.set_root(EMPTY_ROOT_HASH).is_ok());
    }

    #[test]
    fn test_flush_persists_and_old_roots_stay_readable() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let mut trie = StateTrie::new(kv.clone());

        trie.checkpoint();
        trie.insert(&key(1), Bytes::from(vec![0x01])).unwrap();
        trie.commit().unwrap();
        let first_root = trie.root();

        let mut batch = WriteBatch::new();
        trie.flush(&mut batch).unwrap();
        kv.write(batch).unwrap();

        trie.checkpoint();
        trie.insert(&key(1), Bytes::from(vec![0xff])).unwrap();
        trie.commit().unwrap();
        let mut batch = WriteBatch::new();
        trie.flush(&mut batch).unwrap();
        kv.write(batch).unwrap();

        // A fresh trie at the old root still reads the old value: nothing was pruned.
        let historical = StateTrie::at_root(kv, first_root);
        assert_eq!(historical.get(&key(1)).unwrap(), Some(Bytes::from(vec![0x01])));
    }

    #[test]
    fn test_sub_trie_roots_are_independent() {
        let mut trie = new_trie();
        let storage_root =
            trie.insert_at(EMPTY_ROOT_HASH, &key(7), Bytes::from(vec![0xaa])).unwrap();
        assert_eq!(trie.root(), EMPTY_ROOT_HASH);
        assert_eq!(trie.get_at(storage_root, &key(7)).unwrap(), Some(Bytes::from(vec![0xaa])));

        let pruned = trie.delete_at(storage_root, &key(7)).unwrap();
        assert_eq!(pruned, EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_code_follows_checkpoint_lifecycle() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let mut trie = StateTrie::new(kv.clone());

        trie.checkpoint();
        let hash = trie.put_code(&[0x60, 0x00]);
        trie.revert().unwrap();
        assert_eq!(trie.code_by_hash(hash).unwrap(), None);

        trie.checkpoint();
        let hash = trie.put_code(&[0x60, 0x00]);
        trie.commit().unwrap();
        let mut batch = WriteBatch::new();
        trie.flush(&mut batch).unwrap();
        kv.write(batch).unwrap();
        assert_eq!(trie.code_by_hash(hash).unwrap(), Some(Bytes::from(vec![0x60, 0x00])));
    }

    proptest! {
        /// The trie agrees with a map reference model under arbitrary insert/delete
        /// interleavings, and deleting everything returns to the empty root.
        #[test]
        fn matches_reference_model(ops in vec((any::<u8>(), any::<bool>(), vec(any::<u8>(), 1..8)), 1..64)) {
            let mut trie = new_trie();
            let mut model: BTreeMap<[u8; 32], Vec<u8>> = BTreeMap::new();

            for (seed, is_insert, value) in ops {
                let key = key(seed);
                if is_insert {
                    trie.insert(&key, Bytes::from(value.clone())).unwrap();
                    model.insert(key, value);
                } else {
                    trie.delete(&key).unwrap();
                    model.remove(&key);
                }
            }

            for (key, value) in &model {
                prop_assert_eq!(trie.get(key).unwrap(), Some(Bytes::from(value.clone())));
            }

            for key in model.keys() {
                trie.delete(key).unwrap();
            }
            prop_assert_eq!(trie.root(), EMPTY_ROOT_HASH);
        }

        /// Two permutations of the same entry set produce the same root.
        #[test]
        fn root_is_order_independent(mut seeds in vec(any::<u8>(), 1..24)) {
            seeds.sort_unstable();
            seeds.dedup();

            let mut forward = new_trie();
            for seed in &seeds {
                forward.insert(&key(*seed), Bytes::from(vec![*seed])).unwrap();
            }
            let mut reverse = new_trie();
            for seed in seeds.iter().rev() {
                reverse.insert(&key(*seed), Bytes::from(vec![*seed])).unwrap();
            }
            prop_assert_eq!(forward.root(), reverse.root());
        }
    }
}
