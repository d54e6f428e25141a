//! Errors for the `cinder-mpt` crate.

use alloy_primitives::B256;
use cinder_storage::StorageError;

/// A [Result] type alias where the error is [TrieError].
pub type TrieResult<T> = Result<T, TrieError>;

/// An error type for trie operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrieError {
    /// A referenced node preimage was not present in the overlay or the store.
    #[error("missing trie node: {0}")]
    MissingNode(B256),
    /// A node preimage failed to decode.
    #[error("failed to decode trie node: {0}")]
    Rlp(alloy_rlp::Error),
    /// The root was assigned while a checkpoint was still open.
    #[error("cannot assign root with an open checkpoint")]
    CheckpointOpen,
    /// `commit` or `revert` was called without a matching `checkpoint`.
    #[error("no open checkpoint")]
    NoCheckpoint,
    /// The key-value store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<alloy_rlp::Error> for TrieError {
    fn from(err: alloy_rlp::Error) -> Self {
        Self::Rlp(err)
    }
}
