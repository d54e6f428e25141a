//! Errors for the `cinder-storage` crate.

/// A [Result] type alias where the error is [StorageError].
pub type StorageResult<T> = Result<T, StorageError>;

/// An error raised by the persistence layer. Storage errors are fatal for the batch that
/// raised them; the controller aborts the affected save and leaves the head unchanged.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying key-value store rejected an operation.
    #[error("key-value store failure: {0}")]
    Backend(String),
    /// A stored record could not be decoded.
    #[error("corrupt record under {column}: {source}")]
    Corrupt {
        /// The column the record was read from.
        column: &'static str,
        /// The decoding failure.
        source: alloy_rlp::Error,
    },
}

impl StorageError {
    /// Wraps an RLP decoding failure for a record read from the given column.
    pub const fn corrupt(column: &'static str, source: alloy_rlp::Error) -> Self {
        Self::Corrupt { column, source }
    }
}
