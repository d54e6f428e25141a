//! Errors for the `cinder-chain` crate.

use crate::Status;
use alloy_primitives::Bytes;
use cinder_mpt::TrieError;
use cinder_storage::StorageError;

/// A [Result] type alias where the error is [ChainError].
pub type ChainResult<T> = Result<T, ChainError>;

/// The error type of the blockchain controller and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A transaction was rejected before entering the pool.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The VM rejected or aborted a transaction.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// An operation was invoked outside the `Started` state.
    #[error("operation rejected while {0}")]
    Lifecycle(Status),
    /// The chain head is missing, which means the database was never initialized.
    #[error("no chain head; database was not initialized")]
    MissingHead,
    /// The persistence layer failed; the affected save was aborted and the head is
    /// unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The world trie failed.
    #[error(transparent)]
    Trie(#[from] TrieError),
}

/// A transaction (or configuration) rejection raised synchronously on submission.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The envelope carries an invalid or unrecoverable signature.
    #[error("invalid transaction signature")]
    InvalidSignature,
    /// The transaction type is not supported by the development chain.
    #[error("unsupported transaction type: {0}")]
    UnsupportedType(u8),
    /// The supplied secret key does not parse as a secp256k1 scalar.
    #[error("invalid secret key")]
    InvalidSecretKey,
    /// The transaction bids below the configured minimum gas price.
    #[error("gas price {got} is below the configured minimum of {minimum}")]
    Underpriced {
        /// The transaction's bid.
        got: u128,
        /// The configured minimum.
        minimum: u128,
    },
    /// The transaction's gas limit exceeds the block gas limit.
    #[error("gas limit {gas} exceeds block gas limit {limit}")]
    ExceedsBlockGasLimit {
        /// The transaction's gas limit.
        gas: u64,
        /// The block gas limit.
        limit: u64,
    },
    /// The transaction's gas limit does not cover its intrinsic gas.
    #[error("gas limit {gas} is below the intrinsic gas of {intrinsic}")]
    IntrinsicGasTooLow {
        /// The transaction's gas limit.
        gas: u64,
        /// The intrinsic gas of the transaction.
        intrinsic: u64,
    },
    /// The transaction's nonce is below the sender's account nonce.
    #[error("nonce {tx} is lower than the sender's account nonce {account}")]
    NonceTooLow {
        /// The transaction nonce.
        tx: u64,
        /// The sender's account nonce.
        account: u64,
    },
    /// The sender cannot cover value plus the full gas allowance.
    #[error("insufficient funds: balance {balance} is below the required {required}")]
    InsufficientFunds {
        /// The sender's balance.
        balance: alloy_primitives::U256,
        /// Value plus gas-limit times gas-price.
        required: alloy_primitives::U256,
    },
    /// The configured extra data exceeds the 32-byte header field.
    #[error("extra data is {0} bytes; the header field holds at most 32")]
    ExtraDataTooLong(usize),
    /// Legacy instamine requires instant mining.
    #[error("legacyInstamine requires blockTime = 0")]
    LegacyInstamineRequiresInstamine,
}

/// A failure raised by the VM while (or just before) executing a transaction.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum RuntimeError {
    /// Intrinsic gas exceeded the supplied gas before execution began.
    #[error("base fee exceeds gas limit: {intrinsic} > {supplied}")]
    OutOfGas {
        /// The intrinsic gas of the call.
        intrinsic: u64,
        /// The gas supplied.
        supplied: u64,
    },
    /// Execution reverted; the payload is the revert data.
    #[error("VM execution reverted")]
    Reverted(Bytes),
    /// Execution halted exceptionally (out of gas, invalid opcode, ...).
    #[error("VM execution halted: {0}")]
    Halted(String),
    /// The transaction was invalid at the point of execution and was discarded without
    /// consuming gas.
    #[error("transaction invalid at execution: {0}")]
    Invalid(String),
}
