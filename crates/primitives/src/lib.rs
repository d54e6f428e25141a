#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod account;
pub use account::TrieAccount;

pub mod block;
pub use block::{Block, BlockLogs, LogEntry, SealedBlock};

pub mod transaction;
pub use transaction::{
    intrinsic_gas, PooledTransaction, StoredTransaction, TransactionRequest,
};

pub mod receipt;
pub use receipt::{logs_bloom_for, TransactionReceipt};
