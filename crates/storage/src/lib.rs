#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod errors;
pub use errors::{StorageError, StorageResult};

mod kv;
pub use kv::{BatchOp, Column, KeyValueStore, MemoryKeyValueStore, WriteBatch};

mod blocks;
pub use blocks::BlockStore;

mod transactions;
pub use transactions::TransactionStore;

mod receipts;
pub use receipts::ReceiptStore;

mod logs;
pub use logs::BlockLogStore;
