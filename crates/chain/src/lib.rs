#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod errors;
pub use errors::{ChainError, ChainResult, RuntimeError, ValidationError};

mod hardfork;
pub use hardfork::Hardfork;

mod options;
pub use options::{ChainOptions, Coinbase, EthereumOptions, MinerOptions, WalletOptions};

mod clock;
pub use clock::Clock;

mod events;
pub use events::{ChainEvents, Status};

mod accounts;
pub use accounts::{derive_dev_accounts, AccountManager, DevAccount};

mod pool;
pub use pool::TransactionPool;

mod vm;
pub use vm::{CallRequest, StateDatabase};

mod miner;
pub use miner::{BlockTemplate, MinedBlock, Miner};

mod snapshot;
pub use snapshot::SnapshotManager;

mod blockchain;
pub use blockchain::Blockchain;
