//! Block and per-block log-index types.

use alloy_consensus::{Header, TxEnvelope};
use alloy_primitives::{Log, B256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// A block of the development chain: a sealed header plus the ordered transactions that
/// were executed to produce it. Blocks are immutable once saved; revert deletes them
/// wholesale rather than rewriting history in place.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The transactions mined into the block, in execution order.
    pub transactions: Vec<TxEnvelope>,
}

impl Block {
    /// Creates a new [Block] from a header and its transactions.
    pub const fn new(header: Header, transactions: Vec<TxEnvelope>) -> Self {
        Self { header, transactions }
    }

    /// The block number.
    pub const fn number(&self) -> u64 {
        self.header.number
    }

    /// The parent block hash.
    pub const fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// Computes the block hash and pairs it with the block.
    pub fn seal(self) -> SealedBlock {
        let hash = self.header.hash_slow();
        SealedBlock { block: self, hash }
    }
}

/// A [Block] paired with its memoized hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlock {
    /// The block.
    pub block: Block,
    /// The keccak hash of the RLP-encoded header.
    pub hash: B256,
}

impl SealedBlock {
    /// The block number.
    pub const fn number(&self) -> u64 {
        self.block.number()
    }

    /// The header of the sealed block.
    pub const fn header(&self) -> &Header {
        &self.block.header
    }
}

/// One log emitted within a block, tagged with the transaction that produced it.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct LogEntry {
    /// Index of the producing transaction within the block.
    pub tx_index: u64,
    /// Hash of the producing transaction.
    pub tx_hash: B256,
    /// The log itself.
    pub log: Log,
}

/// The aggregated event logs of a single block, in (transaction, log) order. This is the
/// record backing log filters: one entry per log, keyed in storage by block number.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockLogs {
    /// Hash of the block the logs belong to.
    pub block_hash: B256,
    /// Number of the block the logs belong to.
    pub block_number: u64,
    /// The ordered log entries.
    pub entries: Vec<LogEntry>,
}

impl BlockLogs {
    /// Creates an empty log index for the given block.
    pub const fn new(block_hash: B256, block_number: u64) -> Self {
        Self { block_hash, block_number, entries: Vec::new() }
    }

    /// Appends the logs of one transaction to the index.
    pub fn extend(&mut self, tx_index: u64, tx_hash: B256, logs: &[Log]) {
        self.entries.extend(
            logs.iter().map(|log| LogEntry { tx_index, tx_hash, log: log.clone() }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, LogData};
    use alloy_rlp::{Decodable, Encodable};

    #[test]
    fn test_empty_block_rlp_roundtrip() {
        let block = Block::new(Header { number: 42, ..Default::default() }, Vec::new());
        let mut buf = Vec::new();
        block.encode(&mut buf);
        let decoded = Block::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn test_sealed_block_hash_matches_header() {
        let header = Header { number: 7, gas_limit: 12_000_000, ..Default::default() };
        let expected = header.hash_slow();
        let sealed = Block::new(header, Vec::new()).seal();
        assert_eq!(sealed.hash, expected);
        assert_eq!(sealed.number(), 7);
    }

    #[test]
    fn test_block_logs_extend_preserves_order() {
        let mut logs = BlockLogs::new(B256::repeat_byte(0xaa), 3);
        let log = Log {
            address: Address::repeat_byte(0x11),
            data: LogData::new_unchecked(vec![B256::ZERO], Bytes::new()),
        };
        logs.extend(0, B256::repeat_byte(0x01), &[log.clone(), log.clone()]);
        logs.extend(1, B256::repeat_byte(0x02), &[log]);

        assert_eq!(logs.entries.len(), 3);
        assert_eq!(logs.entries[0].tx_index, 0);
        assert_eq!(logs.entries[2].tx_index, 1);
        assert_eq!(logs.entries[2].tx_hash, B256::repeat_byte(0x02));
    }

    #[test]
    fn test_block_logs_rlp_roundtrip() {
        let mut logs = BlockLogs::new(B256::repeat_byte(0xcc), 9);
        let log = Log {
            address: Address::repeat_byte(0x33),
            data: LogData::new_unchecked(vec![B256::repeat_byte(0x44)], Bytes::from(vec![1, 2])),
        };
        logs.extend(0, B256::repeat_byte(0x05), &[log]);

        let mut buf = Vec::new();
        logs.encode(&mut buf);
        let decoded = BlockLogs::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(logs, decoded);
    }
}
