//! The persisted transaction receipt.

use alloy_primitives::{Address, Bloom, Log};
use alloy_rlp::{Buf, Decodable, Encodable};

/// Computes the bloom filter covering the given logs.
pub fn logs_bloom_for<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        bloom.accrue_log(log);
    }
    bloom
}

/// The receipt recorded for every mined transaction, keyed by transaction hash.
///
/// Unlike a consensus receipt this record also carries the created contract address, so
/// the RPC layer can answer `eth_getTransactionReceipt` without re-deriving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Whether execution succeeded.
    pub status: bool,
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Gas used by this transaction alone.
    pub gas_used: u64,
    /// Bloom filter over this transaction's logs.
    pub logs_bloom: Bloom,
    /// Logs emitted by this transaction.
    pub logs: Vec<Log>,
    /// Address of the created contract, for creation transactions.
    pub contract_address: Option<Address>,
}

impl TransactionReceipt {
    fn payload_length(&self) -> usize {
        let contract: &[u8] = self.contract_address.as_ref().map_or(&[], |a| a.as_slice());
        self.status.length()
            + self.cumulative_gas_used.length()
            + self.gas_used.length()
            + self.logs_bloom.length()
            + self.logs.length()
            + contract.length()
    }
}

impl Encodable for TransactionReceipt {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        alloy_rlp::Header { list: true, payload_length: self.payload_length() }.encode(out);
        self.status.encode(out);
        self.cumulative_gas_used.encode(out);
        self.gas_used.encode(out);
        self.logs_bloom.encode(out);
        self.logs.encode(out);
        // The contract address is encoded as a byte string, empty for non-creations.
        let contract: &[u8] = self.contract_address.as_ref().map_or(&[], |a| a.as_slice());
        contract.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for TransactionReceipt {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = alloy_rlp::Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        let started_len = buf.len();

        let status = bool::decode(buf)?;
        let cumulative_gas_used = u64::decode(buf)?;
        let gas_used = u64::decode(buf)?;
        let logs_bloom = Bloom::decode(buf)?;
        let logs = Vec::<Log>::decode(buf)?;
        let contract = alloy_primitives::Bytes::decode(buf)?;
        let contract_address = match contract.len() {
            0 => None,
            20 => Some(Address::from_slice(&contract)),
            _ => return Err(alloy_rlp::Error::UnexpectedLength),
        };

        let consumed = started_len - buf.len();
        if consumed != header.payload_length {
            // Skip any trailing payload bytes so the outer list stays aligned.
            if consumed > header.payload_length {
                return Err(alloy_rlp::Error::UnexpectedLength);
            }
            buf.advance(header.payload_length - consumed);
        }

        Ok(Self { status, cumulative_gas_used, gas_used, logs_bloom, logs, contract_address })
    }
}
