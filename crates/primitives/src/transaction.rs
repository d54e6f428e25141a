//! Transaction types for the development chain: the user-facing [TransactionRequest], the
//! pool-internal [PooledTransaction], and the persisted [StoredTransaction] record.

use alloy_consensus::{TxEnvelope, TxLegacy};
use alloy_eips::eip2718::{Decodable2718, Encodable2718};
use alloy_primitives::{Address, Bytes, SignatureError, TxKind, B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// Base gas charged for every transaction.
pub const TX_BASE_GAS: u64 = 21_000;

/// Additional gas charged for contract-creating transactions.
pub const TX_CREATE_GAS: u64 = 32_000;

/// Gas charged per zero byte of calldata.
const TX_DATA_ZERO_GAS: u64 = 4;

/// Gas charged per non-zero byte of calldata.
const TX_DATA_NON_ZERO_GAS: u64 = 16;

/// Computes the intrinsic gas of a transaction: the fixed cost charged before the VM
/// begins executing, consisting of the base fee, the calldata cost, and the creation
/// surcharge for transactions without a recipient.
pub fn intrinsic_gas(to: TxKind, input: &[u8]) -> u64 {
    let data_gas: u64 = input
        .iter()
        .map(|byte| if *byte == 0 { TX_DATA_ZERO_GAS } else { TX_DATA_NON_ZERO_GAS })
        .sum();
    let create_gas = if to.is_create() { TX_CREATE_GAS } else { 0 };
    TX_BASE_GAS + data_gas + create_gas
}

/// A user-supplied transaction with optional fields. Missing fields are filled with the
/// configured defaults when the request is queued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    /// The recipient of the transaction. `None` creates a contract.
    pub to: Option<Address>,
    /// Transaction nonce. Defaults to the sender's next executable nonce.
    pub nonce: Option<u64>,
    /// Gas limit. Defaults to the configured default transaction gas limit.
    pub gas: Option<u64>,
    /// Gas price in wei. Defaults to the configured miner gas price.
    pub gas_price: Option<u128>,
    /// Value transferred, in wei.
    pub value: U256,
    /// Call data / init code.
    pub input: Bytes,
}

impl TransactionRequest {
    /// Builds the legacy transaction body for this request, using the supplied defaults for
    /// any field left unset.
    pub fn into_legacy(
        self,
        chain_id: u64,
        nonce: u64,
        gas_limit: u64,
        gas_price: u128,
    ) -> TxLegacy {
        TxLegacy {
            chain_id: Some(chain_id),
            nonce: self.nonce.unwrap_or(nonce),
            gas_price: self.gas_price.unwrap_or(gas_price),
            gas_limit: self.gas.unwrap_or(gas_limit),
            to: self.to.map_or(TxKind::Create, TxKind::Call),
            value: self.value,
            input: self.input,
        }
    }

    /// The destination of the request as a [TxKind].
    pub fn kind(&self) -> TxKind {
        self.to.map_or(TxKind::Create, TxKind::Call)
    }
}

/// An error converting a signed envelope into a [PooledTransaction].
#[derive(Debug, thiserror::Error)]
pub enum PooledConversionError {
    /// The envelope's transaction type is not supported by the development chain.
    #[error("unsupported transaction type: {0}")]
    UnsupportedType(u8),
    /// The signature could not be recovered to a sender address.
    #[error("signature recovery failed: {0}")]
    Signature(#[from] SignatureError),
}

/// A validated transaction held by the pool: the signed envelope alongside its recovered
/// sender, its hash, and the raw EIP-2718 encoding used for persistence.
#[derive(Debug, Clone)]
pub struct PooledTransaction {
    /// The signed transaction envelope.
    pub envelope: TxEnvelope,
    /// The sender, recovered from the signature.
    pub sender: Address,
    /// The transaction hash.
    pub hash: B256,
    /// The raw EIP-2718 encoding of the envelope.
    pub raw: Bytes,
    /// First-seen ordering across senders, assigned by the pool.
    pub arrival: u64,
}

impl PooledTransaction {
    /// Validates the envelope's signature and builds a [PooledTransaction].
    ///
    /// The arrival index is assigned later, when the pool admits the transaction.
    pub fn from_envelope(envelope: TxEnvelope) -> Result<Self, PooledConversionError> {
        let sender = match &envelope {
            TxEnvelope::Legacy(signed) => signed.recover_signer()?,
            TxEnvelope::Eip2930(signed) => signed.recover_signer()?,
            TxEnvelope::Eip1559(signed) => signed.recover_signer()?,
            other => return Err(PooledConversionError::UnsupportedType(other.tx_type() as u8)),
        };
        let hash = *envelope.tx_hash();
        let raw = envelope.encoded_2718().into();
        Ok(Self { envelope, sender, hash, raw, arrival: 0 })
    }

    /// The transaction nonce.
    pub fn nonce(&self) -> u64 {
        match &self.envelope {
            TxEnvelope::Legacy(signed) => signed.tx().nonce,
            TxEnvelope::Eip2930(signed) => signed.tx().nonce,
            TxEnvelope::Eip1559(signed) => signed.tx().nonce,
            _ => unreachable!("unsupported types are rejected on construction"),
        }
    }

    /// The gas limit of the transaction.
    pub fn gas_limit(&self) -> u64 {
        match &self.envelope {
            TxEnvelope::Legacy(signed) => signed.tx().gas_limit,
            TxEnvelope::Eip2930(signed) => signed.tx().gas_limit,
            TxEnvelope::Eip1559(signed) => signed.tx().gas_limit,
            _ => unreachable!("unsupported types are rejected on construction"),
        }
    }

    /// The price the transaction bids per unit of gas, used for ordering across senders.
    pub fn gas_price(&self) -> u128 {
        match &self.envelope {
            TxEnvelope::Legacy(signed) => signed.tx().gas_price,
            TxEnvelope::Eip2930(signed) => signed.tx().gas_price,
            TxEnvelope::Eip1559(signed) => signed.tx().max_fee_per_gas,
            _ => unreachable!("unsupported types are rejected on construction"),
        }
    }

    /// The value transferred by the transaction.
    pub fn value(&self) -> U256 {
        match &self.envelope {
            TxEnvelope::Legacy(signed) => signed.tx().value,
            TxEnvelope::Eip2930(signed) => signed.tx().value,
            TxEnvelope::Eip1559(signed) => signed.tx().value,
            _ => unreachable!("unsupported types are rejected on construction"),
        }
    }

    /// The destination of the transaction.
    pub fn kind(&self) -> TxKind {
        match &self.envelope {
            TxEnvelope::Legacy(signed) => signed.tx().to,
            TxEnvelope::Eip2930(signed) => signed.tx().to,
            TxEnvelope::Eip1559(signed) => signed.tx().to,
            _ => unreachable!("unsupported types are rejected on construction"),
        }
    }

    /// The calldata of the transaction.
    pub fn input(&self) -> &Bytes {
        match &self.envelope {
            TxEnvelope::Legacy(signed) => &signed.tx().input,
            TxEnvelope::Eip2930(signed) => &signed.tx().input,
            TxEnvelope::Eip1559(signed) => &signed.tx().input,
            _ => unreachable!("unsupported types are rejected on construction"),
        }
    }

    /// The intrinsic gas of the transaction.
    pub fn intrinsic_gas(&self) -> u64 {
        intrinsic_gas(self.kind(), self.input())
    }

    /// Upper bound on the wei the sender must hold for this transaction: the transferred
    /// value plus the full gas allowance at the bid price.
    pub fn max_cost(&self) -> U256 {
        self.value() + U256::from(self.gas_price()) * U256::from(self.gas_limit())
    }
}

/// The persisted form of a confirmed transaction: the raw EIP-2718 payload together with
/// the block context it was mined into.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct StoredTransaction {
    /// The raw EIP-2718 encoding of the transaction, type byte included.
    pub raw: Bytes,
    /// The hash of the block the transaction was mined into.
    pub block_hash: B256,
    /// The number of the block the transaction was mined into.
    pub block_number: u64,
    /// The index of the transaction within its block.
    pub index: u64,
    /// The recovered sender.
    pub from: Address,
}

impl StoredTransaction {
    /// Decodes the stored payload back into a [TxEnvelope].
    pub fn envelope(&self) -> alloy_rlp::Result<TxEnvelope> {
        TxEnvelope::decode_2718(&mut self.raw.as_ref())
            .map_err(|_| alloy_rlp::Error::Custom("invalid 2718 payload"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::SignableTransaction;
    use alloy_rlp::{Decodable, Encodable};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    fn signed_transfer(nonce: u64, gas_price: u128) -> (TxEnvelope, Address) {
        let signer = PrivateKeySigner::random();
        let tx = TxLegacy {
            chain_id: Some(1337),
            nonce,
            gas_price,
            gas_limit: TX_BASE_GAS,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            value: U256::from(1u64),
            input: Bytes::new(),
        };
        let signature = signer.sign_hash_sync(&tx.signature_hash()).unwrap();
        (TxEnvelope::Legacy(tx.into_signed(signature)), signer.address())
    }

    #[test]
    fn test_intrinsic_gas_transfer() {
        assert_eq!(intrinsic_gas(TxKind::Call(Address::ZERO), &[]), TX_BASE_GAS);
    }

    #[test]
    fn test_intrinsic_gas_calldata() {
        // one zero byte, two non-zero bytes
        let gas = intrinsic_gas(TxKind::Call(Address::ZERO), &[0x00, 0x01, 0xff]);
        assert_eq!(gas, TX_BASE_GAS + 4 + 16 + 16);
    }

    #[test]
    fn test_intrinsic_gas_create() {
        assert_eq!(intrinsic_gas(TxKind::Create, &[]), TX_BASE_GAS + TX_CREATE_GAS);
    }

    #[test]
    fn test_pooled_transaction_recovers_sender() {
        let (envelope, sender) = signed_transfer(0, 2_000_000_000);
        let pooled = PooledTransaction::from_envelope(envelope).unwrap();
        assert_eq!(pooled.sender, sender);
        assert_eq!(pooled.nonce(), 0);
        assert_eq!(pooled.gas_price(), 2_000_000_000);
    }

    #[test]
    fn test_pooled_transaction_max_cost() {
        let (envelope, _) = signed_transfer(0, 10);
        let pooled = PooledTransaction::from_envelope(envelope).unwrap();
        assert_eq!(pooled.max_cost(), U256::from(1u64) + U256::from(10u64 * TX_BASE_GAS));
    }

    #[test]
    fn test_stored_transaction_roundtrip() {
        let (envelope, sender) = signed_transfer(3, 2_000_000_000);
        let stored = StoredTransaction {
            raw: envelope.encoded_2718().into(),
            block_hash: B256::repeat_byte(0xbb),
            block_number: 12,
            index: 4,
            from: sender,
        };

        let mut buf = Vec::new();
        stored.encode(&mut buf);
        let decoded = StoredTransaction::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(stored, decoded);
        assert_eq!(decoded.envelope().unwrap().tx_hash(), envelope.tx_hash());
    }
}
