//! Configuration for the development chain. Every option has a default; unrecognized
//! options are rejected at deserialization.

use crate::{Hardfork, ValidationError};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Wei per ether.
pub(crate) const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Options governing block production.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct MinerOptions {
    /// Seconds between blocks. `0` selects instamine: one block per executable
    /// transaction, mined the moment it becomes executable.
    pub block_time: u64,
    /// Minimum gas price the pool accepts, and the default for unpriced submissions.
    pub gas_price: u128,
    /// The gas limit of every produced block.
    pub block_gas_limit: u64,
    /// Default gas limit for submissions that leave `gas` unset.
    pub default_transaction_gas_limit: u64,
    /// Gas cap for simulated calls.
    pub call_gas_limit: u64,
    /// The coinbase: an explicit address, or an index into the generated accounts.
    pub coinbase: Coinbase,
    /// Extra data placed in every produced header. At most 32 bytes.
    pub extra_data: Bytes,
    /// Legacy instamine: transaction submission does not return until the transaction
    /// has been mined. Requires `block_time = 0`.
    pub legacy_instamine: bool,
}

impl Default for MinerOptions {
    fn default() -> Self {
        Self {
            block_time: 0,
            gas_price: 2_000_000_000,
            block_gas_limit: 12_000_000,
            default_transaction_gas_limit: 90_000,
            call_gas_limit: (1 << 53) - 1,
            coinbase: Coinbase::default(),
            extra_data: Bytes::new(),
            legacy_instamine: false,
        }
    }
}

/// The coinbase option: either a literal address or the index of a generated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coinbase {
    /// An account index into the generated development accounts.
    Index(usize),
    /// A literal address.
    Address(Address),
}

impl Default for Coinbase {
    fn default() -> Self {
        Self::Address(Address::ZERO)
    }
}

/// Options governing chain-wide behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ChainOptions {
    /// Surface VM failures as errors on the submitting caller, instead of encoding them
    /// only in the receipt status.
    pub vm_errors_on_rpc_response: bool,
    /// Lift the EIP-170 deployed-code size limit.
    pub allow_unlimited_contract_size: bool,
    /// Initial clock time in milliseconds since the epoch. Defaults to the system clock.
    pub time: Option<u64>,
    /// The EVM rule set.
    pub hardfork: Hardfork,
    /// The chain id used for signing and replay protection.
    pub chain_id: u64,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            vm_errors_on_rpc_response: false,
            allow_unlimited_contract_size: false,
            time: None,
            hardfork: Hardfork::default(),
            chain_id: 1337,
        }
    }
}

/// Options governing the generated development accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct WalletOptions {
    /// Number of accounts seeded at genesis.
    pub total_accounts: usize,
    /// Ether balance of each seeded account.
    pub default_balance: u64,
    /// Seed for deterministic key derivation.
    pub seed: String,
}

impl Default for WalletOptions {
    fn default() -> Self {
        Self { total_accounts: 10, default_balance: 100, seed: "cinder".to_string() }
    }
}

impl WalletOptions {
    /// The genesis balance of each generated account, in wei.
    pub fn default_balance_wei(&self) -> U256 {
        U256::from(self.default_balance) * U256::from(WEI_PER_ETHER)
    }
}

/// The full option set of the development chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EthereumOptions {
    /// Block production options.
    pub miner: MinerOptions,
    /// Chain-wide options.
    pub chain: ChainOptions,
    /// Development account options.
    pub wallet: WalletOptions,
}

impl EthereumOptions {
    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.miner.extra_data.len() > 32 {
            return Err(ValidationError::ExtraDataTooLong(self.miner.extra_data.len()));
        }
        if self.miner.legacy_instamine && self.miner.block_time != 0 {
            return Err(ValidationError::LegacyInstamineRequiresInstamine);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documentation() {
        let options = EthereumOptions::default();
        assert_eq!(options.miner.block_time, 0);
        assert_eq!(options.miner.gas_price, 2_000_000_000);
        assert_eq!(options.miner.block_gas_limit, 12_000_000);
        assert_eq!(options.miner.default_transaction_gas_limit, 90_000);
        assert_eq!(options.miner.call_gas_limit, 9_007_199_254_740_991);
        assert_eq!(options.chain.chain_id, 1337);
        assert_eq!(options.wallet.total_accounts, 10);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_unknown_options_are_rejected() {
        let err = serde_json::from_str::<EthereumOptions>(
            r#"{"miner": {"blockTme": 1}}"#,
        );
        assert!(err.is_err());

        let err = serde_json::from_str::<EthereumOptions>(r#"{"minerr": {}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_partial_options_fill_defaults() {
        let options: EthereumOptions =
            serde_json::from_str(r#"{"miner": {"blockTime": 5}}"#).unwrap();
        assert_eq!(options.miner.block_time, 5);
        assert_eq!(options.miner.gas_price, 2_000_000_000);
    }

    #[test]
    fn test_extra_data_cap() {
        let options = EthereumOptions {
            miner: MinerOptions { extra_data: Bytes::from(vec![0u8; 33]), ..Default::default() },
            ..Default::default()
        };
        assert_eq!(options.validate(), Err(ValidationError::ExtraDataTooLong(33)));
    }

    #[test]
    fn test_legacy_instamine_requires_instamine() {
        let options = EthereumOptions {
            miner: MinerOptions { legacy_instamine: true, block_time: 3, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(
            options.validate(),
            Err(ValidationError::LegacyInstamineRequiresInstamine)
        );
    }

    #[test]
    fn test_coinbase_accepts_address_or_index() {
        let options: EthereumOptions =
            serde_json::from_str(r#"{"miner": {"coinbase": 2}}"#).unwrap();
        assert_eq!(options.miner.coinbase, Coinbase::Index(2));

        let options: EthereumOptions = serde_json::from_str(
            r#"{"miner": {"coinbase": "0x1111111111111111111111111111111111111111"}}"#,
        )
        .unwrap();
        assert_eq!(
            options.miner.coinbase,
            Coinbase::Address(Address::repeat_byte(0x11))
        );
    }

    #[test]
    fn test_default_balance_wei() {
        let wallet = WalletOptions::default();
        assert_eq!(
            wallet.default_balance_wei(),
            U256::from(100u64) * U256::from(WEI_PER_ETHER)
        );
    }
}
