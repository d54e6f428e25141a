//! The bridge between the VM and the world trie: a [revm] database view over the trie
//! plus the record stores, application of VM state changesets back into the trie, and
//! read-only call simulation.

use crate::{ChainError, ChainResult, RuntimeError};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable};
use cinder_mpt::{StateTrie, TrieError};
use cinder_primitives::{intrinsic_gas, TrieAccount};
use cinder_storage::BlockStore;
use revm::{
    db::BundleState,
    primitives::{
        AccountInfo, BlockEnv, Bytecode, CfgEnv, CfgEnvWithHandlerCfg, EnvWithHandlerCfg,
        ExecutionResult, SpecId, TransactTo, TxEnv, KECCAK_EMPTY,
    },
    Database, Evm,
};

/// A read-through [Database] view for the VM, resolving accounts, storage, and code
/// against a [StateTrie] and block hashes against the block store.
///
/// The view is bound to whatever root the trie currently carries. During mining that is
/// the in-progress checkpointed state; during simulation it is a throwaway trie pinned at
/// a historical root. Writes never flow through here; the miner applies the VM's bundle
/// explicitly via [StateDatabase::apply_bundle].
#[derive(Debug)]
pub struct StateDatabase<'a> {
    trie: &'a mut StateTrie,
    blocks: &'a BlockStore,
}

impl<'a> StateDatabase<'a> {
    /// Creates a view over the given trie and block store.
    pub fn new(trie: &'a mut StateTrie, blocks: &'a BlockStore) -> Self {
        Self { trie, blocks }
    }

    /// The root the trie currently carries, i.e. the state root after any applied
    /// changesets.
    pub fn trie_root(&self) -> B256 {
        self.trie.root()
    }

    fn trie_account(&self, address: Address) -> Result<Option<TrieAccount>, TrieError> {
        let Some(raw) = self.trie.get(keccak256(address).as_slice())? else {
            return Ok(None);
        };
        TrieAccount::decode(&mut raw.as_ref()).map(Some).map_err(TrieError::Rlp)
    }

    /// Applies a [BundleState] changeset to the trie: account bodies, storage slots, and
    /// newly deployed code. The caller owns the surrounding checkpoint.
    pub fn apply_bundle(&mut self, bundle: &BundleState) -> ChainResult<()> {
        for (address, bundle_account) in bundle.state() {
            if bundle_account.status.is_not_modified() {
                continue;
            }
            let account_key = keccak256(address);

            // A destroyed account loses its body and storage. It may be re-created in
            // the same block, in which case its storage rebuilds from the empty root.
            let prior_storage_root = if bundle_account.was_destroyed() {
                self.trie.delete(account_key.as_slice())?;
                TrieAccount::default().storage_root
            } else {
                self.trie_account(*address)?
                    .map_or_else(|| TrieAccount::default().storage_root, |a| a.storage_root)
            };

            let Some(info) = bundle_account.account_info() else {
                self.trie.delete(account_key.as_slice())?;
                continue;
            };

            // Carry the storage root forward and fold the changed slots into it.
            let mut storage_root = prior_storage_root;
            for (index, slot) in bundle_account.storage.iter() {
                if !slot.is_changed() {
                    continue;
                }
                let slot_key = keccak256(index.to_be_bytes::<32>());
                if slot.present_value.is_zero() {
                    storage_root = self.trie.delete_at(storage_root, slot_key.as_slice())?;
                } else {
                    let mut encoded = Vec::new();
                    slot.present_value.encode(&mut encoded);
                    storage_root =
                        self.trie.insert_at(storage_root, slot_key.as_slice(), encoded.into())?;
                }
            }

            let account = TrieAccount {
                nonce: info.nonce,
                balance: info.balance,
                storage_root,
                code_hash: info.code_hash,
            };
            let mut encoded = Vec::new();
            account.encode(&mut encoded);
            self.trie.insert(account_key.as_slice(), encoded.into())?;
        }

        // Stage the bytecode of contracts deployed by this changeset.
        for (code_hash, bytecode) in bundle.contracts.iter() {
            if *code_hash != KECCAK_EMPTY {
                self.trie.put_code(bytecode.original_byte_slice());
            }
        }

        Ok(())
    }
}

impl Database for StateDatabase<'_> {
    type Error = TrieError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        let Some(account) = self.trie_account(address)? else {
            return Ok(None);
        };
        Ok(Some(AccountInfo {
            balance: account.balance,
            nonce: account.nonce,
            code_hash: account.code_hash,
            code: None,
        }))
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytecode::default());
        }
        self.trie
            .code_by_hash(code_hash)?
            .map(Bytecode::new_raw)
            .ok_or(TrieError::MissingNode(code_hash))
    }

    fn storage(&mut self, address: Address, index: U256) -> Result<U256, Self::Error> {
        let Some(account) = self.trie_account(address)? else {
            return Ok(U256::ZERO);
        };
        let slot_key = keccak256(index.to_be_bytes::<32>());
        match self.trie.get_at(account.storage_root, slot_key.as_slice())? {
            Some(raw) => U256::decode(&mut raw.as_ref()).map_err(TrieError::Rlp),
            None => Ok(U256::ZERO),
        }
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        Ok(self
            .blocks
            .hash_by_number(number)
            .map_err(TrieError::Storage)?
            .unwrap_or_default())
    }
}

/// A read-only call against a chosen state, as submitted through `eth_call`.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    /// The caller. Defaults to the zero address.
    pub from: Option<Address>,
    /// The callee. `None` simulates a deployment.
    pub to: Option<Address>,
    /// Gas cap. Defaults to the configured call gas limit.
    pub gas: Option<u64>,
    /// Gas price. Defaults to zero, so calls need no fee balance.
    pub gas_price: Option<u128>,
    /// Value transferred.
    pub value: U256,
    /// Call data.
    pub input: Bytes,
}

/// Builds the VM configuration shared by mining and simulation.
pub(crate) fn cfg_env(
    chain_id: u64,
    spec_id: SpecId,
    allow_unlimited_contract_size: bool,
) -> CfgEnvWithHandlerCfg {
    let mut cfg = CfgEnv::default().with_chain_id(chain_id);
    if allow_unlimited_contract_size {
        cfg.limit_contract_code_size = Some(usize::MAX);
    }
    CfgEnvWithHandlerCfg::new_with_spec_id(cfg, spec_id)
}

/// Builds the block environment of a candidate or simulated block. The development chain
/// runs a fixed-gas-price fee model: the base fee is always zero.
pub(crate) fn block_env(number: u64, timestamp: u64, gas_limit: u64, coinbase: Address) -> BlockEnv {
    BlockEnv {
        number: U256::from(number),
        coinbase,
        timestamp: U256::from(timestamp),
        gas_limit: U256::from(gas_limit),
        basefee: U256::ZERO,
        difficulty: U256::ZERO,
        prevrandao: Some(B256::ZERO),
        blob_excess_gas_and_price: None,
    }
}

/// Executes a read-only call and interprets the outcome.
///
/// Out-of-gas before execution (intrinsic gas above the cap) is reported as
/// [RuntimeError::OutOfGas]. Execution exceptions are errors when `vm_errors` is set;
/// otherwise the revert data is returned as the call result.
pub(crate) fn run_call(
    db: StateDatabase<'_>,
    cfg: CfgEnvWithHandlerCfg,
    block: BlockEnv,
    call: &CallRequest,
    call_gas_limit: u64,
    vm_errors: bool,
) -> ChainResult<Bytes> {
    let gas_limit = call.gas.unwrap_or(call_gas_limit);
    let kind = call.to.map_or(TransactTo::Create, TransactTo::Call);
    let intrinsic = intrinsic_gas(
        call.to.map_or(alloy_primitives::TxKind::Create, alloy_primitives::TxKind::Call),
        &call.input,
    );
    if intrinsic > gas_limit {
        return Err(RuntimeError::OutOfGas { intrinsic, supplied: gas_limit }.into());
    }

    let mut env = TxEnv::default();
    env.caller = call.from.unwrap_or_default();
    env.gas_limit = gas_limit;
    env.gas_price = U256::from(call.gas_price.unwrap_or_default());
    env.transact_to = kind;
    env.value = call.value;
    env.data = call.input.clone();
    env.nonce = None;

    let mut evm = Evm::builder()
        .with_db(db)
        .with_env_with_handler_cfg(EnvWithHandlerCfg::new_with_cfg_env(cfg, block, env))
        .build();

    let outcome = evm
        .transact()
        .map_err(|e| ChainError::Runtime(RuntimeError::Invalid(format!("{e:?}"))))?;

    match outcome.result {
        ExecutionResult::Success { output, .. } => Ok(output.into_data()),
        ExecutionResult::Revert { output, .. } => {
            if vm_errors {
                Err(RuntimeError::Reverted(output).into())
            } else {
                Ok(output)
            }
        }
        ExecutionResult::Halt { reason, .. } => {
            if vm_errors {
                Err(RuntimeError::Halted(format!("{reason:?}")).into())
            } else {
                Ok(Bytes::new())
            }
        }
    }
}
