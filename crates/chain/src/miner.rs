//! The miner: builds candidate blocks by executing pool transactions through the VM
//! against a checkpointed view of the world trie.

use crate::{
    vm::{block_env, cfg_env, StateDatabase},
    ChainError, ChainResult, RuntimeError, TransactionPool,
};
use alloy_consensus::constants::EMPTY_OMMER_ROOT_HASH;
use alloy_consensus::Header;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bloom, Bytes, B256, U256};
use cinder_mpt::{ordered_trie_root_with_encoder, StateTrie};
use cinder_primitives::{
    logs_bloom_for, Block, BlockLogs, PooledTransaction, SealedBlock, TransactionReceipt,
};
use cinder_storage::BlockStore;
use revm::{
    db::{states::bundle_state::BundleRetention, State},
    primitives::{EVMError, EnvWithHandlerCfg, ExecutionResult, Output, SpecId, TxEnv},
    Evm,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// The inputs of one candidate block.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    /// The parent block hash.
    pub parent_hash: B256,
    /// The candidate's block number.
    pub number: u64,
    /// The candidate's timestamp, in seconds.
    pub timestamp: u64,
    /// The block gas limit.
    pub gas_limit: u64,
    /// The configured coinbase.
    pub coinbase: Address,
    /// The configured extra data.
    pub extra_data: Bytes,
    /// The active EVM rule set.
    pub spec_id: SpecId,
    /// The chain id.
    pub chain_id: u64,
    /// Whether the EIP-170 code size limit is lifted.
    pub allow_unlimited_contract_size: bool,
}

/// The outcome of mining one block.
#[derive(Debug)]
pub struct MinedBlock {
    /// The sealed block.
    pub sealed: SealedBlock,
    /// Per included transaction, in order: its hash and receipt.
    pub receipts: Vec<(B256, TransactionReceipt)>,
    /// The block's aggregated log index.
    pub logs: BlockLogs,
    /// The included transactions, in execution order.
    pub included: Vec<PooledTransaction>,
    /// Transactions that errored without consuming gas. They are discarded from the
    /// pool and not included in the block.
    pub dropped: Vec<(PooledTransaction, RuntimeError)>,
    /// Included transactions whose execution reverted or halted, with the failure.
    pub failures: Vec<(B256, RuntimeError)>,
    /// Whether executable transactions remain beyond this block's boundaries.
    pub more_remaining: bool,
}

/// The block producer. Holds no chain state of its own: every call runs against the
/// supplied trie and pool under a fresh checkpoint, which is committed on success and
/// reverted on every error path.
#[derive(Debug, Default)]
pub struct Miner {
    paused: AtomicBool,
}

impl Miner {
    /// Suspends mining. While paused, [Miner::mine] produces nothing.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes mining.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Returns `true` while mining is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Mines one candidate block: executes executable pool transactions until the block
    /// gas limit would be exceeded, `max_transactions` is reached (`None` = unlimited),
    /// or the executable set drains. A block is produced even when no transaction is
    /// available, so on-demand and interval mining can advance an idle chain.
    ///
    /// Returns `None` while the miner is paused.
    pub fn mine(
        &self,
        template: &BlockTemplate,
        pool: &TransactionPool,
        trie: &mut StateTrie,
        blocks: &BlockStore,
        max_transactions: Option<usize>,
    ) -> ChainResult<Option<MinedBlock>> {
        if self.is_paused() {
            return Ok(None);
        }

        trie.checkpoint();
        match self.execute(template, pool, trie, blocks, max_transactions) {
            Ok(outcome) => {
                trie.commit()?;
                info!(
                    target: "miner",
                    number = template.number,
                    hash = %outcome.sealed.hash,
                    tx_count = outcome.included.len(),
                    gas_used = outcome.sealed.header().gas_used,
                    "mined block"
                );
                Ok(Some(outcome))
            }
            Err(e) => {
                // Release the checkpoint on every failing path before surfacing.
                trie.revert()?;
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        template: &BlockTemplate,
        pool: &TransactionPool,
        trie: &mut StateTrie,
        blocks: &BlockStore,
        max_transactions: Option<usize>,
    ) -> ChainResult<MinedBlock> {
        let max_transactions = max_transactions.unwrap_or(usize::MAX);
        let mut db = StateDatabase::new(trie, blocks);
        let mut state = State::builder().with_database(&mut db).with_bundle_update().build();

        let cfg = cfg_env(template.chain_id, template.spec_id, template.allow_unlimited_contract_size);
        let block = block_env(
            template.number,
            template.timestamp,
            template.gas_limit,
            template.coinbase,
        );
        let mut evm = Evm::builder()
            .with_db(&mut state)
            .with_env_with_handler_cfg(EnvWithHandlerCfg::new_with_cfg_env(
                cfg,
                block,
                TxEnv::default(),
            ))
            .build();

        let mut cumulative_gas_used = 0u64;
        let mut included: Vec<PooledTransaction> = Vec::new();
        let mut receipts: Vec<(B256, TransactionReceipt)> = Vec::new();
        let mut dropped: Vec<(PooledTransaction, RuntimeError)> = Vec::new();
        let mut failures: Vec<(B256, RuntimeError)> = Vec::new();
        let mut deferred: Vec<PooledTransaction> = Vec::new();
        let mut logs = BlockLogs::new(B256::ZERO, template.number);
        // Senders with a deferred transaction: their later nonces must wait too.
        let mut held_senders: HashSet<Address> = HashSet::new();

        while included.len() < max_transactions {
            let Some(tx) = pool.best_transaction() else { break };
            if held_senders.contains(&tx.sender) {
                deferred.push(tx);
                continue;
            }
            // A transaction whose intrinsic gas exceeds the remaining block gas is
            // deferred to a later block, not dropped.
            if tx.intrinsic_gas() > template.gas_limit.saturating_sub(cumulative_gas_used) {
                held_senders.insert(tx.sender);
                deferred.push(tx);
                continue;
            }

            evm = evm.modify().with_tx_env(tx_env(&tx)).build();
            debug!(target: "miner", hash = %tx.hash, "executing transaction");

            match evm.transact_commit() {
                Ok(result) => {
                    let gas_used = result.gas_used();
                    let success = result.is_success();
                    cumulative_gas_used += gas_used;

                    let contract_address = match &result {
                        ExecutionResult::Success {
                            output: Output::Create(_, address), ..
                        } => *address,
                        _ => None,
                    };
                    if !success {
                        failures.push((tx.hash, runtime_failure(&result)));
                    }

                    let tx_logs = result.into_logs();
                    let index = included.len() as u64;
                    logs.extend(index, tx.hash, &tx_logs);
                    receipts.push((
                        tx.hash,
                        TransactionReceipt {
                            status: success,
                            cumulative_gas_used,
                            gas_used,
                            logs_bloom: logs_bloom_for(&tx_logs),
                            logs: tx_logs,
                            contract_address,
                        },
                    ));
                    included.push(tx);
                }
                Err(EVMError::Database(e)) => return Err(ChainError::Trie(e)),
                Err(e) => {
                    // Invalid at the point of execution: discard without inclusion.
                    warn!(target: "miner", hash = %tx.hash, error = ?e, "dropping transaction");
                    dropped.push((tx, RuntimeError::Invalid(format!("{e:?}"))));
                }
            }
        }

        drop(evm);
        state.merge_transitions(BundleRetention::Reverts);
        let bundle = state.take_bundle();
        state.database.apply_bundle(&bundle)?;
        drop(state);

        pool.requeue(deferred);
        let more_remaining = pool.has_executable();

        let state_root = db.trie_root();
        let transactions_root = ordered_trie_root_with_encoder(&included, |tx, out| {
            tx.envelope.encode_2718(out)
        });
        let receipts_root = ordered_trie_root_with_encoder(&receipts, |(_, receipt), out| {
            alloy_rlp::Encodable::encode(receipt, out)
        });
        let logs_bloom = receipts
            .iter()
            .fold(Bloom::ZERO, |bloom, (_, receipt)| bloom | receipt.logs_bloom);

        let header = Header {
            parent_hash: template.parent_hash,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: template.coinbase,
            state_root,
            transactions_root,
            receipts_root,
            logs_bloom,
            difficulty: U256::ZERO,
            number: template.number,
            gas_limit: template.gas_limit,
            gas_used: cumulative_gas_used,
            timestamp: template.timestamp,
            extra_data: template.extra_data.clone(),
            ..Default::default()
        };

        let envelopes = included.iter().map(|tx| tx.envelope.clone()).collect();
        let sealed = Block::new(header, envelopes).seal();
        logs.block_hash = sealed.hash;

        Ok(MinedBlock { sealed, receipts, logs, included, dropped, failures, more_remaining })
    }
}

/// Maps a failing execution result onto the runtime error attached to the transaction.
fn runtime_failure(result: &ExecutionResult) -> RuntimeError {
    match result {
        ExecutionResult::Revert { output, .. } => RuntimeError::Reverted(output.clone()),
        ExecutionResult::Halt { reason, .. } => RuntimeError::Halted(format!("{reason:?}")),
        ExecutionResult::Success { .. } => unreachable!("success is not a failure"),
    }
}

/// Prepares a [TxEnv] for a pooled transaction.
fn tx_env(tx: &PooledTransaction) -> TxEnv {
    use alloy_consensus::TxEnvelope;
    use revm::primitives::TransactTo;

    let mut env = TxEnv::default();
    env.caller = tx.sender;
    env.gas_limit = tx.gas_limit();
    env.gas_price = U256::from(tx.gas_price());
    env.transact_to = match tx.kind() {
        alloy_primitives::TxKind::Call(to) => TransactTo::Call(to),
        alloy_primitives::TxKind::Create => TransactTo::Create,
    };
    env.value = tx.value();
    env.data = tx.input().clone();
    env.nonce = Some(tx.nonce());

    match &tx.envelope {
        TxEnvelope::Legacy(signed) => {
            env.chain_id = signed.tx().chain_id;
            env.gas_priority_fee = None;
        }
        TxEnvelope::Eip2930(signed) => {
            env.chain_id = Some(signed.tx().chain_id);
            env.access_list = signed.tx().access_list.to_vec();
            env.gas_priority_fee = None;
        }
        TxEnvelope::Eip1559(signed) => {
            env.chain_id = Some(signed.tx().chain_id);
            env.access_list = signed.tx().access_list.to_vec();
            env.gas_priority_fee =
                Some(U256::from(signed.tx().max_priority_fee_per_gas));
        }
        _ => unreachable!("unsupported types are rejected on pool admission"),
    }
    env
}
