//! The blockchain controller: orchestrates the pool, the miner, the record stores, the
//! snapshot manager, and the clock behind a single head lock.
//!
//! All head-advancing work — candidate assembly, the atomic batch write, memo updates,
//! and event emission — runs with the head lock held, so no two block saves can
//! interleave and a revert always observes a quiescent head.

use crate::{
    accounts::{derive_dev_accounts, AccountManager, DevAccount},
    vm::{block_env, cfg_env, run_call},
    BlockTemplate, CallRequest, ChainError, ChainEvents, ChainResult, Clock, Coinbase,
    EthereumOptions, MinedBlock, Miner, RuntimeError, SnapshotManager, Status, StateDatabase,
    TransactionPool, ValidationError,
};
use alloy_consensus::constants::{EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH};
use alloy_consensus::{Header, SignableTransaction, TxEnvelope};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use cinder_mpt::StateTrie;
use cinder_primitives::{
    Block, BlockLogs, PooledTransaction, SealedBlock, StoredTransaction, TransactionReceipt,
    TransactionRequest, TrieAccount,
};
use cinder_storage::{
    BlockLogStore, BlockStore, KeyValueStore, MemoryKeyValueStore, ReceiptStore,
    TransactionStore, WriteBatch,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

/// The blockchain controller handle. Cheap to clone; all clones share one chain.
#[derive(Debug, Clone)]
pub struct Blockchain {
    inner: Arc<Inner>,
}

/// State guarded by the head lock: the world trie positioned at the head state root.
#[derive(Debug)]
struct HeadState {
    trie: StateTrie,
}

#[derive(Debug)]
struct Inner {
    options: EthereumOptions,
    kv: Arc<dyn KeyValueStore>,
    blocks: BlockStore,
    transactions: TransactionStore,
    receipts: ReceiptStore,
    block_logs: BlockLogStore,
    accounts: AccountManager,
    pool: TransactionPool,
    miner: Miner,
    clock: Clock,
    events: ChainEvents,
    status: watch::Sender<Status>,
    /// The head lock. Sole serializer of fill → save → emit, and of revert.
    head: Mutex<HeadState>,
    /// Serializes submission fill-in, so concurrent submissions take nonces first-come.
    submission: Mutex<()>,
    snapshots: StdMutex<SnapshotManager>,
    /// Callers awaiting a transaction's finalization (legacy instamine).
    confirmations: StdMutex<HashMap<B256, Vec<oneshot::Sender<Result<(), RuntimeError>>>>>,
    dev_accounts: Vec<DevAccount>,
    coinbase: Address,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl Blockchain {
    /// Starts a chain over a fresh in-memory store.
    pub async fn start(options: EthereumOptions) -> ChainResult<Self> {
        Self::start_with_store(options, Arc::new(MemoryKeyValueStore::new())).await
    }

    /// Starts a chain over the given store, creating the genesis block if the store is
    /// empty and resuming from the persisted head otherwise.
    pub async fn start_with_store(
        options: EthereumOptions,
        kv: Arc<dyn KeyValueStore>,
    ) -> ChainResult<Self> {
        options.validate()?;
        let (status, _) = watch::channel(Status::Starting);

        let clock = Clock::new(options.chain.time);
        let blocks = BlockStore::open(kv.clone())?;
        let dev_accounts =
            derive_dev_accounts(&options.wallet.seed, options.wallet.total_accounts);
        let coinbase = match &options.miner.coinbase {
            Coinbase::Address(address) => *address,
            Coinbase::Index(index) => {
                dev_accounts.get(*index).map_or(Address::ZERO, |account| account.address)
            }
        };

        let mut trie = StateTrie::new(kv.clone());
        match blocks.latest() {
            Some(latest) => {
                trie.set_root(latest.header().state_root)?;
                info!(
                    target: "chain",
                    number = latest.number(),
                    hash = %latest.hash,
                    "resuming from persisted head"
                );
            }
            None => {
                let genesis = Self::create_genesis(
                    &options, &clock, &blocks, &mut trie, &dev_accounts, coinbase, &kv,
                )?;
                info!(target: "chain", hash = %genesis.hash, "genesis block created");
            }
        }

        let inner = Arc::new(Inner {
            pool: TransactionPool::new(
                options.miner.gas_price,
                options.miner.block_gas_limit,
            ),
            miner: Miner::default(),
            accounts: AccountManager::new(kv.clone()),
            transactions: TransactionStore::new(kv.clone()),
            receipts: ReceiptStore::new(kv.clone()),
            block_logs: BlockLogStore::new(kv.clone()),
            events: ChainEvents::default(),
            head: Mutex::new(HeadState { trie }),
            submission: Mutex::new(()),
            snapshots: StdMutex::new(SnapshotManager::default()),
            confirmations: StdMutex::new(HashMap::new()),
            tasks: StdMutex::new(Vec::new()),
            options,
            kv,
            blocks,
            clock,
            status,
            dev_accounts,
            coinbase,
        });

        let task = if inner.options.miner.block_time == 0 {
            tokio::spawn(Inner::instamine_loop(inner.clone()))
        } else {
            tokio::spawn(Inner::interval_loop(inner.clone()))
        };
        inner.tasks.lock().expect("task lock poisoned").push(task);

        inner.status.send_replace(Status::Started);
        Ok(Self { inner })
    }

    #[allow(clippy::too_many_arguments)]
    fn create_genesis(
        options: &EthereumOptions,
        clock: &Clock,
        blocks: &BlockStore,
        trie: &mut StateTrie,
        dev_accounts: &[DevAccount],
        coinbase: Address,
        kv: &Arc<dyn KeyValueStore>,
    ) -> ChainResult<SealedBlock> {
        trie.checkpoint();
        let balance = options.wallet.default_balance_wei();
        for account in dev_accounts {
            AccountManager::put_account(
                trie,
                account.address,
                &TrieAccount { balance, ..Default::default() },
            )?;
        }
        trie.commit()?;

        let header = Header {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: coinbase,
            state_root: trie.root(),
            transactions_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            difficulty: U256::ZERO,
            number: 0,
            gas_limit: options.miner.block_gas_limit,
            gas_used: 0,
            timestamp: clock.now_secs(),
            extra_data: options.miner.extra_data.clone(),
            ..Default::default()
        };
        let sealed = Block::new(header, Vec::new()).seal();

        let mut batch = WriteBatch::new();
        trie.flush(&mut batch)?;
        blocks.put(&mut batch, &sealed);
        BlockLogStore::new(kv.clone()).put(&mut batch, &BlockLogs::new(sealed.hash, 0));
        kv.write(batch)?;
        blocks.set_latest(sealed.clone());
        Ok(sealed)
    }

    fn ensure_started(&self) -> ChainResult<()> {
        let status = *self.inner.status.borrow();
        if status == Status::Started {
            Ok(())
        } else {
            Err(ChainError::Lifecycle(status))
        }
    }

    /// The generated development accounts and their secret keys.
    pub fn dev_accounts(&self) -> &[DevAccount] {
        &self.inner.dev_accounts
    }

    /// The resolved coinbase address.
    pub fn coinbase(&self) -> Address {
        self.inner.coinbase
    }

    /// The chain options.
    pub fn options(&self) -> &EthereumOptions {
        &self.inner.options
    }

    /// The event hub.
    pub fn events(&self) -> &ChainEvents {
        &self.inner.events
    }

    /// Subscribes to lifecycle transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.inner.status.subscribe()
    }

    /// The chain head.
    pub fn latest_block(&self) -> ChainResult<SealedBlock> {
        self.inner.blocks.latest().ok_or(ChainError::MissingHead)
    }

    /// Fetches a block by number.
    pub fn block_by_number(&self, number: u64) -> ChainResult<Option<SealedBlock>> {
        Ok(self.inner.blocks.by_number(number)?)
    }

    /// Fetches a block by hash.
    pub fn block_by_hash(&self, hash: B256) -> ChainResult<Option<SealedBlock>> {
        Ok(self.inner.blocks.by_hash(hash)?)
    }

    /// Fetches a confirmed transaction record.
    pub fn transaction_by_hash(&self, hash: B256) -> ChainResult<Option<StoredTransaction>> {
        Ok(self.inner.transactions.get(hash)?)
    }

    /// Fetches a transaction receipt.
    pub fn receipt_by_hash(&self, hash: B256) -> ChainResult<Option<TransactionReceipt>> {
        Ok(self.inner.receipts.get(hash)?)
    }

    /// Fetches the log indices of an inclusive block range, the backing of `eth_getLogs`.
    pub fn logs_in_range(&self, from: u64, to: u64) -> ChainResult<Vec<BlockLogs>> {
        Ok(self.inner.block_logs.range(from, to)?)
    }

    /// Fetches an account at the current head.
    pub fn account(&self, address: Address) -> ChainResult<TrieAccount> {
        self.inner.accounts.account(self.head_state_root()?, address)
    }

    /// Fetches a storage slot at the current head.
    pub fn storage_at(&self, address: Address, slot: U256) -> ChainResult<U256> {
        self.inner.accounts.storage_at(self.head_state_root()?, address, slot)
    }

    /// Fetches deployed code at the current head.
    pub fn code(&self, address: Address) -> ChainResult<Bytes> {
        self.inner.accounts.code(self.head_state_root()?, address)
    }

    /// The world-trie root as carried by the live trie. Equals the head block's state
    /// root whenever no block assembly is in flight.
    pub async fn state_root(&self) -> B256 {
        self.inner.head.lock().await.trie.root()
    }

    fn head_state_root(&self) -> ChainResult<B256> {
        Ok(self.latest_block()?.header().state_root)
    }

    /// Fills, signs, and submits a transaction with the supplied secret key. Returns the
    /// transaction hash; in legacy-instamine mode, not before the transaction was mined.
    pub async fn queue_transaction(
        &self,
        request: TransactionRequest,
        secret_key: B256,
    ) -> ChainResult<B256> {
        self.ensure_started()?;
        let inner = &self.inner;

        let (pooled, waiter) = {
            let _guard = inner.submission.lock().await;

            let signer = PrivateKeySigner::from_bytes(&secret_key)
                .map_err(|_| ValidationError::InvalidSecretKey)?;
            let account =
                inner.accounts.account(self.head_state_root()?, signer.address())?;
            let nonce = inner.pool.next_nonce(signer.address(), account.nonce);
            let tx = request.into_legacy(
                inner.options.chain.chain_id,
                nonce,
                inner.options.miner.default_transaction_gas_limit,
                inner.options.miner.gas_price,
            );
            let signature = signer
                .sign_hash_sync(&tx.signature_hash())
                .map_err(|_| ValidationError::InvalidSignature)?;
            let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
            inner.admit(envelope, &account)?
        };

        self.finish_submission(pooled, waiter).await
    }

    /// Submits an externally signed transaction envelope.
    pub async fn queue_raw_transaction(&self, envelope: TxEnvelope) -> ChainResult<B256> {
        self.ensure_started()?;
        let inner = &self.inner;

        let (pooled, waiter) = {
            let _guard = inner.submission.lock().await;
            let sender = PooledTransaction::from_envelope(envelope.clone())
                .map_err(validation_of)?
                .sender;
            let account = inner.accounts.account(self.head_state_root()?, sender)?;
            inner.admit(envelope, &account)?
        };

        self.finish_submission(pooled, waiter).await
    }

    async fn finish_submission(
        &self,
        pooled: PooledTransaction,
        waiter: Option<oneshot::Receiver<Result<(), RuntimeError>>>,
    ) -> ChainResult<B256> {
        let hash = pooled.hash;
        self.inner.events.emit_pending_transaction(pooled);

        // Legacy instamine: the submission resolves only after the receipt exists, and
        // carries the VM failure when the chain is configured to surface them.
        if let Some(waiter) = waiter {
            match waiter.await {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => return Err(failure.into()),
                Err(_) => return Err(ChainError::Lifecycle(Status::Stopped)),
            }
        }
        Ok(hash)
    }

    /// Mines on demand: up to `max_transactions` per block (`None` = unlimited), at the
    /// given timestamp if any. With `only_one_block` unset, continues across gas-limit
    /// boundaries until the executable set drains. Awaits any in-flight save first.
    pub async fn mine(
        &self,
        max_transactions: Option<usize>,
        timestamp: Option<u64>,
        only_one_block: bool,
    ) -> ChainResult<Vec<B256>> {
        self.ensure_started()?;
        self.inner.mine_locked(max_transactions, timestamp, only_one_block).await
    }

    /// Runs a read-only call against the state of `block_number` (head when `None`).
    /// Does not touch the head state, the pool, or the database.
    pub fn simulate_transaction(
        &self,
        call: CallRequest,
        block_number: Option<u64>,
    ) -> ChainResult<Bytes> {
        self.ensure_started()?;
        let inner = &self.inner;
        let parent = match block_number {
            Some(number) => {
                inner.blocks.by_number(number)?.ok_or(ChainError::MissingHead)?
            }
            None => self.latest_block()?,
        };

        let mut trie = StateTrie::at_root(inner.kv.clone(), parent.header().state_root);
        let db = StateDatabase::new(&mut trie, &inner.blocks);
        let cfg = cfg_env(
            inner.options.chain.chain_id,
            inner.options.chain.hardfork.spec_id(),
            inner.options.chain.allow_unlimited_contract_size,
        );
        let block = block_env(
            parent.number(),
            parent.header().timestamp,
            inner.options.miner.block_gas_limit,
            self.inner.coinbase,
        );
        run_call(
            db,
            cfg,
            block,
            &call,
            inner.options.miner.call_gas_limit,
            inner.options.chain.vm_errors_on_rpc_response,
        )
    }

    /// Advances the clock offset. Takes effect on the next block timestamp. Returns the
    /// new offset in seconds.
    pub fn increase_time(&self, seconds: u64) -> i64 {
        self.inner.clock.increase_time(seconds)
    }

    /// Pins the clock to the given epoch milliseconds. Returns the new offset in seconds.
    pub fn set_time(&self, timestamp_ms: u64) -> i64 {
        self.inner.clock.set_time_ms(timestamp_ms)
    }

    /// The chain clock.
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Whether the pool holds transactions ready to mine.
    pub fn has_executable_transactions(&self) -> bool {
        self.inner.pool.has_executable()
    }

    /// Suspends mining and drain signaling. Submissions are still admitted.
    pub fn pause(&self) {
        self.inner.miner.pause();
        self.inner.pool.pause();
    }

    /// Resumes mining and drain signaling.
    pub fn resume(&self) {
        self.inner.miner.resume();
        self.inner.pool.resume();
    }

    /// Captures the current head and clock offset. Returns the 1-based snapshot id.
    pub fn snapshot(&self) -> ChainResult<u64> {
        self.ensure_started()?;
        let head = self.latest_block()?;
        let id = self
            .inner
            .snapshots
            .lock()
            .expect("snapshot lock poisoned")
            .snapshot(&head, self.inner.clock.offset_ms());
        Ok(id)
    }

    /// Restores the chain to snapshot `id`: deletes every newer block together with its
    /// transactions, receipts, and logs, restores the head pointer, the world-trie root,
    /// and the clock offset, and drops all pooled transactions (pending ones included).
    ///
    /// Returns `false`, with no state change, for ids outside the live range.
    pub async fn revert(&self, id: u64) -> ChainResult<bool> {
        self.ensure_started()?;
        let inner = &self.inner;

        if !inner.snapshots.lock().expect("snapshot lock poisoned").is_valid_id(id) {
            return Ok(false);
        }

        inner.pool.pause();
        inner.miner.pause();
        // Taking the head lock drains the in-flight save, if any.
        let mut head = inner.head.lock().await;

        let result = inner.perform_revert(&mut head, id);

        inner.miner.resume();
        inner.pool.resume();
        result
    }

    /// Stops the controller: aborts the mining discipline, drains the in-flight save,
    /// and transitions to `Stopped`. Idempotent.
    pub async fn stop(&self) -> ChainResult<()> {
        let current = *self.inner.status.borrow();
        if matches!(current, Status::Stopping | Status::Stopped) {
            return Ok(());
        }
        self.inner.status.send_replace(Status::Stopping);

        for task in self.inner.tasks.lock().expect("task lock poisoned").drain(..) {
            task.abort();
        }
        let _head = self.inner.head.lock().await;
        self.inner.status.send_replace(Status::Stopped);
        info!(target: "chain", "stopped");
        Ok(())
    }
}

impl Inner {
    /// The instamine discipline: one single-transaction block per executable
    /// transaction, triggered by the pool's drain signal.
    async fn instamine_loop(inner: Arc<Self>) {
        loop {
            inner.pool.drained().await;
            while inner.pool.has_executable() && !inner.miner.is_paused() {
                if let Err(e) = inner.mine_locked(Some(1), None, true).await {
                    error!(target: "chain", error = %e, "instamine failed");
                    break;
                }
            }
        }
    }

    /// The interval discipline: every `blockTime` seconds, one block with up to all
    /// currently executable transactions. Ticks skipped under load are delayed, not
    /// bunched.
    async fn interval_loop(inner: Arc<Self>) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(inner.options.miner.block_time));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; swallow it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if inner.miner.is_paused() {
                continue;
            }
            if let Err(e) = inner.mine_locked(None, None, true).await {
                error!(target: "chain", error = %e, "interval mining failed");
            }
        }
    }

    /// Validates an envelope against the sender's head-state account and admits it into
    /// the pool, registering a finalization waiter in legacy-instamine mode.
    ///
    /// The waiter is registered before admission, so an instamine racing the submission
    /// cannot finalize the transaction between the two steps.
    fn admit(
        &self,
        envelope: TxEnvelope,
        account: &TrieAccount,
    ) -> ChainResult<(
        PooledTransaction,
        Option<oneshot::Receiver<Result<(), RuntimeError>>>,
    )> {
        let pooled = PooledTransaction::from_envelope(envelope).map_err(validation_of)?;
        let hash = pooled.hash;

        let waiter = if self.options.miner.legacy_instamine {
            let (sender, receiver) = oneshot::channel();
            self.confirmations
                .lock()
                .expect("confirmation lock poisoned")
                .entry(hash)
                .or_default()
                .push(sender);
            Some(receiver)
        } else {
            None
        };

        if let Err(e) = self.pool.add(pooled.clone(), account) {
            self.confirmations.lock().expect("confirmation lock poisoned").remove(&hash);
            return Err(e.into());
        }
        trace!(target: "chain", hash = %hash, "transaction queued");
        Ok((pooled, waiter))
    }

    /// Mines blocks with the head lock held: fill → save → emit, one block at a time,
    /// continuing across gas-limit boundaries unless `only_one_block` is set.
    async fn mine_locked(
        &self,
        max_transactions: Option<usize>,
        timestamp: Option<u64>,
        only_one_block: bool,
    ) -> ChainResult<Vec<B256>> {
        let mut head = self.head.lock().await;
        let mut timestamp = timestamp;
        let mut mined = Vec::new();

        loop {
            let parent = self.blocks.latest().ok_or(ChainError::MissingHead)?;
            let template = BlockTemplate {
                parent_hash: parent.hash,
                number: parent.number() + 1,
                timestamp: timestamp.take().unwrap_or_else(|| self.clock.now_secs()),
                gas_limit: self.options.miner.block_gas_limit,
                coinbase: self.coinbase,
                extra_data: self.options.miner.extra_data.clone(),
                spec_id: self.options.chain.hardfork.spec_id(),
                chain_id: self.options.chain.chain_id,
                allow_unlimited_contract_size: self.options.chain.allow_unlimited_contract_size,
            };

            let Some(outcome) = self.miner.mine(
                &template,
                &self.pool,
                &mut head.trie,
                &self.blocks,
                max_transactions,
            )?
            else {
                break;
            };

            let more_remaining = outcome.more_remaining;
            mined.push(outcome.sealed.hash);
            self.save_block(&mut head, outcome).await?;

            if only_one_block || !more_remaining {
                break;
            }
        }

        Ok(mined)
    }

    /// Persists a mined block in one atomic batch, advances the head, resolves
    /// finalization waiters, and emits `blockLogs` strictly before `block`.
    async fn save_block(&self, head: &mut HeadState, outcome: MinedBlock) -> ChainResult<()> {
        let MinedBlock { sealed, receipts, logs, included, dropped, failures, .. } = outcome;

        let mut batch = WriteBatch::new();
        head.trie.flush(&mut batch)?;
        for (index, tx) in included.iter().enumerate() {
            let stored = StoredTransaction {
                raw: tx.raw.clone(),
                block_hash: sealed.hash,
                block_number: sealed.number(),
                index: index as u64,
                from: tx.sender,
            };
            self.transactions.put(&mut batch, tx.hash, &stored);
        }
        for (hash, receipt) in &receipts {
            self.receipts.put(&mut batch, *hash, receipt);
        }
        self.block_logs.put(&mut batch, &logs);
        self.blocks.put(&mut batch, &sealed);
        self.kv.write(batch)?;

        self.blocks.set_latest(sealed.clone());
        self.snapshots.lock().expect("snapshot lock poisoned").on_block(sealed.hash);

        // Mark the included transactions confirmed, surfacing VM failures to awaiting
        // submitters when configured, and fail the waiters of discarded transactions.
        let vm_errors = self.options.chain.vm_errors_on_rpc_response;
        let mut failure_map: HashMap<B256, RuntimeError> = failures.into_iter().collect();
        {
            let mut confirmations =
                self.confirmations.lock().expect("confirmation lock poisoned");
            for tx in &included {
                let outcome = match failure_map.remove(&tx.hash) {
                    Some(failure) if vm_errors => Err(failure),
                    _ => Ok(()),
                };
                for waiter in confirmations.remove(&tx.hash).unwrap_or_default() {
                    let _ = waiter.send(outcome.clone());
                }
            }
            for (tx, failure) in &dropped {
                for waiter in confirmations.remove(&tx.hash).unwrap_or_default() {
                    let _ = waiter.send(Err(failure.clone()));
                }
            }
        }

        if self.options.miner.legacy_instamine {
            // One scheduling turn, so the submitting caller observes the hash before
            // filter subscribers see the block.
            tokio::task::yield_now().await;
        }
        self.events.emit_block_logs(logs);
        self.events.emit_block(sealed);
        Ok(())
    }

    /// The revert body, run with the head lock held and the pool and miner paused.
    fn perform_revert(&self, head: &mut HeadState, id: u64) -> ChainResult<bool> {
        let Some(snapshot) =
            self.snapshots.lock().expect("snapshot lock poisoned").take(id)
        else {
            return Ok(false);
        };

        // All pooled transactions are dropped, pre-snapshot pendings included.
        self.pool.clear();

        let current = self.blocks.latest().ok_or(ChainError::MissingHead)?;
        if current.hash != snapshot.head_hash {
            let doomed = self
                .snapshots
                .lock()
                .expect("snapshot lock poisoned")
                .unwind_to(snapshot.head_hash);

            let mut batch = WriteBatch::new();
            for hash in &doomed {
                let Some(block) = self.blocks.by_hash(*hash)? else { continue };
                for tx in &block.block.transactions {
                    let tx_hash = *tx.tx_hash();
                    self.transactions.delete(&mut batch, tx_hash);
                    self.receipts.delete(&mut batch, tx_hash);
                }
                self.block_logs.delete(&mut batch, block.number());
                self.blocks.delete(&mut batch, *hash, block.number());
            }
            self.blocks.put_latest_pointer(&mut batch, snapshot.head_hash);
            self.kv.write(batch)?;

            let restored =
                self.blocks.by_hash(snapshot.head_hash)?.ok_or(ChainError::MissingHead)?;
            self.blocks.set_latest(restored);
        }

        // The head lock guarantees no open checkpoint, so the root assignment is legal.
        head.trie.set_root(snapshot.state_root)?;
        self.clock.set_offset_ms(snapshot.time_offset_ms);

        info!(
            target: "chain",
            id,
            head = %snapshot.head_hash,
            number = snapshot.head_number,
            "reverted to snapshot"
        );
        Ok(true)
    }
}

/// Maps envelope-conversion failures onto validation errors.
fn validation_of(err: cinder_primitives::transaction::PooledConversionError) -> ChainError {
    use cinder_primitives::transaction::PooledConversionError;
    match err {
        PooledConversionError::UnsupportedType(t) => ValidationError::UnsupportedType(t).into(),
        PooledConversionError::Signature(_) => ValidationError::InvalidSignature.into(),
    }
}
