//! The transaction pool: validates submissions, buckets them per sender into pending
//! (nonce-gapped) and executable (nonce-contiguous) sets, and signals the miner whenever
//! the executable set becomes non-empty.

use crate::ValidationError;
use alloy_primitives::Address;
use cinder_primitives::{PooledTransaction, TrieAccount};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct PoolInner {
    /// Per sender, the nonce-contiguous run starting at the account nonce. The head of
    /// each queue is the sender's next executable transaction.
    executable: HashMap<Address, VecDeque<PooledTransaction>>,
    /// Per sender, transactions with a nonce gap ahead of the executable run.
    pending: HashMap<Address, BTreeMap<u64, PooledTransaction>>,
    /// First-seen counter, the across-sender tie-break after gas price.
    next_arrival: u64,
}

impl PoolInner {
    fn executable_count(&self, sender: Address) -> u64 {
        self.executable.get(&sender).map_or(0, |queue| queue.len() as u64)
    }

    /// Promotes pending transactions of `sender` that have become nonce-contiguous.
    fn promote(&mut self, sender: Address, account_nonce: u64) {
        let Some(pending) = self.pending.get_mut(&sender) else { return };
        let mut next = account_nonce + self.executable.get(&sender).map_or(0, VecDeque::len) as u64;
        while let Some(tx) = pending.remove(&next) {
            self.executable.entry(sender).or_default().push_back(tx);
            next += 1;
        }
        if pending.is_empty() {
            self.pending.remove(&sender);
        }
    }
}

/// The transaction pool. Admission is serialized through the inner lock, so concurrent
/// submissions enter in first-come order.
#[derive(Debug)]
pub struct TransactionPool {
    minimum_gas_price: u128,
    block_gas_limit: u64,
    inner: Mutex<PoolInner>,
    drain: Notify,
    paused: AtomicBool,
}

impl TransactionPool {
    /// Creates a pool enforcing the given minimum gas price and block gas limit.
    pub fn new(minimum_gas_price: u128, block_gas_limit: u64) -> Self {
        Self {
            minimum_gas_price,
            block_gas_limit,
            inner: Mutex::new(PoolInner::default()),
            drain: Notify::new(),
            paused: AtomicBool::new(false),
        }
    }

    /// Validates and admits a transaction, placing it into the pending or executable set
    /// and promoting any formerly pending transactions that became contiguous.
    ///
    /// `account` is the sender's state at the current head. Returns whether the
    /// transaction is immediately executable.
    pub fn add(
        &self,
        mut tx: PooledTransaction,
        account: &TrieAccount,
    ) -> Result<bool, ValidationError> {
        if tx.gas_price() < self.minimum_gas_price {
            return Err(ValidationError::Underpriced {
                got: tx.gas_price(),
                minimum: self.minimum_gas_price,
            });
        }
        if tx.gas_limit() > self.block_gas_limit {
            return Err(ValidationError::ExceedsBlockGasLimit {
                gas: tx.gas_limit(),
                limit: self.block_gas_limit,
            });
        }
        let intrinsic = tx.intrinsic_gas();
        if tx.gas_limit() < intrinsic {
            return Err(ValidationError::IntrinsicGasTooLow { gas: tx.gas_limit(), intrinsic });
        }
        if tx.nonce() < account.nonce {
            return Err(ValidationError::NonceTooLow { tx: tx.nonce(), account: account.nonce });
        }
        if account.balance < tx.max_cost() {
            return Err(ValidationError::InsufficientFunds {
                balance: account.balance,
                required: tx.max_cost(),
            });
        }

        let sender = tx.sender;
        let executable_now = {
            let mut inner = self.inner.lock().expect("pool lock poisoned");
            tx.arrival = inner.next_arrival;
            inner.next_arrival += 1;

            let expected = account.nonce + inner.executable_count(sender);
            if tx.nonce() == expected {
                inner.executable.entry(sender).or_default().push_back(tx);
                inner.promote(sender, account.nonce);
                true
            } else if tx.nonce() > expected {
                inner.pending.entry(sender).or_default().insert(tx.nonce(), tx);
                false
            } else {
                // The nonce is already queued executable: replace in place.
                let queue = inner.executable.entry(sender).or_default();
                let slot = (tx.nonce() - account.nonce) as usize;
                queue[slot] = tx;
                true
            }
        };

        if executable_now {
            debug!(target: "pool", sender = %sender, "transaction executable");
            self.signal_drain();
        } else {
            debug!(target: "pool", sender = %sender, "transaction pending (nonce gap)");
        }
        Ok(executable_now)
    }

    /// Pops the best executable transaction: highest gas price across senders, ties
    /// broken by first seen, always in per-sender nonce order.
    pub fn best_transaction(&self) -> Option<PooledTransaction> {
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        let sender = inner
            .executable
            .iter()
            .filter_map(|(sender, queue)| queue.front().map(|tx| (*sender, tx)))
            .max_by(|(_, a), (_, b)| {
                a.gas_price().cmp(&b.gas_price()).then(b.arrival.cmp(&a.arrival))
            })
            .map(|(sender, _)| sender)?;

        let queue = inner.executable.get_mut(&sender)?;
        let tx = queue.pop_front();
        if queue.is_empty() {
            inner.executable.remove(&sender);
        }
        tx
    }

    /// Returns deferred transactions to the front of their senders' queues. `deferred`
    /// must be in the pop order of [TransactionPool::best_transaction], so each sender's
    /// slice is nonce-ascending.
    pub fn requeue(&self, deferred: Vec<PooledTransaction>) {
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        for tx in deferred.into_iter().rev() {
            inner.executable.entry(tx.sender).or_default().push_front(tx);
        }
    }

    /// Whether any transaction is ready to be mined.
    pub fn has_executable(&self) -> bool {
        !self.inner.lock().expect("pool lock poisoned").executable.is_empty()
    }

    /// The sender's next unused nonce, counting queued executable transactions. Used to
    /// fill nonce defaults so consecutive submissions need no intermediate blocks.
    pub fn next_nonce(&self, sender: Address, account_nonce: u64) -> u64 {
        account_nonce + self.inner.lock().expect("pool lock poisoned").executable_count(sender)
    }

    /// Drops every pooled transaction, pending and executable alike.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        inner.executable.clear();
        inner.pending.clear();
        debug!(target: "pool", "pool cleared");
    }

    /// Suspends drain signaling. Admission continues while paused.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes drain signaling, re-arming the signal if executable work is waiting.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        if self.has_executable() {
            self.drain.notify_one();
        }
    }

    /// Waits until the executable set becomes non-empty. The instamine discipline parks
    /// here between bursts.
    pub async fn drained(&self) {
        self.drain.notified().await;
    }

    fn signal_drain(&self) {
        if !self.paused.load(Ordering::SeqCst) {
            self.drain.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
    use alloy_primitives::{Bytes, TxKind, U256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    const GAS_PRICE: u128 = 2_000_000_000;
    const BLOCK_GAS_LIMIT: u64 = 12_000_000;

    fn funded_account() -> TrieAccount {
        TrieAccount { balance: U256::from(10u128.pow(20)), ..Default::default() }
    }

    fn pool() -> TransactionPool {
        TransactionPool::new(GAS_PRICE, BLOCK_GAS_LIMIT)
    }

    fn transfer(signer: &PrivateKeySigner, nonce: u64, gas_price: u128) -> PooledTransaction {
        let tx = TxLegacy {
            chain_id: Some(1337),
            nonce,
            gas_price,
            gas_limit: 21_000,
            to: TxKind::Call(Address::repeat_byte(0x02)),
            value: U256::from(1u64),
            input: Bytes::new(),
        };
        let signature = signer.sign_hash_sync(&tx.signature_hash()).unwrap();
        PooledTransaction::from_envelope(TxEnvelope::Legacy(tx.into_signed(signature))).unwrap()
    }

    #[test]
    fn test_contiguous_nonce_is_executable() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        assert!(pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap());
        assert!(pool.add(transfer(&signer, 1, GAS_PRICE), &funded_account()).unwrap());
        assert!(pool.has_executable());
        assert_eq!(pool.next_nonce(signer.address(), 0), 2);
    }

    #[test]
    fn test_nonce_gap_goes_pending_until_promoted() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        assert!(!pool.add(transfer(&signer, 2, GAS_PRICE), &funded_account()).unwrap());
        assert!(!pool.has_executable());

        // Nonces 0 and 1 arrive; 2 is promoted behind them.
        assert!(pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap());
        assert!(pool.add(transfer(&signer, 1, GAS_PRICE), &funded_account()).unwrap());
        assert_eq!(pool.next_nonce(signer.address(), 0), 3);
    }

    #[test]
    fn test_rejections() {
        let pool = pool();
        let signer = PrivateKeySigner::random();

        let underpriced = transfer(&signer, 0, GAS_PRICE - 1);
        assert!(matches!(
            pool.add(underpriced, &funded_account()),
            Err(ValidationError::Underpriced { .. })
        ));

        let nonce_too_low = transfer(&signer, 0, GAS_PRICE);
        let account = TrieAccount { nonce: 5, ..funded_account() };
        assert!(matches!(
            pool.add(nonce_too_low, &account),
            Err(ValidationError::NonceTooLow { tx: 0, account: 5 })
        ));

        let broke = TrieAccount { balance: U256::from(1u64), ..Default::default() };
        assert!(matches!(
            pool.add(transfer(&signer, 0, GAS_PRICE), &broke),
            Err(ValidationError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_ordering_gas_price_then_arrival() {
        let pool = pool();
        let cheap = PrivateKeySigner::random();
        let rich = PrivateKeySigner::random();
        let early = PrivateKeySigner::random();

        pool.add(transfer(&early, 0, GAS_PRICE * 2), &funded_account()).unwrap();
        pool.add(transfer(&cheap, 0, GAS_PRICE), &funded_account()).unwrap();
        pool.add(transfer(&rich, 0, GAS_PRICE * 3), &funded_account()).unwrap();

        assert_eq!(pool.best_transaction().unwrap().sender, rich.address());
        assert_eq!(pool.best_transaction().unwrap().sender, early.address());
        assert_eq!(pool.best_transaction().unwrap().sender, cheap.address());
        assert!(pool.best_transaction().is_none());
    }

    #[test]
    fn test_sender_nonce_order_beats_gas_price() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        // The higher-priced nonce 1 cannot jump ahead of nonce 0.
        pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap();
        pool.add(transfer(&signer, 1, GAS_PRICE * 10), &funded_account()).unwrap();

        assert_eq!(pool.best_transaction().unwrap().nonce(), 0);
        assert_eq!(pool.best_transaction().unwrap().nonce(), 1);
    }

    #[test]
    fn test_requeue_preserves_order() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap();
        pool.add(transfer(&signer, 1, GAS_PRICE), &funded_account()).unwrap();

        let first = pool.best_transaction().unwrap();
        let second = pool.best_transaction().unwrap();
        pool.requeue(vec![first, second]);

        assert_eq!(pool.best_transaction().unwrap().nonce(), 0);
        assert_eq!(pool.best_transaction().unwrap().nonce(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap();
        pool.add(transfer(&signer, 5, GAS_PRICE), &funded_account()).unwrap();
        pool.clear();
        assert!(!pool.has_executable());
        assert_eq!(pool.next_nonce(signer.address(), 0), 0);
    }

    #[tokio::test]
    async fn test_drain_signal_on_executable() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap();
        // The permit was stored by the add above, so this resolves immediately.
        pool.drained().await;
    }

    #[tokio::test]
    async fn test_paused_pool_signals_on_resume() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        pool.pause();
        pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap();

        // No drain while paused; resume re-arms it because work is waiting.
        pool.resume();
        pool.drained().await;
        assert!(pool.has_executable());
    }

    #[test]
    fn test_replacement_of_queued_nonce() {
        let pool = pool();
        let signer = PrivateKeySigner::random();
        pool.add(transfer(&signer, 0, GAS_PRICE), &funded_account()).unwrap();
        let replacement = transfer(&signer, 0, GAS_PRICE * 4);
        let hash = replacement.hash;
        pool.add(replacement, &funded_account()).unwrap();

        let best = pool.best_transaction().unwrap();
        assert_eq!(best.hash, hash);
        assert!(pool.best_transaction().is_none());
    }
}
