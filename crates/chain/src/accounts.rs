//! Read access to account state, plus deterministic development-account derivation.

use crate::ChainResult;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::Decodable;
use alloy_signer_local::PrivateKeySigner;
use cinder_mpt::StateTrie;
use cinder_primitives::TrieAccount;
use cinder_storage::KeyValueStore;
use std::sync::Arc;

/// Resolves account state against the world trie at a requested state root. Reads only;
/// the single write path, [AccountManager::put_account], is used during genesis seeding.
#[derive(Debug)]
pub struct AccountManager {
    kv: Arc<dyn KeyValueStore>,
}

impl AccountManager {
    /// Creates a new [AccountManager] over the given store.
    pub const fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn trie_at(&self, root: B256) -> StateTrie {
        StateTrie::at_root(self.kv.clone(), root)
    }

    /// Fetches the account under `address` at the given state root. Absent accounts read
    /// as the empty account.
    pub fn account(&self, root: B256, address: Address) -> ChainResult<TrieAccount> {
        let trie = self.trie_at(root);
        let Some(raw) = trie.get(keccak256(address).as_slice())? else {
            return Ok(TrieAccount::default());
        };
        let account = TrieAccount::decode(&mut raw.as_ref())
            .map_err(cinder_mpt::TrieError::Rlp)?;
        Ok(account)
    }

    /// Fetches the storage slot `slot` of `address` at the given state root. Absent slots
    /// read as zero.
    pub fn storage_at(&self, root: B256, address: Address, slot: U256) -> ChainResult<U256> {
        let account = self.account(root, address)?;
        let trie = self.trie_at(root);
        let key = keccak256(slot.to_be_bytes::<32>());
        let Some(raw) = trie.get_at(account.storage_root, key.as_slice())? else {
            return Ok(U256::ZERO);
        };
        let value =
            U256::decode(&mut raw.as_ref()).map_err(cinder_mpt::TrieError::Rlp)?;
        Ok(value)
    }

    /// Fetches the deployed bytecode of `address` at the given state root.
    pub fn code(&self, root: B256, address: Address) -> ChainResult<Bytes> {
        let account = self.account(root, address)?;
        if !account.has_code() {
            return Ok(Bytes::new());
        }
        let trie = self.trie_at(root);
        Ok(trie.code_by_hash(account.code_hash)?.unwrap_or_default())
    }

    /// Writes an account into the given trie. Genesis seeding only.
    pub(crate) fn put_account(
        trie: &mut StateTrie,
        address: Address,
        account: &TrieAccount,
    ) -> ChainResult<()> {
        let mut encoded = Vec::new();
        alloy_rlp::Encodable::encode(account, &mut encoded);
        trie.insert(keccak256(address).as_slice(), encoded.into())?;
        Ok(())
    }
}

/// A generated development account: a funded address together with its secret key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevAccount {
    /// The account address.
    pub address: Address,
    /// The secp256k1 secret key.
    pub secret_key: B256,
}

/// Derives `count` development accounts deterministically from `seed`. The same seed
/// always yields the same accounts, so test suites can hardcode addresses.
pub fn derive_dev_accounts(seed: &str, count: usize) -> Vec<DevAccount> {
    let mut accounts = Vec::with_capacity(count);
    for index in 0..count as u64 {
        // Rejection-sample the keccak stream until the candidate is a valid scalar.
        let mut attempt = 0u64;
        loop {
            let mut material = seed.as_bytes().to_vec();
            material.extend_from_slice(&index.to_be_bytes());
            material.extend_from_slice(&attempt.to_be_bytes());
            let secret_key = keccak256(material);
            if let Ok(signer) = PrivateKeySigner::from_bytes(&secret_key) {
                accounts.push(DevAccount { address: signer.address(), secret_key });
                break;
            }
            attempt += 1;
        }
    }
    accounts
}
