#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod errors;
pub use errors::{TrieError, TrieResult};

mod node;
pub use node::TrieNode;

mod trie;
pub use trie::StateTrie;

mod ordered;
pub use ordered::ordered_trie_root_with_encoder;
