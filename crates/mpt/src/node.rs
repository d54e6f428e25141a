//! This module contains the [TrieNode] type and its RLP codec.
//!
//! Child references are always 32-byte hashes of the referenced node's encoding; the
//! development chain does not inline short nodes, so roots are internally consistent but
//! intentionally not byte-compatible with mainnet tries.

use alloy_primitives::{keccak256, Bytes, B256};
use alloy_rlp::{Decodable, Encodable};

/// The length of a branch node's RLP item list.
const BRANCH_LIST_LENGTH: usize = 17;

/// The length of a leaf or extension node's RLP item list.
const LEAF_OR_EXTENSION_LIST_LENGTH: usize = 2;

/// Prefix for even-nibbled extension node paths.
const PREFIX_EXTENSION_EVEN: u8 = 0;

/// Prefix for odd-nibbled extension node paths.
const PREFIX_EXTENSION_ODD: u8 = 1;

/// Prefix for even-nibbled leaf node paths.
const PREFIX_LEAF_EVEN: u8 = 2;

/// Prefix for odd-nibbled leaf node paths.
const PREFIX_LEAF_ODD: u8 = 3;

/// A [TrieNode] is a node within a Merkle Patricia Trie.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TrieNode {
    /// The empty node, represented by the empty-trie root hash.
    Empty,
    /// A leaf node holds the remainder of a key path and the value stored under it.
    Leaf {
        /// The path remainder, in nibbles.
        path: Vec<u8>,
        /// The stored value.
        value: Bytes,
    },
    /// An extension node holds a shared path prefix and a reference to its only child.
    Extension {
        /// The shared path prefix, in nibbles.
        path: Vec<u8>,
        /// The hash of the child node.
        child: B256,
    },
    /// A branch node refers to up to 16 children, one per next nibble, plus an optional
    /// value for keys that terminate at the branch.
    Branch {
        /// The children, indexed by nibble.
        children: Box<[Option<B256>; 16]>,
        /// The value stored at the branch itself, if any.
        value: Option<Bytes>,
    },
}

impl TrieNode {
    /// RLP-encodes the node.
    pub fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// The keccak hash of the node's encoding, i.e. the reference under which the node is
    /// stored.
    pub fn hash(&self) -> B256 {
        keccak256(self.encoded())
    }

    fn items(&self) -> Vec<Bytes> {
        match self {
            Self::Empty => Vec::new(),
            Self::Leaf { path, value } => {
                vec![encode_path(path, true).into(), value.clone()]
            }
            Self::Extension { path, child } => {
                vec![encode_path(path, false).into(), Bytes::copy_from_slice(child.as_slice())]
            }
            Self::Branch { children, value } => {
                let mut items: Vec<Bytes> = children
                    .iter()
                    .map(|child| {
                        child.map_or(Bytes::new(), |h| Bytes::copy_from_slice(h.as_slice()))
                    })
                    .collect();
                items.push(value.clone().unwrap_or_default());
                items
            }
        }
    }
}

impl Encodable for TrieNode {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.items().encode(out);
    }

    fn length(&self) -> usize {
        self.items().length()
    }
}

impl Decodable for TrieNode {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let items = Vec::<Bytes>::decode(buf)?;
        match items.len() {
            BRANCH_LIST_LENGTH => {
                let mut children = Box::new([None; 16]);
                for (slot, item) in children.iter_mut().zip(&items[..16]) {
                    *slot = match item.len() {
                        0 => None,
                        32 => Some(B256::from_slice(item)),
                        _ => return Err(alloy_rlp::Error::UnexpectedLength),
                    };
                }
                let value = (!items[16].is_empty()).then(|| items[16].clone());
                Ok(Self::Branch { children, value })
            }
            LEAF_OR_EXTENSION_LIST_LENGTH => {
                let (path, is_leaf) = decode_path(&items[0])?;
                if is_leaf {
                    Ok(Self::Leaf { path, value: items[1].clone() })
                } else {
                    if items[1].len() != 32 {
                        return Err(alloy_rlp::Error::UnexpectedLength);
                    }
                    Ok(Self::Extension { path, child: B256::from_slice(&items[1]) })
                }
            }
            _ => Err(alloy_rlp::Error::UnexpectedLength),
        }
    }
}

/// Packs a nibble path into its hex-prefix encoding.
fn encode_path(nibbles: &[u8], leaf: bool) -> Vec<u8> {
    let odd = nibbles.len() % 2 == 1;
    let prefix = match (leaf, odd) {
        (false, false) => PREFIX_EXTENSION_EVEN,
        (false, true) => PREFIX_EXTENSION_ODD,
        (true, false) => PREFIX_LEAF_EVEN,
        (true, true) => PREFIX_LEAF_ODD,
    };

    let mut out = Vec::with_capacity(1 + nibbles.len() / 2);
    let mut rest = nibbles;
    if odd {
        out.push((prefix << 4) | nibbles[0]);
        rest = &nibbles[1..];
    } else {
        out.push(prefix << 4);
    }
    for pair in rest.chunks_exact(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
    out
}

/// Unpacks a hex-prefix encoded path into nibbles, returning whether it marks a leaf.
fn decode_path(encoded: &[u8]) -> alloy_rlp::Result<(Vec<u8>, bool)> {
    let first = *encoded.first().ok_or(alloy_rlp::Error::InputTooShort)?;
    let prefix = first >> 4;
    let (is_leaf, odd) = match prefix {
        PREFIX_EXTENSION_EVEN => (false, false),
        PREFIX_EXTENSION_ODD => (false, true),
        PREFIX_LEAF_EVEN => (true, false),
        PREFIX_LEAF_ODD => (true, true),
        _ => return Err(alloy_rlp::Error::Custom("unexpected path identifier")),
    };

    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if odd {
        nibbles.push(first & 0x0f);
    }
    for byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    Ok((nibbles, is_leaf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_roundtrip_even() {
        let nibbles = vec![0xa, 0x2, 0x0, 0xf];
        let encoded = encode_path(&nibbles, false);
        assert_eq!(encoded[0] >> 4, PREFIX_EXTENSION_EVEN);
        assert_eq!(decode_path(&encoded).unwrap(), (nibbles, false));
    }

    #[test]
    fn test_path_roundtrip_odd_leaf() {
        let nibbles = vec![0x7, 0xa, 0x2];
        let encoded = encode_path(&nibbles, true);
        assert_eq!(encoded[0] >> 4, PREFIX_LEAF_ODD);
        assert_eq!(decode_path(&encoded).unwrap(), (nibbles, true));
    }

    #[test]
    fn test_leaf_rlp_roundtrip() {
        let node = TrieNode::Leaf { path: vec![0x1, 0x2, 0x3], value: Bytes::from(vec![0xff]) };
        let decoded = TrieNode::decode(&mut node.encoded().as_slice()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn test_extension_rlp_roundtrip() {
        let node =
            TrieNode::Extension { path: vec![0x0, 0xd, 0xe], child: B256::repeat_byte(0x42) };
        let decoded = TrieNode::decode(&mut node.encoded().as_slice()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn test_branch_rlp_roundtrip() {
        let mut children = Box::new([None; 16]);
        children[3] = Some(B256::repeat_byte(0x01));
        children[0xf] = Some(B256::repeat_byte(0x02));
        let node = TrieNode::Branch { children, value: Some(Bytes::from(vec![0x2a])) };
        let decoded = TrieNode::decode(&mut node.encoded().as_slice()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn test_branch_without_value_roundtrip() {
        let mut children = Box::new([None; 16]);
        children[0] = Some(B256::repeat_byte(0x99));
        let node = TrieNode::Branch { children, value: None };
        let decoded = TrieNode::decode(&mut node.encoded().as_slice()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn test_distinct_nodes_have_distinct_hashes() {
        let a = TrieNode::Leaf { path: vec![0x1], value: Bytes::from(vec![0x01]) };
        let b = TrieNode::Leaf { path: vec![0x1], value: Bytes::from(vec![0x02]) };
        assert_ne!(a.hash(), b.hash());
    }
}
