//! Ordered-trie helpers for transaction and receipt roots.

use alloy_primitives::B256;
use alloy_rlp::{BufMut, Encodable};
use alloy_trie::{HashBuilder, Nibbles};

/// Computes the root of a trie whose keys are the RLP-encoded positions of the items and
/// whose values are produced by `encode`. This is the commitment shape of the
/// `transactionsRoot` and `receiptsRoot` header fields.
pub fn ordered_trie_root_with_encoder<T, F>(items: &[T], mut encode: F) -> B256
where
    F: FnMut(&T, &mut dyn BufMut),
{
    let mut builder = HashBuilder::default();
    let mut key = Vec::new();
    let mut leaf = Vec::new();

    // The builder requires leaves in key order, which for RLP-encoded positions is not
    // positional order; see [rlp_key_order].
    for position in rlp_key_order(items.len()) {
        key.clear();
        position.encode(&mut key);
        leaf.clear();
        encode(&items[position], &mut leaf);
        builder.add_leaf(Nibbles::unpack(&key), &leaf);
    }

    builder.root()
}

/// Yields `0..len` in the lexicographic order of the positions' RLP encodings: the
/// single-byte encodings of 1 through 127 (`0x01..=0x7f`) come first, the empty-payload
/// encoding of zero (`0x80`) follows, and the length-prefixed encodings of 128 and above
/// close the sequence.
fn rlp_key_order(len: usize) -> impl Iterator<Item = usize> {
    let single_byte = 1..len.min(0x80);
    let zero = (len > 0).then_some(0);
    let prefixed = 0x80..len;
    single_byte.chain(zero).chain(prefixed)
}
