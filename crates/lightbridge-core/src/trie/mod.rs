//! # Radix Trie and Inclusion Proofs
//!
//! A hexary radix trie over fixed-width, big-endian index keys `0..N`, used to
//! commit to the receipts of a block, the blocks of an epoch and the
//! transactions of a block.
//!
//! Unlike the Ethereum Merkle-Patricia trie there are no extension nodes:
//! every node is either a branch (with the path segment it consumes before
//! branching) or a leaf. Node hashes fold the node's own path in, see
//! [`NibblePath::compute_merkle`].
//!
//! ## Trust Model
//!
//! [`verify_proof`] needs nothing but a root hash obtained from verified
//! consensus data. Every proof node is re-hashed and checked against the
//! hash its parent committed to; a proof that fails any check is rejected
//! with `false`, never with a panic.

mod key;
mod nibble_path;
mod node;
mod proof;

pub use key::{index_to_key, min_repr_bytes, to_index_bytes};
pub use nibble_path::NibblePath;
pub use proof::{verify_proof, ProofNode};

use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use node::{BranchNode, TrieNode};

/// A 32-byte keccak hash.
pub type Hash = [u8; 32];

/// Number of child slots of a branch node.
pub const CHILDREN_COUNT: usize = 16;

/// keccak256 of the empty string. Marks empty child slots and empty tries.
pub const EMPTY_HASH: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Errors raised while building a trie. All of them are caller bugs: keys
/// are expected to be distinct, non-empty and of one width.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    #[error("Empty key: trie keys must be at least one byte")]
    EmptyKey,

    #[error("Key length mismatch: trie holds {expected}-nibble keys, got {got} nibbles")]
    KeyLengthMismatch { expected: usize, got: usize },

    #[error("Key is a prefix of an existing key")]
    KeyTooShort,

    #[error("Duplicate key inserted into trie")]
    DuplicateKey,
}

/// Compute keccak256 hash of data.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// A build-once, query-many radix trie.
///
/// The root is always a branch, even for a single entry, so callers never
/// special-case a bare leaf at the top.
#[derive(Debug, Default)]
pub struct Trie {
    root: BranchNode,
    key_len: Option<usize>,
    entries: usize,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trie over `values`, the value at position `i` stored under
    /// `index_to_key(i, values.len())`.
    pub fn from_values<I, V>(values: I) -> Result<Self, TrieError>
    where
        I: IntoIterator<Item = V>,
        I::IntoIter: ExactSizeIterator,
        V: Into<Vec<u8>>,
    {
        let values = values.into_iter();
        let key_len = min_repr_bytes(values.len());

        let mut trie = Self::new();
        for (index, value) in values.enumerate() {
            trie.insert(&to_index_bytes(index, key_len), value.into())?;
        }
        Ok(trie)
    }

    /// Insert `value` under `key`. Keys are expected in increasing order and
    /// must all have the same width.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        if key.is_empty() {
            return Err(TrieError::EmptyKey);
        }
        let expected = *self.key_len.get_or_insert(key.len());
        if expected != key.len() {
            return Err(TrieError::KeyLengthMismatch {
                expected: expected * 2,
                got: key.len() * 2,
            });
        }

        self.root.insert(NibblePath::from_key(key), value)?;
        self.entries += 1;
        Ok(())
    }

    /// Number of inserted entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Root hash of the trie.
    ///
    /// An empty trie hashes to [`EMPTY_HASH`]. A root with a single child
    /// contributes no hash layer of its own: the child's hash is the root.
    pub fn root_hash(&self) -> Hash {
        match &self.root.children[..2] {
            [None, _] => EMPTY_HASH,
            [Some(only), None] => only.merkle(),
            _ => self.root.merkle(),
        }
    }

    /// Proof of inclusion for `key`, ordered root to leaf. `None` when the
    /// key is not in the trie.
    pub fn proof(&self, key: &[u8]) -> Option<Vec<ProofNode>> {
        if key.is_empty() {
            return None;
        }
        let path = NibblePath::from_key(key);

        match &self.root.children[..2] {
            [None, _] => None,
            // The collapsed root is skipped; the key must select its only child.
            [Some(only), None] => {
                let (index, rest) = path.to_child()?;
                if index != 0 {
                    return None;
                }
                proof::collect(only, rest)
            }
            _ => proof::collect_from_branch(&self.root, path),
        }
    }
}
