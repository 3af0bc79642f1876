use std::sync::OnceLock;

use super::nibble_path::NibblePath;
use super::{keccak256, Hash, TrieError, CHILDREN_COUNT, EMPTY_HASH};

/// Children hashes of a leaf: every slot empty.
pub(crate) const LEAF_CHILDREN: [Hash; CHILDREN_COUNT] = [EMPTY_HASH; CHILDREN_COUNT];

/// A trie node. There are no extension nodes: a branch carries the path
/// segment consumed before it branches.
#[derive(Debug)]
pub(crate) enum TrieNode {
    Branch(BranchNode),
    Leaf(LeafNode),
}

#[derive(Debug, Default)]
pub(crate) struct BranchNode {
    pub(crate) path: NibblePath,
    pub(crate) children: [Option<Box<TrieNode>>; CHILDREN_COUNT],
    merkle: OnceLock<Hash>,
}

#[derive(Debug)]
pub(crate) struct LeafNode {
    pub(crate) path: NibblePath,
    pub(crate) value: Vec<u8>,
    merkle: OnceLock<Hash>,
}

impl LeafNode {
    /// Leaf placed below the first nibble of `path`, returned with that nibble.
    fn below(path: &NibblePath, value: Vec<u8>) -> Result<(u8, LeafNode), TrieError> {
        let (index, rest) = path.to_child().ok_or(TrieError::KeyTooShort)?;
        let leaf = LeafNode {
            path: rest,
            value,
            merkle: OnceLock::new(),
        };
        Ok((index, leaf))
    }

    fn merkle(&self) -> Hash {
        *self.merkle.get_or_init(|| {
            let body = compute_node_merkle(&LEAF_CHILDREN, &self.value);
            self.path.compute_merkle(&body)
        })
    }
}

impl BranchNode {
    pub(crate) fn new(path: NibblePath, children: [Option<Box<TrieNode>>; CHILDREN_COUNT]) -> Self {
        Self {
            path,
            children,
            merkle: OnceLock::new(),
        }
    }

    /// Insert `value` at `path`, where `path` is relative to this node.
    pub(crate) fn insert(&mut self, path: NibblePath, value: Vec<u8>) -> Result<(), TrieError> {
        self.merkle = OnceLock::new();

        let (prefix, own_rest, new_rest) = self.path.common_prefix(&path);
        if new_rest.is_empty() {
            return Err(TrieError::KeyTooShort);
        }

        if own_rest.is_empty() {
            let (index, leaf) = LeafNode::below(&new_rest, value)?;
            let slot = &mut self.children[usize::from(index)];
            match slot {
                Some(child) => child.insert(leaf.path, leaf.value)?,
                None => *slot = Some(Box::new(TrieNode::Leaf(leaf))),
            }
            return Ok(());
        }

        // Keys diverge inside this node's path: push the current contents one
        // level down and hang the new leaf next to them.
        let (existing_index, existing_path) = own_rest.to_child().ok_or(TrieError::KeyTooShort)?;
        let existing = BranchNode::new(existing_path, std::mem::take(&mut self.children));
        let (new_index, leaf) = LeafNode::below(&new_rest, value)?;

        self.path = prefix;
        self.children[usize::from(existing_index)] = Some(Box::new(TrieNode::Branch(existing)));
        self.children[usize::from(new_index)] = Some(Box::new(TrieNode::Leaf(leaf)));
        Ok(())
    }

    pub(crate) fn children_hashes(&self) -> [Hash; CHILDREN_COUNT] {
        let mut hashes = [EMPTY_HASH; CHILDREN_COUNT];
        for (hash, child) in hashes.iter_mut().zip(&self.children) {
            if let Some(child) = child {
                *hash = child.merkle();
            }
        }
        hashes
    }

    pub(crate) fn merkle(&self) -> Hash {
        *self.merkle.get_or_init(|| {
            let body = compute_node_merkle(&self.children_hashes(), &[]);
            self.path.compute_merkle(&body)
        })
    }
}

impl TrieNode {
    pub(crate) fn path(&self) -> &NibblePath {
        match self {
            TrieNode::Branch(branch) => &branch.path,
            TrieNode::Leaf(leaf) => &leaf.path,
        }
    }

    pub(crate) fn value(&self) -> &[u8] {
        match self {
            TrieNode::Branch(_) => &[],
            TrieNode::Leaf(leaf) => &leaf.value,
        }
    }

    pub(crate) fn children_hashes(&self) -> [Hash; CHILDREN_COUNT] {
        match self {
            TrieNode::Branch(branch) => branch.children_hashes(),
            TrieNode::Leaf(_) => LEAF_CHILDREN,
        }
    }

    /// Merkle hash of this node, computed once and cached.
    pub(crate) fn merkle(&self) -> Hash {
        match self {
            TrieNode::Branch(branch) => branch.merkle(),
            TrieNode::Leaf(leaf) => leaf.merkle(),
        }
    }

    fn insert(&mut self, path: NibblePath, value: Vec<u8>) -> Result<(), TrieError> {
        match self {
            TrieNode::Branch(branch) => branch.insert(path, value),
            TrieNode::Leaf(leaf) => {
                if leaf.path.len() != path.len() {
                    return Err(TrieError::KeyLengthMismatch {
                        expected: leaf.path.len(),
                        got: path.len(),
                    });
                }

                let (prefix, old_rest, new_rest) = leaf.path.common_prefix(&path);
                if old_rest.is_empty() {
                    return Err(TrieError::DuplicateKey);
                }

                let (old_index, old_leaf) = LeafNode::below(&old_rest, std::mem::take(&mut leaf.value))?;
                let (new_index, new_leaf) = LeafNode::below(&new_rest, value)?;

                let mut branch = BranchNode::new(prefix, Default::default());
                branch.children[usize::from(old_index)] = Some(Box::new(TrieNode::Leaf(old_leaf)));
                branch.children[usize::from(new_index)] = Some(Box::new(TrieNode::Leaf(new_leaf)));
                *self = TrieNode::Branch(branch);
                Ok(())
            }
        }
    }
}

/// Body hash of a node: `keccak('n' ‖ children ‖ ('v' ‖ value)?)`.
/// The value section is present only for a non-empty value.
pub(crate) fn compute_node_merkle(children: &[Hash; CHILDREN_COUNT], value: &[u8]) -> Hash {
    let mut buffer = Vec::with_capacity(1 + CHILDREN_COUNT * 32 + 1 + value.len());
    buffer.push(b'n');
    for child in children {
        buffer.extend_from_slice(child);
    }
    if !value.is_empty() {
        buffer.push(b'v');
        buffer.extend_from_slice(value);
    }
    keccak256(&buffer)
}
