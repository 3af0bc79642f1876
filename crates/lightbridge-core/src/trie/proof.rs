use serde::{Deserialize, Serialize};

use super::nibble_path::NibblePath;
use super::node::{compute_node_merkle, BranchNode, TrieNode};
use super::{keccak256, Hash, CHILDREN_COUNT, EMPTY_HASH};

/// One step of an inclusion proof: a trie node reduced to what is needed to
/// recompute its hash.
///
/// A leaf is recognised by [`EMPTY_HASH`] in child slot 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    /// The node's path, trimmed to a byte-aligned window of the key.
    pub path: NibblePath,
    /// Hashes of the 16 children, [`EMPTY_HASH`] for empty slots.
    #[serde(with = "children_serde")]
    pub children: [Hash; CHILDREN_COUNT],
    /// Leaf value, empty for branches.
    #[serde(with = "crate::types::serde_hex")]
    pub value: Vec<u8>,
}

impl ProofNode {
    fn from_node(node: &TrieNode) -> Self {
        Self {
            path: node.path().trim(),
            children: node.children_hashes(),
            value: node.value().to_vec(),
        }
    }

    /// Hash of the node this proof step stands for.
    pub fn compute_merkle(&self) -> Hash {
        let body = compute_node_merkle(&self.children, &self.value);
        self.path.compute_merkle(&body)
    }

    pub fn is_leaf(&self) -> bool {
        self.children[0] == EMPTY_HASH
    }
}

/// Collect proof nodes from `node` down to the leaf at `path`.
pub(crate) fn collect(node: &TrieNode, path: NibblePath) -> Option<Vec<ProofNode>> {
    match node {
        TrieNode::Branch(branch) => collect_from_branch(branch, path),
        TrieNode::Leaf(leaf) => {
            let (_, own_rest, rest) = leaf.path.common_prefix(&path);
            if !own_rest.is_empty() || !rest.is_empty() {
                return None;
            }
            Some(vec![ProofNode::from_node(node)])
        }
    }
}

pub(crate) fn collect_from_branch(branch: &BranchNode, path: NibblePath) -> Option<Vec<ProofNode>> {
    let (_, own_rest, rest) = branch.path.common_prefix(&path);
    if !own_rest.is_empty() {
        return None;
    }

    let (index, child_path) = rest.to_child()?;
    let child = branch.children[usize::from(index)].as_ref()?;

    let mut nodes = vec![ProofNode {
        path: branch.path.trim(),
        children: branch.children_hashes(),
        value: Vec::new(),
    }];
    nodes.extend(collect(child, child_path)?);
    Some(nodes)
}

/// Verify that `value` is stored under `key` in the trie with root `root`.
///
/// Walks `proof` from the root: each node must hash to what its parent (or
/// the root) committed to, and its path must match the next nibbles of the
/// key. The walk must end on a leaf that consumes the whole key and holds
/// `value`. Any mismatch, including malformed nodes, yields `false`.
pub fn verify_proof(root: &Hash, key: &[u8], value: &[u8], proof: &[ProofNode]) -> bool {
    if key.is_empty() || proof.is_empty() {
        return false;
    }
    if !proof.iter().all(|node| node.path.is_well_formed()) {
        return false;
    }

    let mut path = NibblePath::from_key(key);

    // A proof that starts below a collapsed root consumes one nibble less than
    // the key holds; that nibble must be 0.
    let consumed: usize = proof
        .iter()
        .map(|node| node.path.len() + usize::from(!node.is_leaf()))
        .sum();
    if consumed % 2 == 1 {
        match path.to_child() {
            Some((0, rest)) => path = rest,
            _ => return false,
        }
    }

    let mut expected = *root;
    for node in proof {
        if node.compute_merkle() != expected {
            return false;
        }

        let (_, own_rest, rest) = node.path.common_prefix(&path);
        if !own_rest.is_empty() {
            return false;
        }

        if node.is_leaf() {
            return rest.is_empty() && keccak256(value) == keccak256(&node.value);
        }

        let Some((index, child_path)) = rest.to_child() else {
            return false;
        };
        path = child_path;
        expected = node.children[usize::from(index)];
    }

    false
}

mod children_serde {
    use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

    use super::{Hash, CHILDREN_COUNT};

    pub fn serialize<S>(children: &[Hash; CHILDREN_COUNT], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: Vec<String> = children
            .iter()
            .map(|child| format!("0x{}", hex::encode(child)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[Hash; CHILDREN_COUNT], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        if encoded.len() != CHILDREN_COUNT {
            return Err(serde::de::Error::custom(format!(
                "expected {CHILDREN_COUNT} children hashes, got {}",
                encoded.len()
            )));
        }

        let mut children = [[0u8; 32]; CHILDREN_COUNT];
        for (slot, s) in children.iter_mut().zip(&encoded) {
            let s = s.strip_prefix("0x").unwrap_or(s);
            let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
            if bytes.len() != 32 {
                return Err(serde::de::Error::custom("child hash must be 32 bytes"));
            }
            slot.copy_from_slice(&bytes);
        }
        Ok(children)
    }
}
