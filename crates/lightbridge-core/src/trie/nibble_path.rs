use serde::{Deserialize, Serialize};

use super::{keccak256, Hash};

/// A view `[start, end)` over the nibbles of a key.
///
/// Slicing never copies nibbles out of the backing array: a path keeps the
/// nibbles of the whole key it came from. Hashing a path whose end is odd
/// packs the nibble right after `end` into the last byte, so the backing
/// array is part of the path's identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNibblePath")]
pub struct NibblePath {
    #[serde(with = "crate::types::serde_hex")]
    nibbles: Vec<u8>,
    start: usize,
    end: usize,
}

/// Wire form of a [`NibblePath`], checked before it becomes one.
#[derive(Deserialize)]
struct RawNibblePath {
    #[serde(with = "crate::types::serde_hex")]
    nibbles: Vec<u8>,
    start: usize,
    end: usize,
}

impl TryFrom<RawNibblePath> for NibblePath {
    type Error = String;

    fn try_from(raw: RawNibblePath) -> Result<Self, Self::Error> {
        let path = Self {
            nibbles: raw.nibbles,
            start: raw.start,
            end: raw.end,
        };
        if !path.is_well_formed() {
            return Err(format!(
                "malformed nibble path: [{}, {}) over {} nibbles",
                path.start,
                path.end,
                path.nibbles.len()
            ));
        }
        Ok(path)
    }
}

impl NibblePath {
    /// Path over every nibble of `key`, high nibble first.
    pub fn from_key(key: &[u8]) -> Self {
        let nibbles: Vec<u8> = key.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect();
        let end = nibbles.len();
        Self {
            nibbles,
            start: 0,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The nibbles this path covers.
    pub fn nibbles(&self) -> &[u8] {
        &self.nibbles[self.start..self.end]
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// First nibble of a non-empty path.
    pub fn first(&self) -> Option<u8> {
        self.nibbles().first().copied()
    }

    /// Split off the leading nibble: the child slot to descend into and the
    /// path that remains below it.
    pub fn to_child(&self) -> Option<(u8, NibblePath)> {
        let index = self.first()?;
        let child = Self {
            nibbles: self.nibbles.clone(),
            start: self.start + 1,
            end: self.end,
        };
        Some((index, child))
    }

    /// Longest common prefix with `other`.
    ///
    /// Returns `(prefix, rest_of_self, rest_of_other)`. The prefix and
    /// `rest_of_self` share this path's backing nibbles.
    pub fn common_prefix(&self, other: &NibblePath) -> (NibblePath, NibblePath, NibblePath) {
        let offset = self
            .nibbles()
            .iter()
            .zip(other.nibbles())
            .take_while(|(a, b)| a == b)
            .count();

        let prefix = Self {
            nibbles: self.nibbles.clone(),
            start: self.start,
            end: self.start + offset,
        };
        let rest = Self {
            nibbles: self.nibbles.clone(),
            start: self.start + offset,
            end: self.end,
        };
        let other_rest = Self {
            nibbles: other.nibbles.clone(),
            start: other.start + offset,
            end: other.end,
        };
        (prefix, rest, other_rest)
    }

    /// Fold this path into a node body hash.
    ///
    /// An empty path leaves the body hash untouched. Otherwise the result is
    /// `keccak(descriptor ‖ packed path ‖ body)` where the descriptor byte is
    /// `128`, plus `64` when the path starts on a low nibble, plus `len % 63`.
    pub fn compute_merkle(&self, node_merkle: &Hash) -> Hash {
        if self.is_empty() {
            return *node_merkle;
        }

        let mut descriptor = 128usize;
        if self.start % 2 == 1 {
            descriptor += 64;
        }
        descriptor += self.len() % 63;

        let mut buffer = Vec::with_capacity(1 + self.len() / 2 + 1 + 32);
        buffer.push(descriptor as u8);
        buffer.extend_from_slice(&self.full_bytes());
        buffer.extend_from_slice(node_merkle);
        keccak256(&buffer)
    }

    /// Pack the path into bytes: a lone leading nibble when `start` is odd,
    /// then nibble pairs up to `end` rounded up to even.
    fn full_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.len() / 2 + 2);

        let mut start = self.start;
        if start % 2 == 1 {
            result.push(self.nibbles[start]);
            start += 1;
        }

        let end = self.end + self.end % 2;
        for i in (start..end).step_by(2) {
            result.push((self.nibbles[i] << 4) + self.nibbles[i + 1]);
        }
        result
    }

    /// Re-slice the backing nibbles to the byte-aligned range around this
    /// path, keeping `start` parity. This is the form shipped in proofs.
    pub fn trim(&self) -> NibblePath {
        if self.is_empty() {
            return NibblePath::default();
        }

        let aligned_start = self.start - self.start % 2;
        let mut result = Self {
            nibbles: self.nibbles[aligned_start..].to_vec(),
            start: self.start - aligned_start,
            end: self.end - aligned_start,
        };

        let aligned_end = result.end + result.end % 2;
        if aligned_end < result.nibbles.len() {
            result.nibbles.truncate(aligned_end);
        }
        result
    }

    /// Whether the path is internally consistent: bounds inside the backing
    /// array (including the padding nibble hashing reads) and every entry a
    /// real nibble. Paths decoded from untrusted proofs must pass this first.
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
            && self.end + self.end % 2 <= self.nibbles.len()
            && self.nibbles.iter().all(|n| *n < 16)
    }
}
