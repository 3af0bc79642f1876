use serde::{Deserialize, Serialize};

use super::serde_hex;

/// Number of bytes in a compressed BLS12-381 public key (G1).
pub const BLS_PUBKEY_LEN: usize = 48;

/// Number of bytes in an uncompressed BLS12-381 public key (G1).
pub const BLS_UNCOMPRESSED_PUBKEY_LEN: usize = 96;

/// Number of bytes in a compressed BLS12-381 signature (G2).
pub const BLS_COMPRESSED_SIGNATURE_LEN: usize = 96;

/// Number of bytes in an uncompressed BLS12-381 signature (G2).
/// Committee members publish their shares in this form.
pub const BLS_SIGNATURE_LEN: usize = 192;

/// A BLS12-381 public key (48 bytes, compressed G1 point).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlsPublicKey(pub [u8; BLS_PUBKEY_LEN]);

impl Serialize for BlsPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_hex::serialize(self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for BlsPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_hex::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl BlsPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        let arr: [u8; BLS_PUBKEY_LEN] = bytes
            .try_into()
            .map_err(|_| "Invalid BLS public key length")?;
        Ok(Self(arr))
    }
}

/// A BLS12-381 signature share (192 bytes, uncompressed G2 point).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlsSignature(pub [u8; BLS_SIGNATURE_LEN]);

impl Serialize for BlsSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_hex::serialize(self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for BlsSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_hex::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl BlsSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        let arr: [u8; BLS_SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| "Invalid BLS signature length")?;
        Ok(Self(arr))
    }
}
