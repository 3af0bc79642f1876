//! PoS consensus data: committees, ledger infos and chain status.
//!
//! `LedgerInfo` and everything it contains implement [`CanonicalEncode`];
//! that encoding is the exact byte string committee members sign. Field
//! order in the `canonical_record!` invocations is therefore part of the
//! wire contract.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::bls::BlsSignature;
use super::serde_hex;
use crate::canonical_record;
use crate::codec::{CanonicalEncode, EncodeError};

/// A PoS account address (32 bytes).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountAddress(pub [u8; 32]);

impl AccountAddress {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "Invalid account address length")?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_hex::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl CanonicalEncode for AccountAddress {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.0.encode_to(out)
    }
}

/// Consensus keys and voting power of one validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConsensusInfo {
    /// Compressed BLS public key (48 bytes).
    #[serde(with = "serde_hex")]
    pub public_key: Vec<u8>,
    /// VRF public key, absent when the validator does not take part in VRF.
    #[serde(with = "serde_hex::option", default)]
    pub vrf_public_key: Option<Vec<u8>>,
    pub voting_power: u64,
}

canonical_record!(ValidatorConsensusInfo { public_key, vrf_public_key, voting_power });

/// The validator set of an epoch and the voting power needed for quorum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorVerifier {
    pub address_to_validator_info: BTreeMap<AccountAddress, ValidatorConsensusInfo>,
    pub quorum_voting_power: u64,
    pub total_voting_power: u64,
}

canonical_record!(ValidatorVerifier {
    address_to_validator_info,
    quorum_voting_power,
    total_voting_power,
});

/// The committee trusted to sign ledger infos during `epoch`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochState {
    pub epoch: u64,
    pub verifier: ValidatorVerifier,
    #[serde(with = "serde_hex")]
    pub vrf_seed: Vec<u8>,
}

canonical_record!(EpochState { epoch, verifier, vrf_seed });

/// The latest PoW pivot block finalized by PoS consensus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotBlockDecision {
    pub height: u64,
    /// `0x`-prefixed hex block hash. Signed as a string, not as raw bytes.
    pub block_hash: String,
}

canonical_record!(PivotBlockDecision { height, block_hash });

impl PivotBlockDecision {
    /// Decoded block hash.
    pub fn block_hash_bytes(&self) -> Option<[u8; 32]> {
        serde_hex::decode(&self.block_hash)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
    }
}

/// What a committed PoS block commits to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub epoch: u64,
    pub round: u64,
    #[serde(with = "serde_hex")]
    pub id: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub executed_state_id: Vec<u8>,
    pub version: u64,
    pub timestamp_usecs: u64,
    /// Committee of the next epoch, present on the last block of an epoch.
    #[serde(default)]
    pub next_epoch_state: Option<EpochState>,
    #[serde(default)]
    pub pivot: Option<PivotBlockDecision>,
}

canonical_record!(BlockInfo {
    epoch,
    round,
    id,
    executed_state_id,
    version,
    timestamp_usecs,
    next_epoch_state,
    pivot,
});

/// The consensus checkpoint committee members sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfo {
    pub commit_info: BlockInfo,
    #[serde(with = "serde_hex")]
    pub consensus_data_hash: Vec<u8>,
}

canonical_record!(LedgerInfo { commit_info, consensus_data_hash });

/// A ledger info together with the signature shares of the committee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfoWithSignatures {
    pub ledger_info: LedgerInfo,
    /// Signature share of each signing validator.
    #[serde(default)]
    pub signatures: BTreeMap<AccountAddress, BlsSignature>,
}

canonical_record!(LedgerInfoWithSignatures { ledger_info } skip { signatures });

impl LedgerInfoWithSignatures {
    pub fn epoch(&self) -> u64 {
        self.ledger_info.commit_info.epoch
    }

    pub fn round(&self) -> u64 {
        self.ledger_info.commit_info.round
    }

    pub fn next_epoch_state(&self) -> Option<&EpochState> {
        self.ledger_info.commit_info.next_epoch_state.as_ref()
    }

    pub fn pivot(&self) -> Option<&PivotBlockDecision> {
        self.ledger_info.commit_info.pivot.as_ref()
    }
}

/// PoS consensus status of the source chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Number of the latest committed PoS block.
    pub latest_committed: u64,
    pub epoch: u64,
    #[serde(default)]
    pub latest_voted: Option<u64>,
}

/// A committed PoS block, as far as the relay needs it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosBlock {
    pub height: u64,
    pub epoch: u64,
    pub round: u64,
    #[serde(default)]
    pub pivot_decision: Option<PivotBlockDecision>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn sample_ledger() -> LedgerInfo {
        LedgerInfo {
            commit_info: BlockInfo {
                epoch: 2,
                round: 7,
                id: vec![0xaa; 2],
                executed_state_id: vec![0xbb],
                version: 300,
                timestamp_usecs: 1,
                next_epoch_state: None,
                pivot: Some(PivotBlockDecision {
                    height: 5,
                    block_hash: "0x01".to_string(),
                }),
            },
            consensus_data_hash: vec![0xcc],
        }
    }

    #[test]
    fn test_ledger_info_encoding_layout() {
        let encoded = sample_ledger().to_canonical_bytes().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&7u64.to_le_bytes());
        expected.extend_from_slice(&[2, 0xaa, 0xaa]);
        expected.extend_from_slice(&[1, 0xbb]);
        expected.extend_from_slice(&300u64.to_le_bytes());
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.push(0); // no next epoch state
        expected.push(1); // pivot present
        expected.extend_from_slice(&5u64.to_le_bytes());
        expected.extend_from_slice(&[4, b'0', b'x', b'0', b'1']);
        expected.extend_from_slice(&[1, 0xcc]);

        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_signatures_are_not_encoded() {
        let ledger = sample_ledger();
        let mut with_sigs = LedgerInfoWithSignatures {
            ledger_info: ledger.clone(),
            signatures: BTreeMap::new(),
        };
        let unsigned = with_sigs.to_canonical_bytes().unwrap();

        with_sigs
            .signatures
            .insert(AccountAddress([1; 32]), BlsSignature([2; 192]));
        assert_eq!(with_sigs.to_canonical_bytes().unwrap(), unsigned);
        assert_eq!(unsigned, ledger.to_canonical_bytes().unwrap());
    }

    #[test]
    fn test_validator_map_uses_fixed_width_keys() {
        let mut infos = BTreeMap::new();
        infos.insert(
            AccountAddress([0x02; 32]),
            ValidatorConsensusInfo {
                public_key: vec![0x11],
                vrf_public_key: None,
                voting_power: 1,
            },
        );
        let verifier = ValidatorVerifier {
            address_to_validator_info: infos,
            quorum_voting_power: 1,
            total_voting_power: 1,
        };

        let encoded = verifier.to_canonical_bytes().unwrap();
        assert_eq!(encoded[0], 1);
        assert_eq!(&encoded[1..33], &[0x02; 32]);
        assert_eq!(&encoded[33..36], &[1, 0x11, 0]);
    }

    #[test]
    fn test_ledger_json_parses_camel_case() {
        let json = r#"{
            "ledgerInfo": {
                "commitInfo": {
                    "epoch": 3,
                    "round": 1,
                    "id": "0x0102",
                    "executedStateId": "0x03",
                    "version": 10,
                    "timestampUsecs": 99,
                    "nextEpochState": null,
                    "pivot": { "height": 12, "blockHash": "0x00000000000000000000000000000000000000000000000000000000000000ff" }
                },
                "consensusDataHash": "0x04"
            },
            "signatures": {}
        }"#;

        let ledger: LedgerInfoWithSignatures = serde_json::from_str(json).unwrap();
        assert_eq!(ledger.epoch(), 3);
        assert_eq!(ledger.round(), 1);
        assert_eq!(ledger.pivot().unwrap().height, 12);
        assert_eq!(
            ledger.pivot().unwrap().block_hash_bytes(),
            Some(hex!("00000000000000000000000000000000000000000000000000000000000000ff"))
        );
    }
}
