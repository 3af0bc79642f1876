use blst::min_pk::PublicKey;

use super::verifier::VerificationError;
use crate::types::bls::{BlsPublicKey, BLS_UNCOMPRESSED_PUBKEY_LEN};
use crate::types::pos::{AccountAddress, EpochState};

/// One committee member, with its key already decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatorInfo {
    pub account: AccountAddress,
    pub public_key: BlsPublicKey,
    /// Decompressed form of `public_key`, derived locally.
    pub uncompressed_public_key: [u8; BLS_UNCOMPRESSED_PUBKEY_LEN],
    pub vrf_public_key: Option<Vec<u8>>,
    pub voting_power: u64,
    pub(crate) key: PublicKey,
}

/// The validator set trusted to sign ledger infos of one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct Committee {
    pub epoch: u64,
    /// Sorted by account.
    pub validators: Vec<ValidatorInfo>,
    pub quorum_voting_power: u64,
    pub total_voting_power: u64,
    pub vrf_seed: Vec<u8>,
}

impl Committee {
    /// Decode the committee announced by an epoch state.
    ///
    /// Every public key must be a valid compressed G1 point in the prime
    /// order subgroup; a committee with an undecodable key is rejected whole.
    pub fn from_epoch_state(state: &EpochState) -> Result<Self, VerificationError> {
        let validators = state
            .verifier
            .address_to_validator_info
            .iter()
            .map(|(account, info)| {
                let invalid = |reason: String| VerificationError::InvalidPublicKey {
                    account: *account,
                    reason,
                };
                let public_key =
                    BlsPublicKey::from_bytes(&info.public_key).map_err(|e| invalid(e.to_string()))?;
                let key = PublicKey::key_validate(&public_key.0)
                    .map_err(|e| invalid(format!("{:?}", e)))?;

                Ok(ValidatorInfo {
                    account: *account,
                    public_key,
                    uncompressed_public_key: key.serialize(),
                    vrf_public_key: info.vrf_public_key.clone(),
                    voting_power: info.voting_power,
                    key,
                })
            })
            .collect::<Result<Vec<_>, VerificationError>>()?;

        Ok(Self {
            epoch: state.epoch,
            validators,
            quorum_voting_power: state.verifier.quorum_voting_power,
            total_voting_power: state.verifier.total_voting_power,
            vrf_seed: state.vrf_seed.clone(),
        })
    }

    pub fn validator(&self, account: &AccountAddress) -> Option<&ValidatorInfo> {
        self.validators
            .binary_search_by(|v| v.account.cmp(account))
            .ok()
            .map(|index| &self.validators[index])
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
