use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, Signature};
use blst::BLST_ERROR;
use thiserror::Error;

use super::committee::Committee;
use crate::codec::{CanonicalEncode, EncodeError};
use crate::types::pos::{AccountAddress, LedgerInfo, LedgerInfoWithSignatures};

/// Domain prefix of every signed ledger info: `sha3_256("DIEM::LedgerInfo")`.
pub const LEDGER_INFO_HASH_PREFIX: [u8; 32] = [
    0xcd, 0x51, 0x0d, 0x1a, 0xb5, 0x83, 0xc3, 0x3b, 0x54, 0xfa, 0x94, 0x90, 0x14, 0x60, 0x1d, 0xf0,
    0x66, 0x48, 0x57, 0xc1, 0x8c, 0x4c, 0xfb, 0x22, 0x8c, 0x86, 0x2d, 0xd8, 0x69, 0xdf, 0x1b, 0x62,
];

/// Hash-to-curve domain separation tag (proof-of-possession scheme).
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Errors that can occur during ledger info signature verification.
/// Each variant represents a specific, actionable failure. A signature that
/// simply does not verify is not an error: `verify_ledger_info` returns `false`.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Ledger info is from epoch {ledger_epoch} but the committee is for epoch {committee_epoch}")]
    EpochMismatch {
        ledger_epoch: u64,
        committee_epoch: u64,
    },

    #[error("Signer {account} is not a member of the committee")]
    UnknownSigner { account: AccountAddress },

    #[error("Insufficient voting power: signers hold {voting_power} (need at least {required})")]
    InsufficientVotingPower { voting_power: u64, required: u64 },

    #[error("Malformed signature share from {account}: {reason}")]
    MalformedSignature {
        account: AccountAddress,
        reason: String,
    },

    #[error("Invalid BLS public key for {account}: {reason}")]
    InvalidPublicKey {
        account: AccountAddress,
        reason: String,
    },

    #[error("Failed to encode ledger info: {0}")]
    Encode(#[from] EncodeError),

    #[error("BLS aggregation error: {0}")]
    BlsError(String),
}

/// The exact bytes committee members sign for `ledger_info`.
pub fn signing_message(ledger_info: &LedgerInfo) -> Result<Vec<u8>, EncodeError> {
    let mut message = LEDGER_INFO_HASH_PREFIX.to_vec();
    ledger_info.encode_to(&mut message)?;
    Ok(message)
}

/// Verify the committee signatures on a ledger info.
///
/// Returns `Ok(false)` when nobody signed or when the aggregate signature
/// does not verify, and an error when the inputs are structurally wrong:
/// the committee is for another epoch, a signer is not in the committee,
/// the signers lack quorum or a signature share cannot be decoded.
///
/// The shares are aggregated and checked with a single pairing against the
/// aggregate public key of exactly the signing accounts.
pub fn verify_ledger_info(
    ledger: &LedgerInfoWithSignatures,
    committee: &Committee,
) -> Result<bool, VerificationError> {
    if ledger.signatures.is_empty() {
        return Ok(false);
    }

    if ledger.epoch() != committee.epoch {
        return Err(VerificationError::EpochMismatch {
            ledger_epoch: ledger.epoch(),
            committee_epoch: committee.epoch,
        });
    }

    let message = signing_message(&ledger.ledger_info)?;

    // Collect the signers and their voting power
    let mut voting_power: u64 = 0;
    let mut pubkeys: Vec<&PublicKey> = Vec::with_capacity(ledger.signatures.len());
    for account in ledger.signatures.keys() {
        let validator = committee
            .validator(account)
            .ok_or(VerificationError::UnknownSigner { account: *account })?;
        voting_power = voting_power.saturating_add(validator.voting_power);
        pubkeys.push(&validator.key);
    }

    if voting_power < committee.quorum_voting_power {
        return Err(VerificationError::InsufficientVotingPower {
            voting_power,
            required: committee.quorum_voting_power,
        });
    }

    let signatures = ledger
        .signatures
        .iter()
        .map(|(account, share)| {
            Signature::from_bytes(&share.0).map_err(|e| VerificationError::MalformedSignature {
                account: *account,
                reason: format!("{:?}", e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sig_refs: Vec<&Signature> = signatures.iter().collect();
    let agg_sig = AggregateSignature::aggregate(&sig_refs, true).map_err(|e| {
        VerificationError::BlsError(format!("Failed to aggregate signatures: {:?}", e))
    })?;

    let agg_pk = AggregatePublicKey::aggregate(&pubkeys, false).map_err(|e| {
        VerificationError::BlsError(format!("Failed to aggregate public keys: {:?}", e))
    })?;

    let result = agg_sig.to_signature().verify(
        true,
        &message,
        BLS_DST,
        &[],
        &agg_pk.to_public_key(),
        false,
    );
    Ok(result == BLST_ERROR::BLST_SUCCESS)
}
