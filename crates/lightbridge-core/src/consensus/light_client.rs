use std::collections::BTreeMap;

use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consensus::committee::Committee;
use crate::consensus::verifier::{verify_ledger_info, VerificationError};
use crate::execution::header::{decode_header_summary, HeaderSummary};
use crate::execution::proof::{verify_receipt_proof, DEFERRED_EXECUTION_EPOCHS};
use crate::types::execution::ReceiptProof;
use crate::types::pos::LedgerInfoWithSignatures;

/// Errors raised while advancing the light client.
/// Each variant represents a specific, actionable failure.
#[derive(Debug, Error)]
pub enum LightClientError {
    #[error("Ledger info carries no committee to trust")]
    MissingCommittee,

    #[error("Ledger info carries no pivot block decision")]
    MissingPivot,

    #[error("Pivot block hash {block_hash} is not a 32-byte hex string")]
    InvalidPivotHash { block_hash: String },

    #[error("Pivot header at height {height} does not match the pivot block decision")]
    PivotHeaderMismatch { height: u64 },

    #[error("Ledger info is from epoch {got} but the light client is at epoch {expected}")]
    EpochMismatch { expected: u64, got: u64 },

    #[error("Ledger info round {round} is not newer than current round {current_round}")]
    StaleRound { round: u64, current_round: u64 },

    #[error("Ledger info signatures do not verify against the current committee")]
    InvalidSignatures,

    #[error("Block headers down to {end} must be relayed before the next ledger info")]
    HeadersPending { end: u64 },

    #[error("No block headers are pending relay")]
    NoHeadersPending,

    #[error("Empty block header batch")]
    EmptyHeaders,

    #[error("Last header must be block {expected_height} with hash {expected_hash}, got block {height}")]
    HeaderMismatch {
        expected_height: u64,
        expected_hash: B256,
        height: u64,
    },

    #[error("Header at height {height} does not extend its predecessor")]
    BrokenHeaderChain { height: u64 },

    #[error("Header at height {height} is below the relay range starting at {start}")]
    HeaderOutOfRange { height: u64, start: u64 },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Invalid block header encoding: {0}")]
    HeaderEncoding(#[from] alloy_rlp::Error),
}

/// Observable state of a light client, as a destination verifier reports it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    pub epoch: u64,
    pub round: u64,
    pub earliest_block_number: u64,
    pub finalized_block_number: u64,
    /// First block of the header range still to relay.
    pub relay_block_start_number: u64,
    /// Last block of the header range still to relay, 0 when nothing is pending.
    pub relay_block_end_number: u64,
    pub relay_block_end_hash: B256,
    /// Number of block hashes retained.
    pub blocks: u64,
    pub max_blocks: u64,
}

/// An off-chain light client of the PoS chain.
///
/// Tracks the trusted committee, the latest verified `(epoch, round)` and the
/// hashes of PoW blocks up to the latest finalized pivot block. Receipt
/// proofs are checked against those block hashes.
#[derive(Clone, Debug)]
pub struct LightClient {
    committee: Committee,
    epoch: u64,
    round: u64,
    finalized_block_number: u64,
    relay_block_start_number: u64,
    relay_block_end_number: u64,
    relay_block_end_hash: B256,
    blocks: BTreeMap<u64, B256>,
    max_blocks: u64,
}

impl LightClient {
    /// Initialize from a trusted ledger info and the header of its pivot block.
    ///
    /// This is the one moment of trust: `ledger.next_epoch_state` must hold
    /// the committee of `ledger`'s own epoch, obtained out of band. No
    /// signature is checked.
    pub fn initialize(
        ledger: &LedgerInfoWithSignatures,
        pivot_header: &[u8],
        max_blocks: u64,
    ) -> Result<Self, LightClientError> {
        let state = ledger
            .next_epoch_state()
            .ok_or(LightClientError::MissingCommittee)?;
        let committee = Committee::from_epoch_state(state)?;
        if committee.epoch != ledger.epoch() {
            return Err(LightClientError::EpochMismatch {
                expected: ledger.epoch(),
                got: committee.epoch,
            });
        }

        let (height, hash) = pivot_of(ledger)?.ok_or(LightClientError::MissingPivot)?;
        let header = decode_header_summary(pivot_header)?;
        if header.height != height || header.hash != hash {
            return Err(LightClientError::PivotHeaderMismatch { height });
        }

        let mut blocks = BTreeMap::new();
        blocks.insert(height, hash);

        Ok(Self {
            committee,
            epoch: ledger.epoch(),
            round: ledger.round(),
            finalized_block_number: height,
            relay_block_start_number: 0,
            relay_block_end_number: 0,
            relay_block_end_hash: B256::ZERO,
            blocks,
            max_blocks,
        })
    }

    pub fn client_state(&self) -> ClientState {
        ClientState {
            epoch: self.epoch,
            round: self.round,
            earliest_block_number: self.earliest_block_number(),
            finalized_block_number: self.finalized_block_number,
            relay_block_start_number: self.relay_block_start_number,
            relay_block_end_number: self.relay_block_end_number,
            relay_block_end_hash: self.relay_block_end_hash,
            blocks: self.blocks.len() as u64,
            max_blocks: self.max_blocks,
        }
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    fn earliest_block_number(&self) -> u64 {
        self.blocks
            .keys()
            .next()
            .copied()
            .unwrap_or(self.finalized_block_number)
    }

    /// Verify and apply a ledger info signed by the current committee.
    ///
    /// A ledger carrying `next_epoch_state` moves the client to the next
    /// epoch. A pivot newer than the finalized block opens a header range
    /// `(finalized, pivot]` that must be filled by [`update_block_headers`]
    /// before the next ledger info is accepted.
    ///
    /// [`update_block_headers`]: Self::update_block_headers
    pub fn update(&mut self, ledger: &LedgerInfoWithSignatures) -> Result<(), LightClientError> {
        if self.relay_block_end_number != 0 {
            return Err(LightClientError::HeadersPending {
                end: self.relay_block_end_number,
            });
        }

        if ledger.epoch() != self.epoch {
            return Err(LightClientError::EpochMismatch {
                expected: self.epoch,
                got: ledger.epoch(),
            });
        }

        if ledger.round() <= self.round {
            return Err(LightClientError::StaleRound {
                round: ledger.round(),
                current_round: self.round,
            });
        }

        if !verify_ledger_info(ledger, &self.committee)? {
            return Err(LightClientError::InvalidSignatures);
        }

        let pivot = pivot_of(ledger)?;

        match ledger.next_epoch_state() {
            Some(next) => {
                self.committee = Committee::from_epoch_state(next)?;
                self.epoch = next.epoch;
                self.round = 0;
            }
            None => self.round = ledger.round(),
        }

        if let Some((height, hash)) = pivot {
            if height > self.finalized_block_number {
                self.relay_block_start_number = self.finalized_block_number + 1;
                self.relay_block_end_number = height;
                self.relay_block_end_hash = hash;
                self.finalized_block_number = height;
            }
        }

        Ok(())
    }

    /// Store a batch of consecutive headers, ending at the newest block still
    /// to relay.
    ///
    /// Headers are in ascending height order. The last one must be the
    /// expected end of the pending range and each must be the parent of the
    /// next. Afterwards the pending range ends just below the batch.
    pub fn update_block_headers(&mut self, headers: &[Bytes]) -> Result<(), LightClientError> {
        if self.relay_block_end_number == 0 {
            return Err(LightClientError::NoHeadersPending);
        }

        let summaries = headers
            .iter()
            .map(|header| decode_header_summary(header))
            .collect::<Result<Vec<HeaderSummary>, _>>()?;
        let (Some(first), Some(last)) = (summaries.first(), summaries.last()) else {
            return Err(LightClientError::EmptyHeaders);
        };

        if last.height != self.relay_block_end_number || last.hash != self.relay_block_end_hash {
            return Err(LightClientError::HeaderMismatch {
                expected_height: self.relay_block_end_number,
                expected_hash: self.relay_block_end_hash,
                height: last.height,
            });
        }

        if let Some(pair) = summaries
            .windows(2)
            .find(|pair| !is_parent_of(&pair[0], &pair[1]))
        {
            return Err(LightClientError::BrokenHeaderChain {
                height: pair[1].height,
            });
        }

        if first.height < self.relay_block_start_number {
            return Err(LightClientError::HeaderOutOfRange {
                height: first.height,
                start: self.relay_block_start_number,
            });
        }

        for summary in &summaries {
            self.blocks.insert(summary.height, summary.hash);
        }

        if first.height == self.relay_block_start_number {
            self.relay_block_start_number = 0;
            self.relay_block_end_number = 0;
            self.relay_block_end_hash = B256::ZERO;
        } else {
            self.relay_block_end_number = first.height - 1;
            self.relay_block_end_hash = first.parent_hash;
        }

        Ok(())
    }

    /// Drop up to `limit` of the oldest block hashes while more than
    /// `max_blocks` are retained. Returns how many were removed.
    pub fn remove_block_headers(&mut self, limit: u64) -> u64 {
        let mut removed = 0;
        while removed < limit && self.blocks.len() as u64 > self.max_blocks {
            if self.blocks.pop_first().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// The lowest retained block at or above `height`, which a receipt proof
    /// for `height` can be anchored to.
    pub fn nearest_pivot(&self, height: u64) -> Option<u64> {
        if height < self.earliest_block_number() {
            return None;
        }
        self.blocks.range(height..).next().map(|(number, _)| *number)
    }

    /// Verify a receipt proof against the retained block hashes.
    ///
    /// `proof.headers` must start at the block committing to the receipts of
    /// `proof.epoch_number`, form a parent chain, and end at a retained
    /// block. Structurally broken headers are an error; any other mismatch
    /// yields `false`.
    pub fn verify_receipt_proof(&self, proof: &ReceiptProof) -> Result<bool, LightClientError> {
        let summaries = proof
            .headers
            .iter()
            .map(|header| decode_header_summary(header))
            .collect::<Result<Vec<HeaderSummary>, _>>()?;
        let (Some(first), Some(last)) = (summaries.first(), summaries.last()) else {
            return Err(LightClientError::EmptyHeaders);
        };

        if proof.epoch_number.checked_add(DEFERRED_EXECUTION_EPOCHS) != Some(first.height) {
            return Ok(false);
        }

        let linked = summaries.windows(2).all(|pair| is_parent_of(&pair[0], &pair[1]));
        if !linked || self.blocks.get(&last.height) != Some(&last.hash) {
            return Ok(false);
        }

        Ok(verify_receipt_proof(&first.deferred_receipts_root, proof))
    }
}

/// Whether `child` directly extends `parent`, by hash and by height.
fn is_parent_of(parent: &HeaderSummary, child: &HeaderSummary) -> bool {
    child.parent_hash == parent.hash && parent.height.checked_add(1) == Some(child.height)
}

/// Height and hash of a ledger's pivot decision, if it has one.
fn pivot_of(ledger: &LedgerInfoWithSignatures) -> Result<Option<(u64, B256)>, LightClientError> {
    ledger
        .pivot()
        .map(|pivot| {
            pivot
                .block_hash_bytes()
                .map(|hash| (pivot.height, B256::from(hash)))
                .ok_or_else(|| LightClientError::InvalidPivotHash {
                    block_hash: pivot.block_hash.clone(),
                })
        })
        .transpose()
}
