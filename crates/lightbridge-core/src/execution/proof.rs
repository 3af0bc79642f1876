use alloy_primitives::{Bytes, B256};
use thiserror::Error;

use super::receipt::encode_receipt;
use crate::trie::{index_to_key, verify_proof, Trie, TrieError};
use crate::types::execution::*;

/// Receipts of epoch `n` are committed to by the pivot block of epoch
/// `n + DEFERRED_EXECUTION_EPOCHS`.
pub const DEFERRED_EXECUTION_EPOCHS: u64 = 5;

/// Errors while building receipt proofs.
/// Each variant is specific enough to diagnose exactly what went wrong.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("Transaction execution failed: a failed transaction has no receipt proof")]
    ExecutionFailed,

    #[error("Trie construction failed: {0}")]
    Trie(#[from] TrieError),

    #[error("Receipt index {index} is out of range for block {block_index} with {count} receipts")]
    ReceiptIndexOutOfRange {
        block_index: usize,
        index: u64,
        count: usize,
    },

    #[error("Failed to generate the {level} proof")]
    ProofGeneration { level: &'static str },

    #[error("Block header at height {height} has a base fee but no EVM base fee")]
    MissingEvmBaseFee { height: u64 },

    #[error("Invalid pivot {pivot}: receipts of epoch {epoch} are committed at epoch {committed_at}")]
    InvalidPivot {
        epoch: u64,
        pivot: u64,
        committed_at: u64,
    },
}

/// Transactions trie of a block: entry `i` is the hash of its `i`th transaction.
pub fn transactions_trie(tx_hashes: &[B256]) -> Result<Trie, ProofError> {
    Ok(Trie::from_values(tx_hashes.iter().map(|hash| hash.to_vec()))?)
}

/// The receipts tries of an epoch.
///
/// Returns one trie per block (entry `i` is the canonical encoding of the
/// block's `i`th receipt, skipped ones included) and the epoch trie whose
/// entry `j` is the root of block `j`'s trie.
pub fn receipts_tries(epoch_receipts: &[Vec<TransactionReceipt>]) -> Result<(Vec<Trie>, Trie), ProofError> {
    let block_tries = epoch_receipts
        .iter()
        .map(|receipts| Trie::from_values(receipts.iter().map(encode_receipt)))
        .collect::<Result<Vec<_>, _>>()?;

    let epoch_trie = Trie::from_values(block_tries.iter().map(|trie| trie.root_hash().to_vec()))?;
    Ok((block_tries, epoch_trie))
}

/// Root of the epoch receipts trie, as committed to by block headers.
pub fn epoch_receipts_root(epoch_receipts: &[Vec<TransactionReceipt>]) -> Result<B256, ProofError> {
    let (_, epoch_trie) = receipts_tries(epoch_receipts)?;
    Ok(B256::from(epoch_trie.root_hash()))
}

/// Locate a receipt by transaction hash, ignoring skipped receipts.
fn match_receipt<'a>(
    epoch_receipts: &'a [Vec<TransactionReceipt>],
    tx_hash: &B256,
) -> Option<(usize, &'a TransactionReceipt)> {
    epoch_receipts.iter().enumerate().find_map(|(block_index, receipts)| {
        receipts
            .iter()
            .find(|receipt| !receipt.is_skipped() && receipt.transaction_hash == *tx_hash)
            .map(|receipt| (block_index, receipt))
    })
}

/// Build the two-level inclusion proof of the receipt of `tx_hash`.
///
/// Returns `Ok(None)` when the transaction is not in the epoch, so the
/// caller can retry later, and [`ProofError::ExecutionFailed`] when it is
/// but did not succeed. `headers` is left empty; the caller attaches the
/// header chain up to a pivot the verifier trusts.
pub fn build_receipt_proof(
    epoch_number: u64,
    epoch_receipts: &[Vec<TransactionReceipt>],
    tx_hash: &B256,
) -> Result<Option<ReceiptProof>, ProofError> {
    let Some((block_index, receipt)) = match_receipt(epoch_receipts, tx_hash) else {
        return Ok(None);
    };

    if !receipt.is_success() {
        return Err(ProofError::ExecutionFailed);
    }

    let block_receipts = &epoch_receipts[block_index];
    let position = usize::try_from(receipt.index)
        .ok()
        .filter(|&position| position < block_receipts.len())
        .ok_or(ProofError::ReceiptIndexOutOfRange {
            block_index,
            index: receipt.index,
            count: block_receipts.len(),
        })?;

    let (block_tries, epoch_trie) = receipts_tries(epoch_receipts)?;

    let block_key = index_to_key(block_index, block_tries.len());
    let block_proof = epoch_trie
        .proof(&block_key)
        .ok_or(ProofError::ProofGeneration { level: "block" })?;

    let block_trie = &block_tries[block_index];
    let receipt_key = index_to_key(position, block_receipts.len());
    let receipt_proof = block_trie
        .proof(&receipt_key)
        .ok_or(ProofError::ProofGeneration { level: "receipt" })?;

    Ok(Some(ReceiptProof {
        epoch_number,
        headers: Vec::new(),
        block_index: Bytes::from(block_key),
        block_proof,
        receipts_root: B256::from(block_trie.root_hash()),
        index: Bytes::from(receipt_key),
        receipt: Bytes::from(encode_receipt(&block_receipts[position])),
        receipt_proof,
    }))
}

/// Verify both levels of a receipt proof against the epoch receipts root.
///
/// Any inconsistency yields `false`. The header chain in `proof.headers` is
/// not inspected here; see `LightClient::verify_receipt_proof`.
pub fn verify_receipt_proof(epoch_receipts_root: &B256, proof: &ReceiptProof) -> bool {
    verify_proof(
        &epoch_receipts_root.0,
        &proof.block_index,
        proof.receipts_root.as_slice(),
        &proof.block_proof,
    ) && verify_proof(
        &proof.receipts_root.0,
        &proof.index,
        &proof.receipt,
        &proof.receipt_proof,
    )
}
