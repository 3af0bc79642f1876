use lightbridge_core::{
    build_receipt_proof, encode_block_headers, ProofError, ReceiptProof, B256, DEFERRED_EXECUTION_EPOCHS,
};
use tracing::debug;

use crate::error::RelayError;
use crate::light_node::LightNodeClient;
use crate::source::ChainSource;

/// Builds receipt proofs the destination light node can verify.
pub struct ProofGenerator<S, L> {
    source: S,
    light_node: L,
}

impl<S: ChainSource, L: LightNodeClient> ProofGenerator<S, L> {
    pub fn new(source: S, light_node: L) -> Self {
        Self { source, light_node }
    }

    /// Proof of the receipt of `tx_hash`, anchored to the nearest block the
    /// light node retains.
    ///
    /// Returns `Ok(None)` while the transaction is unknown or not yet
    /// executed; the caller should retry later. A transaction that did not
    /// succeed is [`ProofError::ExecutionFailed`].
    pub async fn create_receipt_proof(&self, tx_hash: &B256) -> Result<Option<ReceiptProof>, RelayError> {
        let Some(receipt) = self
            .source
            .transaction_receipt(tx_hash)
            .await
            .map_err(RelayError::Source)?
        else {
            return Ok(None);
        };

        if !receipt.is_success() {
            return Err(ProofError::ExecutionFailed.into());
        }

        let height = receipt.epoch_number + DEFERRED_EXECUTION_EPOCHS;
        let pivot = self
            .light_node
            .nearest_pivot(height)
            .await
            .map_err(RelayError::LightNode)?
            .ok_or(RelayError::NoRetainedPivot { height })?;

        self.create_receipt_proof_at(tx_hash, receipt.epoch_number, pivot)
            .await
    }

    /// Proof of the receipt of `tx_hash` executed in `epoch_number`, with the
    /// header chain up to `pivot`.
    pub async fn create_receipt_proof_at(
        &self,
        tx_hash: &B256,
        epoch_number: u64,
        pivot: u64,
    ) -> Result<Option<ReceiptProof>, RelayError> {
        let committed_at = epoch_number + DEFERRED_EXECUTION_EPOCHS;
        if committed_at > pivot {
            return Err(ProofError::InvalidPivot {
                epoch: epoch_number,
                pivot,
                committed_at,
            }
            .into());
        }

        let Some(epoch_receipts) = self
            .source
            .epoch_receipts(epoch_number)
            .await
            .map_err(RelayError::Source)?
        else {
            debug!(epoch = epoch_number, "Epoch receipts not available");
            return Ok(None);
        };

        let Some(mut proof) = build_receipt_proof(epoch_number, &epoch_receipts, tx_hash)? else {
            return Ok(None);
        };

        let mut headers = Vec::with_capacity((pivot + 1 - committed_at) as usize);
        for epoch in committed_at..=pivot {
            let header = self
                .source
                .block_header_by_epoch(epoch)
                .await
                .map_err(RelayError::Source)?
                .ok_or(RelayError::BlockHeaderNotFound { epoch })?;
            headers.push(header);
        }
        proof.headers = encode_block_headers(&headers)?;

        debug!(%tx_hash, epoch = epoch_number, pivot, "Created receipt proof");
        Ok(Some(proof))
    }
}
