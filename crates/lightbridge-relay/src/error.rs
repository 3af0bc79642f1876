use lightbridge_core::{ProofError, B256};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the relay loop and the proof generator.
///
/// Fatal variants mean forward progress is impossible without operator
/// intervention; [`crate::Relayer::run`] returns on them. Every other variant
/// is logged and retried on the next iteration.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid relay configuration: {0}")]
    Misconfigured(#[from] ConfigError),

    #[error("Ledger info of epoch {epoch} not found")]
    LedgerNotFound { epoch: u64 },

    #[error("Ledger info of epoch {epoch} carries no next epoch committee")]
    CommitteeNotFound { epoch: u64 },

    #[error("Ledger info of epoch {epoch} round {round} carries no pivot block")]
    PivotNotFound { epoch: u64, round: u64 },

    #[error("Latest committed PoS block {height} not found")]
    LatestCommittedBlockNotFound { height: u64 },

    #[error("Block header of epoch {epoch} not found")]
    BlockHeaderNotFound { epoch: u64 },

    #[error("Block header {hash} not found")]
    BlockHeaderByHashNotFound { hash: B256 },

    #[error("No retained block at or above height {height} to anchor a receipt proof")]
    NoRetainedPivot { height: u64 },

    #[error("Transaction {tx_hash} failed: {reason}")]
    TransactionFailed { tx_hash: B256, reason: String },

    #[error("No receipt for transaction {tx_hash} after {waited:?}")]
    ReceiptTimeout {
        tx_hash: B256,
        waited: std::time::Duration,
    },

    #[error("Relay cancelled")]
    Cancelled,

    #[error("Chain source request failed: {0:#}")]
    Source(#[source] anyhow::Error),

    #[error("Light node request failed: {0:#}")]
    LightNode(#[source] anyhow::Error),

    #[error(transparent)]
    Proof(#[from] ProofError),
}

impl RelayError {
    /// Whether the relay loop must stop on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Misconfigured(_)
                | Self::LedgerNotFound { .. }
                | Self::CommitteeNotFound { .. }
                | Self::PivotNotFound { .. }
                | Self::LatestCommittedBlockNotFound { .. }
        )
    }
}
