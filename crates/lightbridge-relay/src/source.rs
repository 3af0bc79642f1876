//! Read access to the source chain.

use async_trait::async_trait;
use lightbridge_core::{BlockHeader, LedgerInfoWithSignatures, PosBlock, Status, TransactionReceipt, B256};

/// Queries the relay and proof generator make against a source chain node.
///
/// `Ok(None)` means the node answered and the item does not exist; transport
/// failures are `Err`.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// The last ledger info of `epoch`, whose `next_epoch_state` announces
    /// the committee of `epoch + 1`.
    async fn ledger_info_by_epoch(&self, epoch: u64) -> anyhow::Result<Option<LedgerInfoWithSignatures>>;

    async fn ledger_info_by_epoch_and_round(
        &self,
        epoch: u64,
        round: u64,
    ) -> anyhow::Result<Option<LedgerInfoWithSignatures>>;

    async fn pos_status(&self) -> anyhow::Result<Status>;

    async fn pos_block_by_number(&self, height: u64) -> anyhow::Result<Option<PosBlock>>;

    /// Pivot block header of an execution epoch.
    async fn block_header_by_epoch(&self, epoch: u64) -> anyhow::Result<Option<BlockHeader>>;

    async fn block_header_by_hash(&self, hash: &B256) -> anyhow::Result<Option<BlockHeader>>;

    /// Receipts of every block of `epoch`, in execution order.
    async fn epoch_receipts(&self, epoch: u64) -> anyhow::Result<Option<Vec<Vec<TransactionReceipt>>>>;

    async fn transaction_receipt(&self, tx_hash: &B256) -> anyhow::Result<Option<TransactionReceipt>>;
}
