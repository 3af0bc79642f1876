//! The destination light node contract as the relay sees it.

use async_trait::async_trait;
use lightbridge_core::{Address, Bytes, ClientState, LedgerInfoWithSignatures, B256};
use serde::{Deserialize, Serialize};

/// Per-transaction submission options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    /// Fixed gas limit, estimated by the client when unset.
    pub gas_limit: Option<u64>,
}

/// Outcome of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceiptStatus {
    pub success: bool,
    pub error_message: Option<String>,
}

/// Client of the destination light node.
///
/// Submissions return the transaction hash as soon as the transaction is
/// accepted; the relay polls [`transaction_receipt`](Self::transaction_receipt)
/// for its outcome.
#[async_trait]
pub trait LightNodeClient: Send + Sync {
    async fn client_state(&self) -> anyhow::Result<ClientState>;

    async fn initialize(
        &self,
        admin: Address,
        mpt_verifier: Address,
        ledger: &LedgerInfoWithSignatures,
        pivot_header: Bytes,
        opts: TxOptions,
    ) -> anyhow::Result<B256>;

    async fn update_light_client(&self, ledger: &LedgerInfoWithSignatures, opts: TxOptions) -> anyhow::Result<B256>;

    async fn update_block_headers(&self, headers: Vec<Bytes>, opts: TxOptions) -> anyhow::Result<B256>;

    async fn remove_block_headers(&self, limit: u64, opts: TxOptions) -> anyhow::Result<B256>;

    /// `Ok(None)` until the transaction is mined.
    async fn transaction_receipt(&self, tx_hash: &B256) -> anyhow::Result<Option<TxReceiptStatus>>;

    /// Lowest retained block at or above `height`.
    async fn nearest_pivot(&self, height: u64) -> anyhow::Result<Option<u64>>;
}
