use alloy_primitives::{Address, Bloom, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::trie::ProofNode;

/// Execution outcome of a transaction, as reported in its receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OutcomeStatus {
    Success = 0,
    Failure = 1,
    /// Packed into a block but not executed. Skipped receipts never get a proof.
    Skipped = 2,
}

impl From<OutcomeStatus> for u8 {
    fn from(status: OutcomeStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for OutcomeStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::Failure),
            2 => Ok(Self::Skipped),
            other => Err(format!("invalid outcome status {other}")),
        }
    }
}

/// The address space a log was emitted in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSpace {
    #[default]
    Native = 1,
    Evm = 2,
}

/// A log entry emitted by a contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub space: LogSpace,
}

/// Storage collateral locked or released for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub address: Address,
    pub collaterals: u64,
}

/// A transaction receipt as returned by the source chain.
///
/// Only the fields that feed the receipt's canonical RLP encoding (see
/// `execution::receipt`) are committed to by the receipts trie; the rest
/// locate the receipt within its epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    /// Position of the receipt within its block, skipped receipts included.
    pub index: u64,
    pub block_hash: B256,
    pub epoch_number: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub accumulated_gas_used: U256,
    pub gas_fee: U256,
    pub gas_covered_by_sponsor: bool,
    pub logs_bloom: Bloom,
    pub logs: Vec<Log>,
    pub outcome_status: OutcomeStatus,
    pub storage_covered_by_sponsor: bool,
    /// Storage collateral charged to the sender (or the sponsored contract).
    pub storage_collateralized: u64,
    #[serde(default)]
    pub storage_released: Vec<StorageChange>,
    #[serde(default)]
    pub tx_exec_error_msg: Option<String>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.outcome_status == OutcomeStatus::Success
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome_status == OutcomeStatus::Skipped
    }
}

/// A PoW block header of the source chain.
///
/// The header hash is keccak256 of its RLP encoding; see
/// `execution::header::encode_block_header`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub parent_hash: B256,
    pub height: u64,
    pub timestamp: u64,
    pub author: Address,
    pub transactions_root: B256,
    pub deferred_state_root: B256,
    pub deferred_receipts_root: B256,
    pub deferred_logs_bloom_hash: B256,
    pub blame: u64,
    pub difficulty: U256,
    pub adaptive: bool,
    pub gas_limit: U256,
    #[serde(default)]
    pub referee_hashes: Vec<B256>,
    pub nonce: U256,
    #[serde(default)]
    pub pos_reference: Option<B256>,
    #[serde(default)]
    pub base_fee_per_gas: Option<U256>,
    /// Base fee of the EVM space block at the same height. Required whenever
    /// `base_fee_per_gas` is set.
    #[serde(default)]
    pub evm_base_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub custom: Vec<Bytes>,
    pub epoch_number: u64,
}

/// Inclusion proof of one receipt within an epoch.
///
/// Two trie levels: `block_proof` proves `receipts_root` is the root of block
/// `block_index` in the epoch receipts trie, `receipt_proof` proves `receipt`
/// is entry `index` of that block's receipts trie. `headers` are the RLP
/// encoded headers from the deferred execution epoch up to the pivot block
/// the destination verifier already trusts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptProof {
    pub epoch_number: u64,
    pub headers: Vec<Bytes>,
    pub block_index: Bytes,
    pub block_proof: Vec<ProofNode>,
    pub receipts_root: B256,
    pub index: Bytes,
    /// Canonical RLP encoding of the receipt.
    pub receipt: Bytes,
    pub receipt_proof: Vec<ProofNode>,
}
