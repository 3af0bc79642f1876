//! In-memory collaborators for relay tests.
//!
//! The chain holds 40 chained block headers, committees for epochs 2 and 3,
//! and signed ledger infos:
//!
//! | ledger     | pivot | next committee |
//! |------------|-------|----------------|
//! | epoch 1    | -     | epoch 2        |
//! | (2, 1)     | 10    | -              |
//! | (2, 2)     | absent                 |
//! | (2, 3)     | 10    | -              |
//! | (2, 4)     | 14    | -              |
//! | (2, 5)     | 14    | epoch 3        |
//! | (3, 1)     | 20    | -              |
//!
//! Receipts of execution epoch 6 are committed to by header 11.

use std::collections::{BTreeMap, HashMap};

use anyhow::anyhow;
use async_trait::async_trait;
use blst::min_pk::SecretKey;
use lightbridge_core::consensus::verifier::BLS_DST;
use lightbridge_core::execution::epoch_receipts_root;
use lightbridge_core::execution::header::decode_header_summary;
use lightbridge_core::types::bls::BlsSignature;
use lightbridge_core::{
    block_hash, encode_block_header, signing_message, AccountAddress, Address, BlockHeader, BlockInfo, Bloom, Bytes,
    ClientState, EpochState, LedgerInfo, LedgerInfoWithSignatures, LightClient, OutcomeStatus, PivotBlockDecision,
    PosBlock, ReceiptProof, Status, TransactionReceipt, ValidatorConsensusInfo, ValidatorVerifier, B256, U256,
};
use tokio::sync::Mutex;

use crate::config::RelayConfig;
use crate::light_node::{LightNodeClient, TxOptions, TxReceiptStatus};
use crate::source::ChainSource;

pub(crate) const LATEST_COMMITTED_HEIGHT: u64 = 100;
pub(crate) const RECEIPTS_EPOCH: u64 = 6;

pub(crate) fn make_epoch_state(epoch: u64, validators: u8) -> (EpochState, Vec<SecretKey>) {
    let keys: Vec<SecretKey> = (0..validators)
        .map(|i| SecretKey::key_gen(&[epoch as u8 * 16 + i; 32], &[]).unwrap())
        .collect();

    let address_to_validator_info = keys
        .iter()
        .enumerate()
        .map(|(i, sk)| {
            let info = ValidatorConsensusInfo {
                public_key: sk.sk_to_pk().compress().to_vec(),
                vrf_public_key: None,
                voting_power: 1,
            };
            (AccountAddress([i as u8 + 1; 32]), info)
        })
        .collect();

    let total = validators as u64;
    let state = EpochState {
        epoch,
        verifier: ValidatorVerifier {
            address_to_validator_info,
            quorum_voting_power: total * 2 / 3 + 1,
            total_voting_power: total,
        },
        vrf_seed: Vec::new(),
    };
    (state, keys)
}

pub(crate) fn make_header(height: u64, parent_hash: B256) -> BlockHeader {
    BlockHeader {
        parent_hash,
        height,
        timestamp: 1_700_000_000 + height,
        author: Address::repeat_byte(0x01),
        transactions_root: B256::repeat_byte(0x02),
        deferred_state_root: B256::repeat_byte(0x03),
        deferred_receipts_root: B256::repeat_byte(0x04),
        deferred_logs_bloom_hash: B256::repeat_byte(0x05),
        blame: 0,
        difficulty: U256::from(1000u64),
        adaptive: false,
        gas_limit: U256::from(30_000_000u64),
        referee_hashes: Vec::new(),
        nonce: U256::from(height),
        pos_reference: None,
        base_fee_per_gas: Some(U256::from(1u64)),
        evm_base_fee_per_gas: Some(U256::from(2u64)),
        custom: Vec::new(),
        epoch_number: height,
    }
}

pub(crate) fn make_receipt(tx_hash: B256, index: u64, status: OutcomeStatus) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: tx_hash,
        index,
        block_hash: B256::ZERO,
        epoch_number: RECEIPTS_EPOCH,
        from: Address::repeat_byte(0xf0),
        to: Some(Address::repeat_byte(0x70)),
        accumulated_gas_used: U256::from(21000 * (index + 1)),
        gas_fee: U256::from(21000u64),
        gas_covered_by_sponsor: false,
        logs_bloom: Bloom::ZERO,
        logs: Vec::new(),
        outcome_status: status,
        storage_covered_by_sponsor: false,
        storage_collateralized: 0,
        storage_released: Vec::new(),
        tx_exec_error_msg: None,
    }
}

fn pivot(header: &BlockHeader) -> PivotBlockDecision {
    PivotBlockDecision {
        height: header.height,
        block_hash: format!("0x{}", hex_hash(&block_hash(header).unwrap())),
    }
}

fn hex_hash(hash: &B256) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

fn make_ledger(
    epoch: u64,
    round: u64,
    pivot_header: Option<&BlockHeader>,
    next_epoch_state: Option<EpochState>,
    keys: &[SecretKey],
) -> LedgerInfoWithSignatures {
    let ledger_info = LedgerInfo {
        commit_info: BlockInfo {
            epoch,
            round,
            id: vec![round as u8; 32],
            executed_state_id: vec![0x02; 32],
            version: epoch * 1000 + round,
            timestamp_usecs: 1_000_000 * round,
            next_epoch_state,
            pivot: pivot_header.map(pivot),
        },
        consensus_data_hash: vec![0x03; 32],
    };

    let message = signing_message(&ledger_info).unwrap();
    let signatures = keys
        .iter()
        .enumerate()
        .map(|(i, sk)| {
            let sig = sk.sign(&message, BLS_DST, &[]);
            (AccountAddress([i as u8 + 1; 32]), BlsSignature(sig.serialize()))
        })
        .collect();

    LedgerInfoWithSignatures {
        ledger_info,
        signatures,
    }
}

#[derive(Default)]
pub(crate) struct ChainData {
    pub ledgers_by_epoch: HashMap<u64, LedgerInfoWithSignatures>,
    pub ledgers: HashMap<(u64, u64), LedgerInfoWithSignatures>,
    /// `(epoch, round)` of the latest committed PoS block.
    pub latest_committed: (u64, u64),
    pub pos_block_missing: bool,
    pub headers: BTreeMap<u64, BlockHeader>,
    pub receipts: HashMap<u64, Vec<Vec<TransactionReceipt>>>,
    /// Number of upcoming requests that fail.
    pub failures: u32,
}

impl ChainData {
    fn request(&mut self) -> anyhow::Result<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(anyhow!("connection reset"));
        }
        Ok(())
    }
}

pub(crate) struct MockChain {
    pub data: Mutex<ChainData>,
}

#[async_trait]
impl ChainSource for MockChain {
    async fn ledger_info_by_epoch(&self, epoch: u64) -> anyhow::Result<Option<LedgerInfoWithSignatures>> {
        let mut data = self.data.lock().await;
        data.request()?;
        Ok(data.ledgers_by_epoch.get(&epoch).cloned())
    }

    async fn ledger_info_by_epoch_and_round(
        &self,
        epoch: u64,
        round: u64,
    ) -> anyhow::Result<Option<LedgerInfoWithSignatures>> {
        let mut data = self.data.lock().await;
        data.request()?;
        Ok(data.ledgers.get(&(epoch, round)).cloned())
    }

    async fn pos_status(&self) -> anyhow::Result<Status> {
        let mut data = self.data.lock().await;
        data.request()?;
        Ok(Status {
            latest_committed: LATEST_COMMITTED_HEIGHT,
            epoch: data.latest_committed.0,
            latest_voted: None,
        })
    }

    async fn pos_block_by_number(&self, height: u64) -> anyhow::Result<Option<PosBlock>> {
        let mut data = self.data.lock().await;
        data.request()?;
        if data.pos_block_missing || height != LATEST_COMMITTED_HEIGHT {
            return Ok(None);
        }
        let (epoch, round) = data.latest_committed;
        Ok(Some(PosBlock {
            height,
            epoch,
            round,
            pivot_decision: None,
        }))
    }

    async fn block_header_by_epoch(&self, epoch: u64) -> anyhow::Result<Option<BlockHeader>> {
        let mut data = self.data.lock().await;
        data.request()?;
        Ok(data.headers.get(&epoch).cloned())
    }

    async fn block_header_by_hash(&self, hash: &B256) -> anyhow::Result<Option<BlockHeader>> {
        let mut data = self.data.lock().await;
        data.request()?;
        Ok(data
            .headers
            .values()
            .find(|header| block_hash(header).ok().as_ref() == Some(hash))
            .cloned())
    }

    async fn epoch_receipts(&self, epoch: u64) -> anyhow::Result<Option<Vec<Vec<TransactionReceipt>>>> {
        let mut data = self.data.lock().await;
        data.request()?;
        Ok(data.receipts.get(&epoch).cloned())
    }

    async fn transaction_receipt(&self, tx_hash: &B256) -> anyhow::Result<Option<TransactionReceipt>> {
        let mut data = self.data.lock().await;
        data.request()?;
        Ok(data
            .receipts
            .values()
            .flatten()
            .flatten()
            .find(|receipt| !receipt.is_skipped() && receipt.transaction_hash == *tx_hash)
            .cloned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Submission {
    Initialize,
    UpdateLightClient { epoch: u64, round: u64 },
    UpdateBlockHeaders { start: u64, end: u64 },
    RemoveBlockHeaders { limit: u64 },
}

struct PendingReceipt {
    errors: u32,
    pending: u32,
    status: TxReceiptStatus,
}

#[derive(Default)]
struct LightNodeData {
    client: Option<LightClient>,
    submissions: Vec<Submission>,
    receipts: HashMap<B256, PendingReceipt>,
    next_tx: u64,
}

impl LightNodeData {
    /// Record a mined transaction; a rejected call becomes a failed receipt.
    fn mine<E: std::fmt::Display>(&mut self, submission: Submission, outcome: Result<(), E>) -> B256 {
        self.next_tx += 1;
        let tx_hash = B256::left_padding_from(&self.next_tx.to_be_bytes());
        let status = match outcome {
            Ok(()) => TxReceiptStatus {
                success: true,
                error_message: None,
            },
            Err(e) => TxReceiptStatus {
                success: false,
                error_message: Some(e.to_string()),
            },
        };
        self.submissions.push(submission);
        self.receipts.insert(
            tx_hash,
            PendingReceipt {
                errors: 0,
                pending: 0,
                status,
            },
        );
        tx_hash
    }
}

/// A light node contract backed by the off-chain [`LightClient`].
pub(crate) struct MockLightNode {
    max_blocks: u64,
    data: Mutex<LightNodeData>,
}

impl MockLightNode {
    pub fn new(max_blocks: u64) -> Self {
        Self {
            max_blocks,
            data: Mutex::new(LightNodeData::default()),
        }
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.data.lock().await.submissions.clone()
    }

    pub async fn clear_submissions(&self) {
        self.data.lock().await.submissions.clear();
    }

    /// Make `tx_hash` answer `errors` failed polls, then `pending` empty
    /// ones, then `status`.
    pub async fn push_receipt(&self, tx_hash: B256, pending: u32, errors: u32, status: TxReceiptStatus) {
        self.data.lock().await.receipts.insert(
            tx_hash,
            PendingReceipt {
                errors,
                pending,
                status,
            },
        );
    }

    pub async fn verify_receipt_proof(&self, proof: &ReceiptProof) -> bool {
        let data = self.data.lock().await;
        data.client
            .as_ref()
            .is_some_and(|client| client.verify_receipt_proof(proof).unwrap_or(false))
    }
}

#[async_trait]
impl LightNodeClient for MockLightNode {
    async fn client_state(&self) -> anyhow::Result<ClientState> {
        let data = self.data.lock().await;
        Ok(data
            .client
            .as_ref()
            .map(LightClient::client_state)
            .unwrap_or_default())
    }

    async fn initialize(
        &self,
        _admin: Address,
        _mpt_verifier: Address,
        ledger: &LedgerInfoWithSignatures,
        pivot_header: Bytes,
        _opts: TxOptions,
    ) -> anyhow::Result<B256> {
        let mut data = self.data.lock().await;
        let outcome = if data.client.is_some() {
            Err("already initialized".to_string())
        } else {
            match LightClient::initialize(ledger, &pivot_header, self.max_blocks) {
                Ok(client) => {
                    data.client = Some(client);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        };
        Ok(data.mine(Submission::Initialize, outcome))
    }

    async fn update_light_client(&self, ledger: &LedgerInfoWithSignatures, _opts: TxOptions) -> anyhow::Result<B256> {
        let mut data = self.data.lock().await;
        let outcome = match data.client.as_mut() {
            Some(client) => client.update(ledger).map_err(|e| e.to_string()),
            None => Err("not initialized".to_string()),
        };
        let submission = Submission::UpdateLightClient {
            epoch: ledger.epoch(),
            round: ledger.round(),
        };
        Ok(data.mine(submission, outcome))
    }

    async fn update_block_headers(&self, headers: Vec<Bytes>, _opts: TxOptions) -> anyhow::Result<B256> {
        let height = |header: Option<&Bytes>| {
            header
                .and_then(|header| decode_header_summary(header).ok())
                .map_or(0, |summary| summary.height)
        };
        let submission = Submission::UpdateBlockHeaders {
            start: height(headers.first()),
            end: height(headers.last()),
        };

        let mut data = self.data.lock().await;
        let outcome = match data.client.as_mut() {
            Some(client) => client.update_block_headers(&headers).map_err(|e| e.to_string()),
            None => Err("not initialized".to_string()),
        };
        Ok(data.mine(submission, outcome))
    }

    async fn remove_block_headers(&self, limit: u64, _opts: TxOptions) -> anyhow::Result<B256> {
        let mut data = self.data.lock().await;
        let outcome = match data.client.as_mut() {
            Some(client) => {
                client.remove_block_headers(limit);
                Ok(())
            }
            None => Err("not initialized".to_string()),
        };
        Ok(data.mine(Submission::RemoveBlockHeaders { limit }, outcome))
    }

    async fn transaction_receipt(&self, tx_hash: &B256) -> anyhow::Result<Option<TxReceiptStatus>> {
        let mut data = self.data.lock().await;
        let Some(receipt) = data.receipts.get_mut(tx_hash) else {
            return Ok(None);
        };
        if receipt.errors > 0 {
            receipt.errors -= 1;
            return Err(anyhow!("request timed out"));
        }
        if receipt.pending > 0 {
            receipt.pending -= 1;
            return Ok(None);
        }
        Ok(Some(receipt.status.clone()))
    }

    async fn nearest_pivot(&self, height: u64) -> anyhow::Result<Option<u64>> {
        let data = self.data.lock().await;
        Ok(data.client.as_ref().and_then(|client| client.nearest_pivot(height)))
    }
}

/// The relay scenario described in the module docs.
pub(crate) struct Fixture {
    pub config: RelayConfig,
    pub chain: MockChain,
    pub light_node: MockLightNode,
    pub headers: Vec<BlockHeader>,
}

impl Fixture {
    pub async fn new() -> Self {
        let receipts = vec![
            vec![
                make_receipt(B256::repeat_byte(0xa0), 0, OutcomeStatus::Success),
                make_receipt(B256::repeat_byte(0xa1), 1, OutcomeStatus::Skipped),
                make_receipt(B256::repeat_byte(0xa2), 2, OutcomeStatus::Success),
            ],
            vec![make_receipt(B256::repeat_byte(0xb0), 0, OutcomeStatus::Failure)],
        ];
        let receipts_root = epoch_receipts_root(&receipts).unwrap();

        let mut headers = Vec::new();
        let mut parent = B256::ZERO;
        for height in 1..=40 {
            let mut header = make_header(height, parent);
            if height == RECEIPTS_EPOCH + lightbridge_core::DEFERRED_EXECUTION_EPOCHS {
                header.deferred_receipts_root = receipts_root;
            }
            parent = block_hash(&header).unwrap();
            headers.push(header);
        }
        let header = |height: u64| &headers[height as usize - 1];

        let (state2, keys2) = make_epoch_state(2, 4);
        let (state3, keys3) = make_epoch_state(3, 4);

        let mut data = ChainData {
            latest_committed: (2, 4),
            headers: headers.iter().map(|h| (h.height, h.clone())).collect(),
            receipts: HashMap::from([(RECEIPTS_EPOCH, receipts)]),
            ..Default::default()
        };
        data.ledgers_by_epoch
            .insert(1, make_ledger(1, 9, None, Some(state2), &[]));
        for (epoch, round, pivot, next, keys) in [
            (2, 1, Some(10), None, &keys2),
            (2, 3, Some(10), None, &keys2),
            (2, 4, Some(14), None, &keys2),
            (2, 5, Some(14), Some(state3.clone()), &keys2),
            (3, 1, Some(20), None, &keys3),
        ] {
            let ledger = make_ledger(epoch, round, pivot.map(header), next, keys);
            data.ledgers.insert((epoch, round), ledger);
        }

        let config = RelayConfig {
            epoch_from: 2,
            relay_blocks: 3,
            gc_limit: 5,
            ..RelayConfig::default()
        };

        Self {
            config,
            chain: MockChain {
                data: Mutex::new(data),
            },
            light_node: MockLightNode::new(100),
            headers,
        }
    }

    /// Bring the light node to `(2, 4)` with blocks 10..=14 retained,
    /// without going through the relay loop.
    pub async fn bootstrap(&self) {
        let opts = TxOptions::default();
        let data = self.chain.data.lock().await;

        let mut init = data.ledgers[&(2, 1)].clone();
        init.ledger_info.commit_info.next_epoch_state = data.ledgers_by_epoch[&1].next_epoch_state().cloned();
        let pivot_header = Bytes::from(encode_block_header(&self.headers[9]).unwrap());
        self.light_node
            .initialize(Address::ZERO, Address::ZERO, &init, pivot_header, opts)
            .await
            .unwrap();
        self.light_node
            .update_light_client(&data.ledgers[&(2, 4)], opts)
            .await
            .unwrap();

        let headers = self.headers[10..14]
            .iter()
            .map(|h| Bytes::from(encode_block_header(h).unwrap()))
            .collect();
        self.light_node.update_block_headers(headers, opts).await.unwrap();
        self.light_node.clear_submissions().await;

        let state = self.light_node.client_state().await.unwrap();
        assert_eq!((state.epoch, state.round, state.blocks), (2, 4, 5));
    }
}
