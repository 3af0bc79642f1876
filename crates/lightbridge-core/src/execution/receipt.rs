//! Canonical RLP encoding of transaction receipts.
//!
//! This is the byte string stored as the value of each receipts trie leaf,
//! so it must match the source chain's own receipt encoding exactly.

use alloy_primitives::{Address, Bloom, U256};
use alloy_rlp::{BufMut, Encodable, Header};

use crate::types::execution::*;

/// An RLP list of heterogeneous items.
pub(crate) struct RlpList<'a>(pub Vec<&'a dyn Encodable>);

impl RlpList<'_> {
    fn payload_length(&self) -> usize {
        self.0.iter().map(|item| item.length()).sum()
    }
}

impl Encodable for RlpList<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        for item in &self.0 {
            item.encode(out);
        }
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

/// A flag encoded as the single raw byte `0x01` or `0x00`.
///
/// Plain RLP would encode `false` as the empty string `0x80`; the source
/// chain does not.
struct RlpBool(bool);

impl Encodable for RlpBool {
    fn encode(&self, out: &mut dyn BufMut) {
        out.put_u8(u8::from(self.0));
    }

    fn length(&self) -> usize {
        1
    }
}

impl Encodable for LogSpace {
    fn encode(&self, out: &mut dyn BufMut) {
        (*self as u8).encode(out)
    }

    fn length(&self) -> usize {
        (*self as u8).length()
    }
}

impl Log {
    fn rlp_fields(&self) -> RlpList<'_> {
        match self.space {
            LogSpace::Native => RlpList(vec![&self.address, &self.topics, &self.data]),
            LogSpace::Evm => RlpList(vec![&self.address, &self.topics, &self.data, &self.space]),
        }
    }
}

impl Encodable for Log {
    fn encode(&self, out: &mut dyn BufMut) {
        self.rlp_fields().encode(out)
    }

    fn length(&self) -> usize {
        self.rlp_fields().length()
    }
}

impl Encodable for StorageChange {
    fn encode(&self, out: &mut dyn BufMut) {
        RlpList(vec![&self.address, &self.collaterals]).encode(out)
    }

    fn length(&self) -> usize {
        RlpList(vec![&self.address, &self.collaterals]).length()
    }
}

/// The receipt fields covered by the receipts trie, in encoding order.
struct CanonicalReceipt<'a> {
    accumulated_gas_used: &'a U256,
    gas_fee: &'a U256,
    gas_sponsor_paid: RlpBool,
    log_bloom: &'a Bloom,
    logs: &'a Vec<Log>,
    outcome_status: u8,
    storage_sponsor_paid: RlpBool,
    storage_collateralized: Vec<StorageChange>,
    storage_released: &'a Vec<StorageChange>,
}

impl<'a> CanonicalReceipt<'a> {
    fn new(receipt: &'a TransactionReceipt) -> Self {
        Self {
            accumulated_gas_used: &receipt.accumulated_gas_used,
            gas_fee: &receipt.gas_fee,
            gas_sponsor_paid: RlpBool(receipt.gas_covered_by_sponsor),
            log_bloom: &receipt.logs_bloom,
            logs: &receipt.logs,
            outcome_status: receipt.outcome_status.into(),
            storage_sponsor_paid: RlpBool(receipt.storage_covered_by_sponsor),
            storage_collateralized: storage_collateralized(receipt),
            storage_released: &receipt.storage_released,
        }
    }

    fn fields(&self) -> RlpList<'_> {
        RlpList(vec![
            self.accumulated_gas_used,
            self.gas_fee,
            &self.gas_sponsor_paid,
            self.log_bloom,
            self.logs,
            &self.outcome_status,
            &self.storage_sponsor_paid,
            &self.storage_collateralized,
            self.storage_released,
        ])
    }
}

/// The collateral change charged by a receipt, if any.
///
/// Sponsored storage is charged to the called contract, otherwise to the
/// sender. A sponsored receipt without a recipient falls back to the sender.
fn storage_collateralized(receipt: &TransactionReceipt) -> Vec<StorageChange> {
    if receipt.storage_collateralized == 0 {
        return Vec::new();
    }

    let address: Address = match (receipt.storage_covered_by_sponsor, receipt.to) {
        (true, Some(to)) => to,
        _ => receipt.from,
    };
    vec![StorageChange {
        address,
        collaterals: receipt.storage_collateralized,
    }]
}

impl Encodable for TransactionReceipt {
    fn encode(&self, out: &mut dyn BufMut) {
        CanonicalReceipt::new(self).fields().encode(out)
    }

    fn length(&self) -> usize {
        CanonicalReceipt::new(self).fields().length()
    }
}

/// Canonical RLP encoding of `receipt`.
pub fn encode_receipt(receipt: &TransactionReceipt) -> Vec<u8> {
    alloy_rlp::encode(receipt)
}
