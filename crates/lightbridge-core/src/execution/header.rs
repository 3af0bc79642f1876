use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};

use super::proof::ProofError;
use super::receipt::RlpList;
use crate::trie::keccak256;
use crate::types::execution::BlockHeader;

/// From this epoch on, custom header entries are RLP strings. Before it they
/// are spliced into the header list as already-encoded items.
pub const CUSTOM_AS_BYTES_EPOCH: u64 = 79_050_000;

/// Bytes appended to the output as-is.
struct RawRlp<'a>(&'a [u8]);

impl Encodable for RawRlp<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        out.put_slice(self.0)
    }

    fn length(&self) -> usize {
        self.0.len()
    }
}

/// RLP encoding of a block header. Its keccak256 is the block hash.
///
/// Fails if the header carries a core-space base fee without the matching
/// EVM-space base fee; the hash cannot be reproduced without both.
pub fn encode_block_header(header: &BlockHeader) -> Result<Vec<u8>, ProofError> {
    let adaptive = u64::from(header.adaptive);

    // Optional trailing fields are encoded as a one-item list when present.
    let pos_reference = header
        .pos_reference
        .as_ref()
        .map(|pos_reference| RlpList(vec![pos_reference]));
    let base_fees = match (&header.base_fee_per_gas, &header.evm_base_fee_per_gas) {
        (Some(core), Some(evm)) => Some(RlpList(vec![core, evm])),
        (Some(_), None) => {
            return Err(ProofError::MissingEvmBaseFee {
                height: header.height,
            })
        }
        (None, _) => None,
    };
    let base_fees = base_fees.as_ref().map(|pair| RlpList(vec![pair]));
    let raw_custom: Vec<RawRlp<'_>> = header.custom.iter().map(|c| RawRlp(c)).collect();

    let mut fields: Vec<&dyn Encodable> = vec![
        &header.parent_hash,
        &header.height,
        &header.timestamp,
        &header.author,
        &header.transactions_root,
        &header.deferred_state_root,
        &header.deferred_receipts_root,
        &header.deferred_logs_bloom_hash,
        &header.blame,
        &header.difficulty,
        &adaptive,
        &header.gas_limit,
        &header.referee_hashes,
        &header.nonce,
    ];
    if let Some(pos_reference) = &pos_reference {
        fields.push(pos_reference);
    }
    if let Some(base_fees) = &base_fees {
        fields.push(base_fees);
    }
    if header.epoch_number >= CUSTOM_AS_BYTES_EPOCH {
        fields.extend(header.custom.iter().map(|c| c as &dyn Encodable));
    } else {
        fields.extend(raw_custom.iter().map(|c| c as &dyn Encodable));
    }

    Ok(alloy_rlp::encode(RlpList(fields)))
}

/// Hash of a block header.
pub fn block_hash(header: &BlockHeader) -> Result<B256, ProofError> {
    encode_block_header(header).map(|encoded| B256::from(keccak256(&encoded)))
}

/// Encode a chain of headers for submission, in the given order.
pub fn encode_block_headers(headers: &[BlockHeader]) -> Result<Vec<Bytes>, ProofError> {
    headers
        .iter()
        .map(|header| encode_block_header(header).map(Bytes::from))
        .collect()
}

/// The parts of an encoded header needed to chain it to its neighbours and
/// to check receipts against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderSummary {
    /// keccak256 of the full encoding.
    pub hash: B256,
    pub parent_hash: B256,
    pub height: u64,
    pub deferred_receipts_root: B256,
}

/// Decode the leading fields of an RLP encoded header.
pub fn decode_header_summary(encoded: &[u8]) -> Result<HeaderSummary, alloy_rlp::Error> {
    let mut buf = encoded;
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    if buf.len() != header.payload_length {
        return Err(alloy_rlp::Error::UnexpectedLength);
    }

    let parent_hash = B256::decode(&mut buf)?;
    let height = u64::decode(&mut buf)?;
    let _timestamp = U256::decode(&mut buf)?;
    let _author = Address::decode(&mut buf)?;
    let _transactions_root = B256::decode(&mut buf)?;
    let _deferred_state_root = B256::decode(&mut buf)?;
    let deferred_receipts_root = B256::decode(&mut buf)?;

    Ok(HeaderSummary {
        hash: B256::from(keccak256(encoded)),
        parent_hash,
        height,
        deferred_receipts_root,
    })
}
