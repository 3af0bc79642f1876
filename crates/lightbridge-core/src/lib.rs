//! # Lightbridge Core
//!
//! Pure Rust verification logic for a PoS-secured chain light client.
//!
//! This crate contains **no networking code** and performs no I/O. Every
//! piece of source-chain data a relay forwards, or a verifier accepts,
//! passes through these functions first.
//!
//! ## Trust Model
//!
//! - **Committee signatures** (`consensus` module): verifies the BLS12-381
//!   aggregate signature of the PoS committee over the canonical encoding of
//!   a ledger info. Trusts that signers holding quorum voting power are
//!   honest, the same assumption the chain itself makes.
//!
//! - **Receipt proofs** (`execution` and `trie` modules): verifies two-level
//!   radix trie proofs of transaction receipts against the receipts root in a
//!   block header. Zero trust assumptions beyond the verified block hash.
//!
//! - **Canonical encoding** (`codec` module): the deterministic byte layout
//!   committee members sign. Verification is only as sound as this encoding
//!   is unambiguous.
//!
//! ## Usage
//!
//! ```ignore
//! use lightbridge_core::consensus::{verify_ledger_info, Committee, LightClient};
//! use lightbridge_core::execution::{build_receipt_proof, verify_receipt_proof};
//! ```

#![forbid(unsafe_code)]

pub mod codec;
pub mod consensus;
pub mod execution;
pub mod trie;
pub mod types;

// Re-export commonly used types for convenience
pub use alloy_primitives::{Address, Bloom, Bytes, B256, U256};
pub use codec::{to_canonical_bytes, CanonicalEncode, EncodeError};
pub use consensus::{
    committee::{Committee, ValidatorInfo},
    light_client::{ClientState, LightClient, LightClientError},
    verifier::{signing_message, verify_ledger_info, VerificationError},
};
pub use execution::{
    header::{block_hash, encode_block_header, encode_block_headers},
    proof::{
        build_receipt_proof, receipts_tries, transactions_trie, verify_receipt_proof, ProofError,
        DEFERRED_EXECUTION_EPOCHS,
    },
    receipt::encode_receipt,
};
pub use trie::{ProofNode, Trie, TrieError};
pub use types::{execution::*, pos::*};
