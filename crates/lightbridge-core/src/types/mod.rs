pub mod bls;
pub mod execution;
pub mod pos;
pub mod serde_hex;
