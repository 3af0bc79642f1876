//! # Lightbridge Relay
//!
//! Keeps a destination light node in step with the source chain's PoS
//! consensus. The relay reads ledger infos and block headers from a
//! [`ChainSource`], checks nothing itself, and submits them through a
//! [`LightNodeClient`]; the light node verifies everything it is given
//! with the logic in `lightbridge-core`.
//!
//! ## Usage
//!
//! ```ignore
//! let config = RelayConfig::from_toml_str(&std::fs::read_to_string("relay.toml")?)?;
//! let mut relayer = Relayer::new(config, source, light_node)?;
//! relayer.run(shutdown_token).await?;
//! ```

pub mod config;
pub mod error;
pub mod light_node;
pub mod proof_generator;
pub mod relayer;
pub mod source;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{ConfigError, RelayConfig};
pub use error::RelayError;
pub use light_node::{LightNodeClient, TxOptions, TxReceiptStatus};
pub use proof_generator::ProofGenerator;
pub use relayer::Relayer;
pub use source::ChainSource;
