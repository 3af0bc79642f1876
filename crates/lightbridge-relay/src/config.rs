use std::time::Duration;

use lightbridge_core::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("epoch_from must be set to initialize the light node")]
    ZeroEpochFrom,

    #[error("relay_blocks must be positive")]
    ZeroRelayBlocks,

    #[error("gc_limit must be positive")]
    ZeroGcLimit,

    #[error("receipt_poll_interval must be positive")]
    ZeroPollInterval,

    #[error("Failed to parse relay config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay controller settings, supplied once at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RelayConfig {
    /// Epoch the light node is initialized at. Only read when the light
    /// node reports epoch 0.
    pub epoch_from: u64,
    /// Maximum number of block headers per relay transaction.
    pub relay_blocks: u64,
    /// Maximum number of retained headers removed per transaction.
    pub gc_limit: u64,
    /// Fixed gas limit for submitted transactions, estimated when unset.
    pub gas_limit: Option<u64>,
    /// Management admin passed to the light node at initialization.
    pub admin: Address,
    /// Receipt proof verifier the light node delegates to.
    pub mpt_verifier: Address,
    #[serde(with = "humantime_serde")]
    pub relay_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub receipt_initial_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub receipt_poll_interval: Duration,
    /// Give up waiting for a receipt after this long. `None` waits forever.
    #[serde(with = "humantime_serde")]
    pub receipt_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            epoch_from: 0,
            relay_blocks: 20,
            gc_limit: 20,
            gas_limit: None,
            admin: Address::ZERO,
            mpt_verifier: Address::ZERO,
            relay_interval: Duration::from_secs(3),
            receipt_initial_delay: Duration::from_secs(3),
            receipt_poll_interval: Duration::from_secs(1),
            receipt_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl RelayConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay_blocks == 0 {
            return Err(ConfigError::ZeroRelayBlocks);
        }
        if self.gc_limit == 0 {
            return Err(ConfigError::ZeroGcLimit);
        }
        if self.receipt_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}
