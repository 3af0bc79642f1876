use lightbridge_core::{encode_block_header, encode_block_headers, ClientState, B256};
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, RelayConfig};
use crate::error::RelayError;
use crate::light_node::{LightNodeClient, TxOptions};
use crate::source::ChainSource;

/// Drives a destination light node forward, epoch by epoch and block by
/// block.
///
/// Each iteration relays, in order of priority, pending block headers, the
/// next committed PoS round, and finally removes surplus retained headers.
/// The only local state is the last round found not worth relaying.
pub struct Relayer<S, L> {
    config: RelayConfig,
    source: S,
    light_node: L,
    /// `(epoch, round)` of the last round that had no ledger info or no
    /// change to relay.
    skipped: Option<(u64, u64)>,
}

impl<S: ChainSource, L: LightNodeClient> Relayer<S, L> {
    pub fn new(config: RelayConfig, source: S, light_node: L) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            light_node,
            skipped: None,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn light_node(&self) -> &L {
        &self.light_node
    }

    pub fn skipped_round(&self) -> Option<(u64, u64)> {
        self.skipped
    }

    /// Relay until `shutdown` is cancelled or a fatal error occurs.
    ///
    /// Iterations that did work are followed immediately by the next one;
    /// otherwise the loop sleeps for `relay_interval`. Transient errors are
    /// logged and retried on the next iteration.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), RelayError> {
        let mut initialized = false;

        loop {
            if shutdown.is_cancelled() {
                info!("Relay stopped");
                return Ok(());
            }

            let result = if initialized {
                self.relay_once(&shutdown).await
            } else {
                self.initialize(&shutdown).await.map(|()| true)
            };

            match result {
                Ok(relayed) => {
                    initialized = true;
                    if relayed {
                        continue;
                    }
                }
                Err(RelayError::Cancelled) => {
                    info!("Relay stopped while waiting for a transaction");
                    return Ok(());
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Relay cannot make progress");
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "Failed to relay"),
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {}
                _ = sleep(self.config.relay_interval) => {}
            }
        }
    }

    /// Initialize the light node at `epoch_from`, unless it already is.
    pub async fn initialize(&mut self, shutdown: &CancellationToken) -> Result<(), RelayError> {
        let state = self.client_state().await?;
        if state.epoch > 0 {
            debug!(epoch = state.epoch, "Light node already initialized");
            return Ok(());
        }

        let epoch = self.config.epoch_from;
        if epoch == 0 {
            return Err(ConfigError::ZeroEpochFrom.into());
        }
        debug!(epoch, "Initializing light node");

        // The committee of `epoch` is announced by the last ledger of the previous one.
        let last_ledger = self
            .source
            .ledger_info_by_epoch(epoch - 1)
            .await
            .map_err(RelayError::Source)?
            .ok_or(RelayError::LedgerNotFound { epoch: epoch - 1 })?;
        let committee = last_ledger
            .next_epoch_state()
            .cloned()
            .ok_or(RelayError::CommitteeNotFound { epoch: epoch - 1 })?;

        let mut ledger = self
            .source
            .ledger_info_by_epoch_and_round(epoch, 1)
            .await
            .map_err(RelayError::Source)?
            .ok_or(RelayError::LedgerNotFound { epoch })?;
        let pivot = ledger.pivot().ok_or(RelayError::PivotNotFound { epoch, round: 1 })?;
        let pivot_height = pivot.height;
        let pivot_hash = pivot
            .block_hash_bytes()
            .map(B256::from)
            .ok_or(RelayError::PivotNotFound { epoch, round: 1 })?;

        let header = self
            .source
            .block_header_by_hash(&pivot_hash)
            .await
            .map_err(RelayError::Source)?
            .ok_or(RelayError::BlockHeaderByHashNotFound { hash: pivot_hash })?;
        let header = encode_block_header(&header)?;

        ledger.ledger_info.commit_info.next_epoch_state = Some(committee);

        let tx_hash = self
            .light_node
            .initialize(
                self.config.admin,
                self.config.mpt_verifier,
                &ledger,
                header.into(),
                self.tx_options(),
            )
            .await
            .map_err(RelayError::LightNode)?;
        self.wait_for_success(tx_hash, shutdown).await?;

        info!(epoch, round = 1, pivot = pivot_height, "Light node initialized");
        Ok(())
    }

    /// One iteration of the steady state. Returns whether any work was done.
    pub async fn relay_once(&mut self, shutdown: &CancellationToken) -> Result<bool, RelayError> {
        let state = self.client_state().await?;

        if self.relay_block_headers(&state, shutdown).await? {
            return Ok(true);
        }

        if self.relay_pos_block(&state, shutdown).await? {
            return Ok(true);
        }

        self.remove_block_headers(&state, shutdown).await
    }

    async fn client_state(&self) -> Result<ClientState, RelayError> {
        self.light_node
            .client_state()
            .await
            .map_err(RelayError::LightNode)
    }

    fn tx_options(&self) -> TxOptions {
        TxOptions {
            gas_limit: self.config.gas_limit,
        }
    }

    /// Relay the newest pending headers, at most `relay_blocks` of them.
    async fn relay_block_headers(
        &self,
        state: &ClientState,
        shutdown: &CancellationToken,
    ) -> Result<bool, RelayError> {
        if state.relay_block_end_number == 0 {
            debug!("No block headers to relay");
            return Ok(false);
        }

        let end = state.relay_block_end_number;
        let start = state
            .relay_block_start_number
            .max((end + 1).saturating_sub(self.config.relay_blocks));

        let mut headers = Vec::with_capacity((end + 1).saturating_sub(start) as usize);
        for epoch in start..=end {
            let header = self
                .source
                .block_header_by_epoch(epoch)
                .await
                .map_err(RelayError::Source)?
                .ok_or(RelayError::BlockHeaderNotFound { epoch })?;
            headers.push(header);
        }
        let headers = encode_block_headers(&headers)?;

        let tx_hash = self
            .light_node
            .update_block_headers(headers, self.tx_options())
            .await
            .map_err(RelayError::LightNode)?;
        self.wait_for_success(tx_hash, shutdown).await?;

        info!(start, end, "Relayed block headers");
        Ok(true)
    }

    async fn relay_pos_block(&mut self, state: &ClientState, shutdown: &CancellationToken) -> Result<bool, RelayError> {
        let epoch = state.epoch;
        let round = match self.skipped {
            Some((skipped_epoch, skipped_round)) if skipped_epoch == epoch => skipped_round.max(state.round) + 1,
            _ => state.round + 1,
        };

        if !self.is_committed(epoch, round).await? {
            debug!(epoch, round, "No PoS block to relay");
            return Ok(false);
        }

        let Some(ledger) = self
            .source
            .ledger_info_by_epoch_and_round(epoch, round)
            .await
            .map_err(RelayError::Source)?
        else {
            debug!(epoch, round, "No ledger info in round");
            self.skipped = Some((epoch, round));
            return Ok(true);
        };

        let pivot = ledger.pivot().map(|pivot| pivot.height);
        let pivot_advanced = pivot.is_some_and(|height| height > state.finalized_block_number);
        if ledger.next_epoch_state().is_none() && !pivot_advanced {
            debug!(epoch, round, "Neither committee nor pivot changed");
            self.skipped = Some((epoch, round));
            return Ok(true);
        }

        let tx_hash = self
            .light_node
            .update_light_client(&ledger, self.tx_options())
            .await
            .map_err(RelayError::LightNode)?;
        self.wait_for_success(tx_hash, shutdown).await?;

        info!(
            epoch,
            round,
            pivot = ?pivot,
            committee_changed = ledger.next_epoch_state().is_some(),
            "Relayed PoS block"
        );
        self.skipped = None;
        Ok(true)
    }

    /// Whether `(epoch, round)` is at or before the latest committed PoS block.
    async fn is_committed(&self, epoch: u64, round: u64) -> Result<bool, RelayError> {
        let status = self.source.pos_status().await.map_err(RelayError::Source)?;
        let block = self
            .source
            .pos_block_by_number(status.latest_committed)
            .await
            .map_err(RelayError::Source)?
            .ok_or(RelayError::LatestCommittedBlockNotFound {
                height: status.latest_committed,
            })?;

        debug!(epoch = block.epoch, round = block.round, "Latest committed PoS block");
        Ok((epoch, round) <= (block.epoch, block.round))
    }

    async fn remove_block_headers(&self, state: &ClientState, shutdown: &CancellationToken) -> Result<bool, RelayError> {
        if state.blocks <= state.max_blocks {
            return Ok(false);
        }

        let tx_hash = self
            .light_node
            .remove_block_headers(self.config.gc_limit, self.tx_options())
            .await
            .map_err(RelayError::LightNode)?;
        self.wait_for_success(tx_hash, shutdown).await?;

        info!(
            blocks = state.blocks,
            max = state.max_blocks,
            limit = self.config.gc_limit,
            "Removed block headers"
        );
        Ok(true)
    }

    /// Poll for the receipt of `tx_hash` until it is mined.
    ///
    /// Poll failures are logged and retried. Gives up with
    /// [`RelayError::ReceiptTimeout`] once `receipt_timeout` has elapsed.
    async fn wait_for_success(&self, tx_hash: B256, shutdown: &CancellationToken) -> Result<(), RelayError> {
        let started = Instant::now();
        pause(self.config.receipt_initial_delay, shutdown).await?;

        loop {
            pause(self.config.receipt_poll_interval, shutdown).await?;

            match self.light_node.transaction_receipt(&tx_hash).await {
                Ok(Some(status)) if status.success => return Ok(()),
                Ok(Some(status)) => {
                    return Err(RelayError::TransactionFailed {
                        tx_hash,
                        reason: status
                            .error_message
                            .unwrap_or_else(|| "execution reverted".to_string()),
                    })
                }
                Ok(None) => {}
                Err(e) => warn!(%tx_hash, error = %e, "Failed to get transaction receipt"),
            }

            let waited = started.elapsed();
            if self.config.receipt_timeout.is_some_and(|timeout| waited >= timeout) {
                return Err(RelayError::ReceiptTimeout { tx_hash, waited });
            }
        }
    }
}

async fn pause(duration: Duration, shutdown: &CancellationToken) -> Result<(), RelayError> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(RelayError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}
