//! Keeper incentive signalling
//!
//! The engine calls [`KeeperIncentives::batch_processed`] after every
//! successful processing call. Payout rules live in an external coordinator;
//! the engine only emits the signal it meters against.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::types::ProcessedBatch;

/// Sink for processed-batch signals. Must not fail the processing call.
pub trait KeeperIncentives: Send {
    fn batch_processed(&mut self, processed: &ProcessedBatch);
}

/// Discards signals
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIncentives;

impl KeeperIncentives for NoopIncentives {
    fn batch_processed(&mut self, processed: &ProcessedBatch) {
        debug!(batch_id = %processed.batch_id, keeper = %processed.keeper, "No incentive coordinator configured");
    }
}

/// Hands signals to an async forwarder over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelIncentives {
    sender: mpsc::UnboundedSender<ProcessedBatch>,
}

impl ChannelIncentives {
    pub fn new(sender: mpsc::UnboundedSender<ProcessedBatch>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProcessedBatch>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl KeeperIncentives for ChannelIncentives {
    fn batch_processed(&mut self, processed: &ProcessedBatch) {
        if self.sender.send(processed.clone()).is_err() {
            warn!(
                batch_id = %processed.batch_id,
                "Incentive forwarder is gone; dropping processed-batch signal"
            );
        }
    }
}

/// Client for the external incentive coordinator API
pub struct IncentiveClient {
    base_url: String,
    client: reqwest::Client,
}

impl IncentiveClient {
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;

    /// Create a new coordinator client
    pub fn new(base_url: &str) -> Self {
        Self::new_with_timeouts(
            base_url,
            Duration::from_secs(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Create a new coordinator client with timeouts
    pub fn new_with_timeouts(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(
                    error = %err,
                    "Failed to build coordinator HTTP client with timeouts; falling back to defaults"
                );
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Report a processed batch for incentive accrual
    pub async fn accrue(&self, processed: &ProcessedBatch) -> Result<()> {
        let url = format!("{}/v1/incentives/accrue", self.base_url);

        let response = self.client.post(&url).json(processed).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to accrue keeper incentive: {} - {}", status, body);
        }

        Ok(())
    }

    /// Health check
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }
}

/// Drains processed-batch signals and posts them to the coordinator
pub struct IncentiveForwarder {
    client: IncentiveClient,
    receiver: mpsc::UnboundedReceiver<ProcessedBatch>,
    max_retries: u32,
    retry_delay: Duration,
}

impl IncentiveForwarder {
    pub fn new(
        client: IncentiveClient,
        receiver: mpsc::UnboundedReceiver<ProcessedBatch>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            receiver,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Forward until every sender is dropped. Returns the number delivered.
    pub async fn run(mut self) -> u64 {
        let mut delivered = 0;

        while let Some(processed) = self.receiver.recv().await {
            if self.forward(&processed).await {
                delivered += 1;
            }
        }

        info!(delivered = delivered, "Incentive forwarder stopped");
        delivered
    }

    async fn forward(&self, processed: &ProcessedBatch) -> bool {
        for attempt in 1..=self.max_retries {
            match self.client.accrue(processed).await {
                Ok(()) => {
                    debug!(
                        batch_id = %processed.batch_id,
                        keeper = %processed.keeper,
                        "Keeper incentive accrued"
                    );
                    return true;
                }
                Err(e) => {
                    warn!(
                        batch_id = %processed.batch_id,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Incentive accrual failed"
                    );
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }
        false
    }
}
