//! Keeper service loop
//!
//! Polls both open batches on a fixed interval and processes whichever is
//! eligible. Processing rejections that a later poll may clear (slippage,
//! adapter hiccups) are logged and retried on the next cycle; consecutive
//! non-retryable failures open the circuit breaker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::Address;
use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::{ConversionAdapter, TokenCustody};
use crate::engine::BatchEngine;
use crate::error::{BatchError, ErrorCategory, MarketError};
use crate::types::{BatchType, CircuitBreaker, KeeperStats, ProcessedBatch};

/// Engine handle shared by the keeper loop and the HTTP server
pub type SharedEngine<A, V> = Arc<Mutex<BatchEngine<A, V>>>;

/// What one poll did for one batch type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Processed(ProcessedBatch),
    Skipped {
        batch_type: BatchType,
        reason: &'static str,
    },
    Failed {
        batch_type: BatchType,
        error: BatchError,
    },
    /// The whole cycle was skipped because the circuit breaker is open
    CircuitOpen,
}

/// Keeper that drives batch processing
pub struct KeeperService<A, V> {
    engine: SharedEngine<A, V>,
    keeper: Address,
    poll_interval: Duration,
    stats: Arc<RwLock<KeeperStats>>,
    circuit_breaker: Mutex<CircuitBreaker>,
}

impl<A, V> KeeperService<A, V>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    /// Create a new keeper service
    pub fn new(engine: SharedEngine<A, V>, keeper: Address, poll_interval: Duration) -> Self {
        Self {
            engine,
            keeper,
            poll_interval,
            stats: Arc::new(RwLock::new(KeeperStats::default())),
            circuit_breaker: Mutex::new(CircuitBreaker::default()),
        }
    }

    /// Replace the default circuit breaker
    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Mutex::new(circuit_breaker);
        self
    }

    /// Share an existing stats handle (e.g. with the HTTP server)
    pub fn with_stats(mut self, stats: Arc<RwLock<KeeperStats>>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats_handle(&self) -> Arc<RwLock<KeeperStats>> {
        Arc::clone(&self.stats)
    }

    /// Get current statistics
    pub async fn stats(&self) -> KeeperStats {
        self.stats.read().await.clone()
    }

    /// Run the keeper loop
    pub async fn run(&self) -> Result<()> {
        info!(
            keeper = %self.keeper,
            interval_secs = self.poll_interval.as_secs(),
            "Starting batch keeper"
        );

        self.stats.write().await.service_started = Some(Utc::now());

        loop {
            let outcomes = self.run_cycle().await;
            let processed = outcomes
                .iter()
                .filter(|o| matches!(o, CycleOutcome::Processed(_)))
                .count();
            let failed = outcomes
                .iter()
                .filter(|o| matches!(o, CycleOutcome::Failed { .. }))
                .count();

            if processed > 0 || failed > 0 {
                info!(processed = processed, failed = failed, "Keeper cycle complete");
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Run a single poll over both batch types
    pub async fn run_cycle(&self) -> Vec<CycleOutcome> {
        let cycle_id = Uuid::new_v4();
        let now = self.engine.lock().await.now();

        let (allowed, breaker_state) = {
            let mut breaker = self.circuit_breaker.lock().await;
            (breaker.allow_request(now), breaker.state)
        };
        if !allowed {
            let mut stats = self.stats.write().await;
            stats.circuit_breaker_open_skips += 1;
            stats.circuit_breaker_state = breaker_state;
            debug!(cycle_id = %cycle_id, "Circuit breaker open; skipping cycle");
            return vec![CycleOutcome::CircuitOpen];
        }

        let mut outcomes = Vec::with_capacity(BatchType::ALL.len());
        for batch_type in BatchType::ALL {
            let outcome = self.poll_batch_type(cycle_id, batch_type, now).await;
            outcomes.push(outcome);
        }

        let mut stats = self.stats.write().await;
        stats.total_cycles += 1;
        stats.last_cycle_at = Some(Utc::now());
        stats.circuit_breaker_state = self.circuit_breaker.lock().await.state;

        outcomes
    }

    async fn poll_batch_type(
        &self,
        cycle_id: Uuid,
        batch_type: BatchType,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let started = Instant::now();
        let result = {
            let mut engine = self.engine.lock().await;

            if engine.is_paused() {
                return self.skip(cycle_id, batch_type, "engine paused").await;
            }

            let batch_id = engine.current_open_batch(batch_type);
            match engine.batch(batch_id) {
                Ok(batch) if batch.supplied_token_total.is_zero() => {
                    return self.skip(cycle_id, batch_type, "empty batch").await;
                }
                Ok(_) => {}
                Err(e) => return self.fail(cycle_id, batch_type, e, now).await,
            }
            if !engine.is_eligible(batch_id).unwrap_or(false) {
                return self.skip(cycle_id, batch_type, "awaiting threshold").await;
            }

            engine.process(batch_type, self.keeper)
        };

        match result {
            Ok(processed) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.stats
                    .write()
                    .await
                    .record_success(processed.batch_id, elapsed_ms);
                self.circuit_breaker.lock().await.record_success();

                info!(
                    cycle_id = %cycle_id,
                    batch_id = %processed.batch_id,
                    output = %processed.output,
                    elapsed_ms = elapsed_ms,
                    "Keeper processed batch"
                );
                CycleOutcome::Processed(processed)
            }
            Err(e) if e.category() == ErrorCategory::Eligibility => {
                self.skip(cycle_id, batch_type, "not eligible").await
            }
            Err(e) => self.fail(cycle_id, batch_type, e, now).await,
        }
    }

    async fn skip(&self, cycle_id: Uuid, batch_type: BatchType, reason: &'static str) -> CycleOutcome {
        self.stats.write().await.record_skip();
        debug!(cycle_id = %cycle_id, batch_type = %batch_type, reason = reason, "Skipping batch");
        CycleOutcome::Skipped { batch_type, reason }
    }

    async fn fail(
        &self,
        cycle_id: Uuid,
        batch_type: BatchType,
        error: BatchError,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let slippage = matches!(error, BatchError::Market(MarketError::SlippageExceeded { .. }));
        let mut stats = self.stats.write().await;
        stats.record_failure(slippage);

        if error.is_retryable() {
            warn!(
                cycle_id = %cycle_id,
                batch_type = %batch_type,
                error_code = error.error_code(),
                error = %error,
                "Batch processing rejected; retrying next poll"
            );
        } else {
            let mut breaker = self.circuit_breaker.lock().await;
            breaker.record_failure(stats.consecutive_failures, now);
            stats.circuit_breaker_state = breaker.state;
            error!(
                cycle_id = %cycle_id,
                batch_type = %batch_type,
                error_code = error.error_code(),
                error = %error,
                consecutive_failures = stats.consecutive_failures,
                circuit_breaker = breaker.state.as_str(),
                "Batch processing failed"
            );
        }

        CycleOutcome::Failed { batch_type, error }
    }
}
