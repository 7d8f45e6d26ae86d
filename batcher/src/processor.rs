//! Keeper eligibility and batch processing
//!
//! A processing call goes `Eligible -> Processing -> Claimable` inside one
//! call. `Processing` is never stored, so there is nothing to lock: a second
//! keeper racing the first simply finds the batch closed.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::adapter::{ConversionAdapter, TokenCustody};
use crate::engine::BatchEngine;
use crate::error::{BatchError, BatchResult, EligibilityError};
use crate::slippage::check_output;
use crate::types::{Batch, BatchId, BatchThresholds, BatchType, ProcessedBatch, ProcessingState};

/// `age >= cooldown || supplied >= size threshold`; claimable batches never are
pub fn is_batch_eligible(batch: &Batch, thresholds: &BatchThresholds, now: DateTime<Utc>) -> bool {
    if !batch.is_open() {
        return false;
    }
    let aged = u64::try_from(batch.age_secs(now)).is_ok_and(|age| age >= thresholds.cooldown_secs);
    let sized = batch.supplied_token_total >= thresholds.size_threshold(batch.batch_type);
    aged || sized
}

impl<A: ConversionAdapter, V: TokenCustody> BatchEngine<A, V> {
    pub fn is_eligible(&self, batch_id: BatchId) -> BatchResult<bool> {
        let batch = self.store.batch(batch_id)?;
        Ok(is_batch_eligible(batch, &self.thresholds, self.clock.now()))
    }

    /// Processing state of the open batch of `batch_type`
    pub fn processing_state(&self, batch_type: BatchType) -> BatchResult<ProcessingState> {
        let batch_id = self.store.current_open_batch(batch_type);
        Ok(if self.is_eligible(batch_id)? {
            ProcessingState::Eligible
        } else {
            ProcessingState::AwaitingThreshold
        })
    }

    /// Process the currently open batch of `batch_type`
    pub fn process(&mut self, batch_type: BatchType, keeper: Address) -> BatchResult<ProcessedBatch> {
        let batch_id = self.store.current_open_batch(batch_type);
        self.process_batch(batch_id, keeper)
    }

    /// Convert the pooled input of `batch_id` and make the batch claimable.
    ///
    /// Nothing is mutated unless the conversion output clears the slippage
    /// bound; a rejected call can simply be retried later.
    pub fn process_batch(&mut self, batch_id: BatchId, keeper: Address) -> BatchResult<ProcessedBatch> {
        self.ensure_not_paused()?;
        let now = self.clock.now();

        let batch = self.store.batch(batch_id)?;
        if batch.is_claimable() {
            return Err(EligibilityError::AlreadyClosed(batch_id).into());
        }
        if !is_batch_eligible(batch, &self.thresholds, now) {
            return Err(EligibilityError::NotEligible {
                batch_id,
                age_secs: batch.age_secs(now),
                supplied: batch.supplied_token_total,
            }
            .into());
        }

        let batch = self.store.check_closable(batch_id)?;
        let batch_type = batch.batch_type;
        let supplied = batch.supplied_token_total;

        let reference_price = self.adapter.reference_price(batch_type)?;
        let min_output = self
            .slippage
            .batch_min_output(batch_type, reference_price, supplied)?;

        debug!(
            batch_id = %batch_id,
            supplied = %supplied,
            reference_price = %reference_price,
            min_output = %min_output,
            "Processing batch"
        );

        let output = self.adapter.convert(batch_type, supplied)?;
        if let Err(e) = check_output(output, min_output) {
            warn!(
                batch_id = %batch_id,
                output = %output,
                min_output = %min_output,
                "Batch processing rejected by slippage guard"
            );
            return Err(e);
        }

        let fee = match batch_type {
            BatchType::Mint => U256::ZERO,
            BatchType::Redeem => self.redemption_fee.fee_on(output)?,
        };
        let claimable = output - fee;
        let accumulated_fees = self
            .accumulated_fees
            .checked_add(fee)
            .ok_or(BatchError::Overflow("accumulated fees"))?;

        self.store.close_batch(batch_id, claimable, now)?;
        self.accumulated_fees = accumulated_fees;
        let next_batch_id = self.store.open_next_batch(batch_type, now)?;

        let processed = ProcessedBatch {
            batch_id,
            batch_type,
            keeper,
            supplied_token_total: supplied,
            output,
            min_output,
            fee,
            claimable_token_total: claimable,
            next_batch_id,
            processed_at: now,
        };
        self.incentives.batch_processed(&processed);

        info!(
            batch_id = %batch_id,
            keeper = %keeper,
            supplied = %supplied,
            output = %output,
            fee = %fee,
            next_batch_id = %next_batch_id,
            "Batch processed"
        );

        Ok(processed)
    }
}
