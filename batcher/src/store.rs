//! Batch collection and lifecycle transitions

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{BatchResult, EligibilityError, LedgerError, MarketError};
use crate::ledger::{ClaimsLedger, Settlement};
use crate::types::{Batch, BatchId, BatchStatus, BatchType, TokenPair};

/// Owns every batch of one asset pair and the contribution ledger.
///
/// There is always exactly one open batch per type. Batch ids are gap-free
/// per type because a new batch is only ever opened as the successor of the
/// one that just closed.
#[derive(Debug)]
pub struct BatchStore {
    tokens: TokenPair,
    batches: HashMap<BatchId, Batch>,
    current_mint: BatchId,
    current_redeem: BatchId,
    ledger: ClaimsLedger,
}

impl BatchStore {
    /// Create a store with an empty open batch of each type
    pub fn new(tokens: TokenPair, now: DateTime<Utc>) -> Self {
        let current_mint = BatchId::new(BatchType::Mint, 0);
        let current_redeem = BatchId::new(BatchType::Redeem, 0);

        let mut batches = HashMap::new();
        batches.insert(current_mint, Batch::open(current_mint, &tokens, now));
        batches.insert(current_redeem, Batch::open(current_redeem, &tokens, now));

        Self {
            tokens,
            batches,
            current_mint,
            current_redeem,
            ledger: ClaimsLedger::new(),
        }
    }

    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    /// Id of the batch currently accepting deposits of `batch_type`
    pub fn current_open_batch(&self, batch_type: BatchType) -> BatchId {
        match batch_type {
            BatchType::Mint => self.current_mint,
            BatchType::Redeem => self.current_redeem,
        }
    }

    pub fn batch(&self, batch_id: BatchId) -> BatchResult<&Batch> {
        self.batches
            .get(&batch_id)
            .ok_or_else(|| LedgerError::UnknownBatch(batch_id).into())
    }

    fn batch_mut(&mut self, batch_id: BatchId) -> BatchResult<&mut Batch> {
        self.batches
            .get_mut(&batch_id)
            .ok_or_else(|| LedgerError::UnknownBatch(batch_id).into())
    }

    pub fn contribution(&self, batch_id: BatchId, account: Address) -> U256 {
        self.ledger.contribution(batch_id, account)
    }

    pub fn account_batches(&self, account: Address) -> &[BatchId] {
        self.ledger.account_batches(account)
    }

    pub fn record_contribution(
        &mut self,
        batch_id: BatchId,
        account: Address,
        amount: U256,
    ) -> BatchResult<bool> {
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(LedgerError::UnknownBatch(batch_id))?;
        self.ledger.record_contribution(batch, account, amount)
    }

    pub(crate) fn revert_contribution(
        &mut self,
        batch_id: BatchId,
        account: Address,
        amount: U256,
        first: bool,
    ) {
        if let Some(batch) = self.batches.get_mut(&batch_id) {
            self.ledger.revert_contribution(batch, account, amount, first);
        }
    }

    pub fn remove_contribution(
        &mut self,
        batch_id: BatchId,
        account: Address,
        amount: U256,
    ) -> BatchResult<U256> {
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(LedgerError::UnknownBatch(batch_id))?;
        self.ledger.remove_contribution(batch, account, amount)
    }

    pub fn preview_settlement(
        &self,
        batch_id: BatchId,
        account: Address,
        shares: Option<U256>,
    ) -> BatchResult<Settlement> {
        let batch = self.batch(batch_id)?;
        self.ledger.preview_settlement(batch, account, shares)
    }

    pub(crate) fn apply_settlement(&mut self, settlement: &Settlement) -> BatchResult<()> {
        let batch = self
            .batches
            .get_mut(&settlement.batch_id)
            .ok_or(LedgerError::UnknownBatch(settlement.batch_id))?;
        self.ledger.apply_settlement(batch, settlement);
        Ok(())
    }

    pub(crate) fn revert_settlement(&mut self, settlement: &Settlement) {
        if let Some(batch) = self.batches.get_mut(&settlement.batch_id) {
            self.ledger.revert_settlement(batch, settlement);
        }
    }

    pub fn settle_claim(&mut self, batch_id: BatchId, account: Address) -> BatchResult<Settlement> {
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(LedgerError::UnknownBatch(batch_id))?;
        self.ledger.settle_claim(batch, account)
    }

    /// Validate that `close_batch` would succeed, without mutating
    pub fn check_closable(&self, batch_id: BatchId) -> BatchResult<&Batch> {
        let batch = self.batch(batch_id)?;
        if batch.status == BatchStatus::Claimable {
            return Err(EligibilityError::AlreadyClosed(batch_id).into());
        }
        if batch.supplied_token_total.is_zero() {
            return Err(MarketError::EmptyBatch(batch_id).into());
        }
        Ok(batch)
    }

    /// One-way `Open -> Claimable` transition
    pub fn close_batch(
        &mut self,
        batch_id: BatchId,
        claimable_token_total: U256,
        now: DateTime<Utc>,
    ) -> BatchResult<()> {
        self.check_closable(batch_id)?;

        let batch = self.batch_mut(batch_id)?;
        batch.status = BatchStatus::Claimable;
        batch.claimable_token_total = Some(claimable_token_total);
        batch.processed_at = Some(now);

        debug!(
            batch_id = %batch_id,
            supplied = %batch.supplied_token_total,
            claimable = %claimable_token_total,
            "Batch closed"
        );

        Ok(())
    }

    /// Open the successor of the current batch of `batch_type`.
    ///
    /// Only legal once the current batch has closed.
    pub fn open_next_batch(&mut self, batch_type: BatchType, now: DateTime<Utc>) -> BatchResult<BatchId> {
        let current = self.current_open_batch(batch_type);
        if self.batch(current)?.is_open() {
            return Err(LedgerError::InvalidBatch {
                batch_id: current,
                reason: "current batch is still open",
            }
            .into());
        }

        let next = current.next();
        self.batches.insert(next, Batch::open(next, &self.tokens, now));
        match batch_type {
            BatchType::Mint => self.current_mint = next,
            BatchType::Redeem => self.current_redeem = next,
        }

        debug!(batch_id = %next, "Opened new batch");
        Ok(next)
    }
}
