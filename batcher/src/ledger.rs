//! Per-batch, per-account contribution ledger
//!
//! Claims are computed lazily for one account at a time; nothing in here
//! iterates over the depositors of a batch.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::{BatchError, BatchResult, LedgerError};
use crate::types::{Batch, BatchId};

/// A computed but not yet applied claim settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub batch_id: BatchId,
    pub account: Address,
    /// Contribution shares consumed
    pub shares: U256,
    /// Output owed for those shares
    pub owed: U256,
}

/// `claimable_total * shares / supplied_total`, rounded down
pub fn pro_rata(claimable_total: U256, shares: U256, supplied_total: U256) -> BatchResult<U256> {
    if supplied_total.is_zero() {
        return Err(BatchError::Overflow("pro-rata division by zero supply"));
    }
    let product = claimable_total
        .checked_mul(shares)
        .ok_or(BatchError::Overflow("pro-rata claim"))?;
    Ok(product / supplied_total)
}

/// Contribution records keyed by `(batch, account)`.
///
/// Entries are never removed: a settled account keeps a zero entry, which
/// also marks that the account has joined the batch.
#[derive(Debug, Default)]
pub struct ClaimsLedger {
    contributions: HashMap<(BatchId, Address), U256>,
    account_batches: HashMap<Address, Vec<BatchId>>,
}

impl ClaimsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current unsettled contribution of `account` to `batch_id`
    pub fn contribution(&self, batch_id: BatchId, account: Address) -> U256 {
        self.contributions
            .get(&(batch_id, account))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Batches the account has contributed to, in join order
    pub fn account_batches(&self, account: Address) -> &[BatchId] {
        self.account_batches
            .get(&account)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Add `amount` to the account's contribution and the batch total.
    ///
    /// Returns whether this is the account's first contribution to the batch.
    pub fn record_contribution(
        &mut self,
        batch: &mut Batch,
        account: Address,
        amount: U256,
    ) -> BatchResult<bool> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount.into());
        }
        if !batch.is_open() {
            return Err(LedgerError::InvalidBatch {
                batch_id: batch.id,
                reason: "batch is not open",
            }
            .into());
        }

        let current = self.contribution(batch.id, account);
        let new_contribution = current
            .checked_add(amount)
            .ok_or(BatchError::Overflow("contribution"))?;
        let new_total = batch
            .supplied_token_total
            .checked_add(amount)
            .ok_or(BatchError::Overflow("batch supplied total"))?;

        let first = match self.contributions.entry((batch.id, account)) {
            Entry::Occupied(mut entry) => {
                entry.insert(new_contribution);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(new_contribution);
                true
            }
        };
        if first {
            self.account_batches.entry(account).or_default().push(batch.id);
        }
        batch.supplied_token_total = new_total;

        Ok(first)
    }

    /// Undo a `record_contribution` whose inbound transfer failed
    pub(crate) fn revert_contribution(
        &mut self,
        batch: &mut Batch,
        account: Address,
        amount: U256,
        first: bool,
    ) {
        let key = (batch.id, account);
        if first {
            self.contributions.remove(&key);
            if let Some(batches) = self.account_batches.get_mut(&account) {
                if batches.last() == Some(&batch.id) {
                    batches.pop();
                }
            }
        } else if let Some(current) = self.contributions.get_mut(&key) {
            *current = current.saturating_sub(amount);
        }
        batch.supplied_token_total = batch.supplied_token_total.saturating_sub(amount);
    }

    /// Remove `amount` from the account's contribution and the batch total.
    ///
    /// Returns the remaining contribution.
    pub fn remove_contribution(
        &mut self,
        batch: &mut Batch,
        account: Address,
        amount: U256,
    ) -> BatchResult<U256> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount.into());
        }
        if !batch.is_open() {
            return Err(LedgerError::InvalidBatch {
                batch_id: batch.id,
                reason: "withdrawals are only possible while the batch is open",
            }
            .into());
        }

        let available = self.contribution(batch.id, account);
        if amount > available {
            return Err(LedgerError::InsufficientContribution {
                batch_id: batch.id,
                requested: amount,
                available,
            }
            .into());
        }

        let remaining = available - amount;
        self.contributions.insert((batch.id, account), remaining);
        batch.supplied_token_total -= amount;

        Ok(remaining)
    }

    /// Compute the settlement of `shares` (all when `None`) without mutating.
    pub fn preview_settlement(
        &self,
        batch: &Batch,
        account: Address,
        shares: Option<U256>,
    ) -> BatchResult<Settlement> {
        let claimable_total = match (batch.is_claimable(), batch.claimable_token_total) {
            (true, Some(total)) => total,
            _ => {
                return Err(LedgerError::InvalidBatch {
                    batch_id: batch.id,
                    reason: "batch is not claimable yet",
                }
                .into())
            }
        };

        let available = self.contribution(batch.id, account);
        if available.is_zero() {
            return Err(LedgerError::NothingToClaim {
                batch_id: batch.id,
                account,
            }
            .into());
        }

        let shares = shares.unwrap_or(available);
        if shares.is_zero() {
            return Err(LedgerError::ZeroAmount.into());
        }
        if shares > available {
            return Err(LedgerError::InsufficientContribution {
                batch_id: batch.id,
                requested: shares,
                available,
            }
            .into());
        }

        let owed = pro_rata(claimable_total, shares, batch.supplied_token_total)?;

        Ok(Settlement {
            batch_id: batch.id,
            account,
            shares,
            owed,
        })
    }

    /// Apply a settlement produced by `preview_settlement` on the same state
    pub fn apply_settlement(&mut self, batch: &mut Batch, settlement: &Settlement) {
        let key = (settlement.batch_id, settlement.account);
        let remaining = self.contribution(settlement.batch_id, settlement.account) - settlement.shares;
        self.contributions.insert(key, remaining);
        batch.claimed_supplied += settlement.shares;
        batch.paid_out += settlement.owed;
    }

    /// Undo an applied settlement whose outbound transfer failed
    pub(crate) fn revert_settlement(&mut self, batch: &mut Batch, settlement: &Settlement) {
        let key = (settlement.batch_id, settlement.account);
        let restored = self.contribution(settlement.batch_id, settlement.account) + settlement.shares;
        self.contributions.insert(key, restored);
        batch.claimed_supplied -= settlement.shares;
        batch.paid_out -= settlement.owed;
    }

    /// Settle the account's whole contribution and return the amount owed
    pub fn settle_claim(&mut self, batch: &mut Batch, account: Address) -> BatchResult<Settlement> {
        let settlement = self.preview_settlement(batch, account, None)?;
        self.apply_settlement(batch, &settlement);
        Ok(settlement)
    }
}
