//! Deposit, withdrawal and claim surface of the batch engine
//!
//! Every public mutating call is one atomic unit: it validates, updates the
//! ledger, and only then moves tokens through [`TokenCustody`]. If the
//! transfer fails the ledger change is rolled back before returning.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::adapter::{Clock, ConversionAdapter, SystemClock, TokenCustody};
use crate::error::{BatchError, BatchResult, ConfigError, LedgerError};
use crate::incentives::{KeeperIncentives, NoopIncentives};
use crate::ledger::Settlement;
use crate::slippage::{SlippageGuard, BPS_DENOMINATOR};
use crate::store::BatchStore;
use crate::types::{
    Batch, BatchId, BatchThresholds, BatchType, ClaimReceipt, ContributionReceipt, MoveReceipt,
    TokenPair,
};

/// Upper bound for the redemption fee
pub const MAX_REDEMPTION_FEE_BPS: u16 = 100;

/// Fee retained from the output of processed redeem batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionFee {
    pub rate_bps: u16,
    pub recipient: Address,
}

impl Default for RedemptionFee {
    fn default() -> Self {
        Self {
            rate_bps: 0,
            recipient: Address::ZERO,
        }
    }
}

impl RedemptionFee {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_bps > MAX_REDEMPTION_FEE_BPS {
            return Err(ConfigError::InvalidValue {
                field: "redemption_fee_bps".to_string(),
                message: format!(
                    "{} bps exceeds maximum of {MAX_REDEMPTION_FEE_BPS} bps",
                    self.rate_bps
                ),
            });
        }
        if self.rate_bps > 0 && self.recipient == Address::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "fee_recipient".to_string(),
                message: "a recipient is required when a fee is charged".to_string(),
            });
        }
        Ok(())
    }

    /// Fee owed on a gross redeem output, rounded down
    pub fn fee_on(&self, output: U256) -> BatchResult<U256> {
        let scaled = output
            .checked_mul(U256::from(self.rate_bps))
            .ok_or(BatchError::Overflow("redemption fee"))?;
        Ok(scaled / U256::from(BPS_DENOMINATOR))
    }
}

/// Static engine parameters for one asset pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub tokens: TokenPair,
    pub thresholds: BatchThresholds,
    pub slippage: SlippageGuard,
    pub redemption_fee: RedemptionFee,
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.input_token == self.tokens.product_token {
            return Err(ConfigError::InvalidValue {
                field: "product_token".to_string(),
                message: "input and product token must differ".to_string(),
            });
        }
        validate_thresholds(&self.thresholds)?;
        self.slippage.validate()?;
        self.redemption_fee.validate()
    }
}

/// A batch must be able to become eligible by age or by size
pub fn validate_thresholds(thresholds: &BatchThresholds) -> Result<(), ConfigError> {
    for batch_type in BatchType::ALL {
        if thresholds.cooldown_secs == 0 && thresholds.size_threshold(batch_type).is_zero() {
            return Err(ConfigError::InvalidValue {
                field: format!("{batch_type}_threshold"),
                message: "cooldown and size threshold cannot both be zero".to_string(),
            });
        }
    }
    Ok(())
}

/// Batch mint/redeem engine for one asset pair
pub struct BatchEngine<A, V> {
    pub(crate) store: BatchStore,
    pub(crate) adapter: A,
    pub(crate) custody: V,
    pub(crate) incentives: Box<dyn KeeperIncentives>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) thresholds: BatchThresholds,
    pub(crate) slippage: SlippageGuard,
    pub(crate) redemption_fee: RedemptionFee,
    pub(crate) accumulated_fees: U256,
    /// Instant outputs produced but not delivered, keyed by `(token, account)`
    pub(crate) undelivered: HashMap<(Address, Address), U256>,
    pub(crate) paused: bool,
}

impl<A: ConversionAdapter, V: TokenCustody> BatchEngine<A, V> {
    /// Engine on the wall clock without an incentive coordinator
    pub fn new(settings: EngineSettings, adapter: A, custody: V) -> BatchResult<Self> {
        Self::with_parts(
            settings,
            adapter,
            custody,
            Box::new(NoopIncentives),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        settings: EngineSettings,
        adapter: A,
        custody: V,
        incentives: Box<dyn KeeperIncentives>,
        clock: Arc<dyn Clock>,
    ) -> BatchResult<Self> {
        settings.validate()?;
        let store = BatchStore::new(settings.tokens, clock.now());

        info!(
            input_token = %settings.tokens.input_token,
            product_token = %settings.tokens.product_token,
            cooldown_secs = settings.thresholds.cooldown_secs,
            "Batch engine initialized"
        );

        Ok(Self {
            store,
            adapter,
            custody,
            incentives,
            clock,
            thresholds: settings.thresholds,
            slippage: settings.slippage,
            redemption_fee: settings.redemption_fee,
            accumulated_fees: U256::ZERO,
            undelivered: HashMap::new(),
            paused: false,
        })
    }

    pub fn batch(&self, batch_id: BatchId) -> BatchResult<&Batch> {
        self.store.batch(batch_id)
    }

    pub fn contribution(&self, batch_id: BatchId, account: Address) -> U256 {
        self.store.contribution(batch_id, account)
    }

    pub fn current_open_batch(&self, batch_type: BatchType) -> BatchId {
        self.store.current_open_batch(batch_type)
    }

    pub fn account_batches(&self, account: Address) -> &[BatchId] {
        self.store.account_batches(account)
    }

    pub fn tokens(&self) -> &TokenPair {
        self.store.tokens()
    }

    pub fn thresholds(&self) -> &BatchThresholds {
        &self.thresholds
    }

    pub fn slippage(&self) -> &SlippageGuard {
        &self.slippage
    }

    pub fn redemption_fee(&self) -> &RedemptionFee {
        &self.redemption_fee
    }

    pub fn accumulated_fees(&self) -> U256 {
        self.accumulated_fees
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn custody(&self) -> &V {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut V {
        &mut self.custody
    }

    pub(crate) fn ensure_not_paused(&self) -> BatchResult<()> {
        if self.paused {
            return Err(BatchError::Paused);
        }
        Ok(())
    }

    pub fn deposit_for_mint(&mut self, amount: U256, account: Address) -> BatchResult<ContributionReceipt> {
        self.deposit(BatchType::Mint, amount, account)
    }

    pub fn deposit_for_redeem(&mut self, amount: U256, account: Address) -> BatchResult<ContributionReceipt> {
        self.deposit(BatchType::Redeem, amount, account)
    }

    /// Add `amount` to the open batch of `batch_type` on behalf of `account`
    pub fn deposit(
        &mut self,
        batch_type: BatchType,
        amount: U256,
        account: Address,
    ) -> BatchResult<ContributionReceipt> {
        self.ensure_not_paused()?;

        let batch_id = self.store.current_open_batch(batch_type);
        let token = self.store.batch(batch_id)?.supplied_token;

        let first = self.store.record_contribution(batch_id, account, amount)?;
        if let Err(e) = self.custody.pull(token, account, amount) {
            self.store.revert_contribution(batch_id, account, amount, first);
            warn!(
                batch_id = %batch_id,
                account = %account,
                amount = %amount,
                error = %e,
                "Deposit transfer failed; contribution reverted"
            );
            return Err(e.into());
        }

        let receipt = ContributionReceipt {
            batch_id,
            account,
            amount,
            contribution: self.store.contribution(batch_id, account),
            batch_total: self.store.batch(batch_id)?.supplied_token_total,
        };

        info!(
            batch_id = %batch_id,
            account = %account,
            amount = %amount,
            batch_total = %receipt.batch_total,
            "Deposit recorded"
        );

        Ok(receipt)
    }

    /// Withdraw part of a contribution from a still-open batch
    pub fn withdraw_from_batch(
        &mut self,
        batch_id: BatchId,
        amount: U256,
        account: Address,
    ) -> BatchResult<ContributionReceipt> {
        let token = self.store.batch(batch_id)?.supplied_token;

        let remaining = self.store.remove_contribution(batch_id, account, amount)?;
        if let Err(e) = self.custody.push(token, account, amount) {
            if let Err(restore) = self.store.record_contribution(batch_id, account, amount) {
                error!(
                    batch_id = %batch_id,
                    account = %account,
                    error = %restore,
                    "Failed to restore contribution after withdrawal transfer failure"
                );
            }
            warn!(
                batch_id = %batch_id,
                account = %account,
                error = %e,
                "Withdrawal transfer failed; contribution restored"
            );
            return Err(e.into());
        }

        let batch_total = self.store.batch(batch_id)?.supplied_token_total;

        info!(
            batch_id = %batch_id,
            account = %account,
            amount = %amount,
            remaining = %remaining,
            "Withdrawal from open batch"
        );

        Ok(ContributionReceipt {
            batch_id,
            account,
            amount,
            contribution: remaining,
            batch_total,
        })
    }

    /// Pay out the account's pro-rata share of a claimable batch
    pub fn claim(&mut self, batch_id: BatchId, account: Address) -> BatchResult<ClaimReceipt> {
        let token = self.store.batch(batch_id)?.claimable_token;

        let settlement = self.store.settle_claim(batch_id, account)?;
        self.pay_out(token, account, &settlement)?;

        info!(
            batch_id = %batch_id,
            account = %account,
            shares = %settlement.shares,
            amount = %settlement.owed,
            "Claimed"
        );

        Ok(ClaimReceipt {
            batch_id,
            account,
            token,
            shares: settlement.shares,
            amount: settlement.owed,
        })
    }

    /// Push a settlement, rolling it back if the transfer fails
    fn pay_out(&mut self, token: Address, account: Address, settlement: &Settlement) -> BatchResult<()> {
        if settlement.owed.is_zero() {
            return Ok(());
        }
        if let Err(e) = self.custody.push(token, account, settlement.owed) {
            self.store.revert_settlement(settlement);
            warn!(
                batch_id = %settlement.batch_id,
                account = %account,
                error = %e,
                "Claim transfer failed; settlement reverted"
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Settle `shares` of several claimable batches and deposit the summed
    /// output into the open batch of `target_type` without leaving custody.
    pub fn move_unclaimed_into_current_batch(
        &mut self,
        account: Address,
        batch_ids: &[BatchId],
        shares: &[U256],
        target_type: BatchType,
    ) -> BatchResult<MoveReceipt> {
        self.ensure_not_paused()?;
        if batch_ids.len() != shares.len() || batch_ids.is_empty() {
            return Err(LedgerError::MismatchedInput {
                batch_ids: batch_ids.len(),
                shares: shares.len(),
            }
            .into());
        }

        let target_batch = self.store.current_open_batch(target_type);
        let target_token = self.store.batch(target_batch)?.supplied_token;

        let mut settlements: Vec<Settlement> = Vec::with_capacity(batch_ids.len());
        let mut total = U256::ZERO;
        for (&batch_id, &share) in batch_ids.iter().zip(shares) {
            if settlements.iter().any(|s| s.batch_id == batch_id) {
                return Err(LedgerError::InvalidBatch {
                    batch_id,
                    reason: "batch listed more than once",
                }
                .into());
            }
            if self.store.batch(batch_id)?.claimable_token != target_token {
                return Err(LedgerError::InvalidBatch {
                    batch_id,
                    reason: "batch output is not accepted by the target batch",
                }
                .into());
            }
            let settlement = self.store.preview_settlement(batch_id, account, Some(share))?;
            total = total
                .checked_add(settlement.owed)
                .ok_or(BatchError::Overflow("moved amount"))?;
            settlements.push(settlement);
        }

        self.store.record_contribution(target_batch, account, total)?;
        for settlement in &settlements {
            self.store.apply_settlement(settlement)?;
        }

        info!(
            account = %account,
            sources = settlements.len(),
            target_batch = %target_batch,
            amount = %total,
            "Moved unclaimed output into current batch"
        );

        Ok(MoveReceipt {
            account,
            source_batches: batch_ids.to_vec(),
            target_batch,
            amount: total,
        })
    }

    /// Send accumulated redemption fees to the fee recipient
    pub fn claim_redemption_fees(&mut self) -> BatchResult<U256> {
        let amount = self.accumulated_fees;
        if amount.is_zero() {
            return Err(LedgerError::NoFeesAccrued.into());
        }
        let token = self.store.tokens().claimable(BatchType::Redeem);
        let recipient = self.redemption_fee.recipient;

        self.accumulated_fees = U256::ZERO;
        if let Err(e) = self.custody.push(token, recipient, amount) {
            self.accumulated_fees = amount;
            return Err(e.into());
        }

        info!(recipient = %recipient, amount = %amount, "Redemption fees claimed");
        Ok(amount)
    }

    pub fn set_thresholds(&mut self, thresholds: BatchThresholds) -> BatchResult<()> {
        validate_thresholds(&thresholds)?;
        info!(
            cooldown_secs = thresholds.cooldown_secs,
            mint_threshold = %thresholds.mint_threshold,
            redeem_threshold = %thresholds.redeem_threshold,
            "Processing thresholds updated"
        );
        self.thresholds = thresholds;
        Ok(())
    }

    pub fn set_slippage(&mut self, slippage: SlippageGuard) -> BatchResult<()> {
        slippage.validate()?;
        info!(
            mint_bps = slippage.mint_bps,
            redeem_bps = slippage.redeem_bps,
            instant_max_bps = slippage.instant_max_bps,
            "Slippage tolerances updated"
        );
        self.slippage = slippage;
        Ok(())
    }

    pub fn set_redemption_fee(&mut self, fee: RedemptionFee) -> BatchResult<()> {
        fee.validate()?;
        info!(rate_bps = fee.rate_bps, recipient = %fee.recipient, "Redemption fee updated");
        self.redemption_fee = fee;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
        info!("Batch engine paused");
    }

    pub fn unpause(&mut self) {
        self.paused = false;
        info!("Batch engine unpaused");
    }
}
