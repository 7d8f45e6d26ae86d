//! Unbatched conversions for single large callers
//!
//! The caller bears their own price impact and picks their own tolerance,
//! bounded by the configured instant maximum. No batch or contribution is
//! touched.

use alloy_primitives::{Address, U256};
use tracing::{error, info, warn};

use crate::adapter::{ConversionAdapter, TokenCustody};
use crate::engine::BatchEngine;
use crate::error::{BatchError, BatchResult, LedgerError};
use crate::slippage::check_output;
use crate::types::{BatchType, InstantReceipt};

impl<A: ConversionAdapter, V: TokenCustody> BatchEngine<A, V> {
    pub fn instant_mint(
        &mut self,
        account: Address,
        amount: U256,
        max_slippage_bps: u16,
    ) -> BatchResult<InstantReceipt> {
        self.instant(BatchType::Mint, account, amount, max_slippage_bps)
    }

    pub fn instant_redeem(
        &mut self,
        account: Address,
        amount: U256,
        max_slippage_bps: u16,
    ) -> BatchResult<InstantReceipt> {
        self.instant(BatchType::Redeem, account, amount, max_slippage_bps)
    }

    fn instant(
        &mut self,
        batch_type: BatchType,
        account: Address,
        amount: U256,
        max_slippage_bps: u16,
    ) -> BatchResult<InstantReceipt> {
        self.ensure_not_paused()?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount.into());
        }

        let tokens = *self.store.tokens();
        let input_token = tokens.supplied(batch_type);
        let output_token = tokens.claimable(batch_type);

        let reference_price = self.adapter.reference_price(batch_type)?;
        let min_output = self
            .slippage
            .instant_min_output(reference_price, amount, max_slippage_bps)?;

        self.custody.pull(input_token, account, amount)?;

        let output = match self
            .adapter
            .convert(batch_type, amount)
            .map_err(BatchError::from)
            .and_then(|output| check_output(output, min_output).map(|_| output))
        {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    batch_type = %batch_type,
                    account = %account,
                    amount = %amount,
                    min_output = %min_output,
                    error = %e,
                    "Instant conversion rejected; refunding input"
                );
                self.refund(input_token, account, amount);
                return Err(e);
            }
        };

        // The input is spent once converted; a failed delivery leaves the
        // output owed to the caller instead of refunding.
        if let Err(e) = self.custody.push(output_token, account, output) {
            self.record_undelivered(output_token, account, output)?;
            error!(
                batch_type = %batch_type,
                account = %account,
                output = %output,
                error = %e,
                "Instant output delivery failed; recorded as undelivered"
            );
            return Err(e.into());
        }

        info!(
            batch_type = %batch_type,
            account = %account,
            input = %amount,
            output = %output,
            slippage_bps = max_slippage_bps,
            "Instant conversion settled"
        );

        Ok(InstantReceipt {
            batch_type,
            account,
            input_token,
            output_token,
            input: amount,
            output,
            min_output,
            slippage_bps: max_slippage_bps,
        })
    }

    /// Converted output of a failed instant delivery still owed to `account`
    pub fn undelivered_output(&self, token: Address, account: Address) -> U256 {
        self.undelivered
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }

    /// Push an undelivered instant output again. The record is cleared
    /// before the transfer and restored if it fails.
    pub fn deliver_undelivered(&mut self, token: Address, account: Address) -> BatchResult<U256> {
        let amount = match self.undelivered.remove(&(token, account)) {
            Some(amount) if !amount.is_zero() => amount,
            _ => return Err(LedgerError::NothingUndelivered { token, account }.into()),
        };

        if let Err(e) = self.custody.push(token, account, amount) {
            self.undelivered.insert((token, account), amount);
            warn!(
                token = %token,
                account = %account,
                amount = %amount,
                error = %e,
                "Undelivered output push failed again"
            );
            return Err(e.into());
        }

        info!(token = %token, account = %account, amount = %amount, "Undelivered output delivered");
        Ok(amount)
    }

    fn record_undelivered(&mut self, token: Address, account: Address, amount: U256) -> BatchResult<()> {
        let owed = self.undelivered.entry((token, account)).or_default();
        *owed = owed
            .checked_add(amount)
            .ok_or(BatchError::Overflow("undelivered output"))?;
        Ok(())
    }

    fn refund(&mut self, token: Address, account: Address, amount: U256) {
        if let Err(e) = self.custody.push(token, account, amount) {
            error!(
                token = %token,
                account = %account,
                amount = %amount,
                error = %e,
                "Refund of instant conversion input failed"
            );
        }
    }
}
