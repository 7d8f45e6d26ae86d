//! Minimum-output bounds for conversions

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult, ConfigError, MarketError};
use crate::types::BatchType;

/// Basis points in 100%
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Fixed-point scale of reference prices (1e18)
pub const PRICE_SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Upper bound for the configured batch tolerances
pub const MAX_BATCH_SLIPPAGE_BPS: u16 = 200;

/// `input * price * (10_000 - tolerance) / 10_000 / PRICE_SCALE`
///
/// `reference_price` is output per unit of input scaled by [`PRICE_SCALE`].
pub fn min_acceptable_output(
    reference_price: U256,
    input_amount: U256,
    tolerance_bps: u16,
) -> BatchResult<U256> {
    if tolerance_bps > BPS_DENOMINATOR {
        return Err(MarketError::ToleranceTooHigh {
            requested_bps: tolerance_bps,
            max_bps: BPS_DENOMINATOR,
        }
        .into());
    }
    if reference_price.is_zero() {
        return Err(MarketError::ZeroPrice.into());
    }

    let keep = U256::from(BPS_DENOMINATOR - tolerance_bps);
    let gross = input_amount
        .checked_mul(reference_price)
        .ok_or(BatchError::Overflow("expected output"))?;
    let bounded = gross
        .checked_mul(keep)
        .ok_or(BatchError::Overflow("minimum output"))?;

    Ok(bounded / U256::from(BPS_DENOMINATOR) / PRICE_SCALE)
}

/// Fail with `SlippageExceeded` when `actual_output < min_out`
pub fn check_output(actual_output: U256, min_out: U256) -> BatchResult<()> {
    if actual_output < min_out {
        return Err(MarketError::SlippageExceeded {
            actual: actual_output,
            min_out,
        }
        .into());
    }
    Ok(())
}

/// Slippage tolerances applied by the engine.
///
/// Batch tolerances are configuration, never depositor input. Instant
/// callers pick their own tolerance up to `instant_max_bps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageGuard {
    pub mint_bps: u16,
    pub redeem_bps: u16,
    pub instant_max_bps: u16,
}

impl Default for SlippageGuard {
    fn default() -> Self {
        Self {
            mint_bps: 7,
            redeem_bps: 7,
            instant_max_bps: 100,
        }
    }
}

impl SlippageGuard {
    pub fn new(mint_bps: u16, redeem_bps: u16, instant_max_bps: u16) -> Result<Self, ConfigError> {
        let guard = Self {
            mint_bps,
            redeem_bps,
            instant_max_bps,
        };
        guard.validate()?;
        Ok(guard)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("mint_slippage_bps", self.mint_bps), ("redeem_slippage_bps", self.redeem_bps)] {
            if value > MAX_BATCH_SLIPPAGE_BPS {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("{value} bps exceeds maximum of {MAX_BATCH_SLIPPAGE_BPS} bps"),
                });
            }
        }
        if self.instant_max_bps > BPS_DENOMINATOR {
            return Err(ConfigError::InvalidValue {
                field: "instant_max_slippage_bps".to_string(),
                message: format!("{} bps exceeds {BPS_DENOMINATOR} bps", self.instant_max_bps),
            });
        }
        Ok(())
    }

    /// Configured tolerance for batch processing
    pub fn tolerance(&self, batch_type: BatchType) -> u16 {
        match batch_type {
            BatchType::Mint => self.mint_bps,
            BatchType::Redeem => self.redeem_bps,
        }
    }

    /// Minimum output for processing a batch of `batch_type`
    pub fn batch_min_output(
        &self,
        batch_type: BatchType,
        reference_price: U256,
        input_amount: U256,
    ) -> BatchResult<U256> {
        min_acceptable_output(reference_price, input_amount, self.tolerance(batch_type))
    }

    /// Minimum output for an instant conversion with a caller tolerance
    pub fn instant_min_output(
        &self,
        reference_price: U256,
        input_amount: U256,
        requested_bps: u16,
    ) -> BatchResult<U256> {
        if requested_bps > self.instant_max_bps {
            return Err(MarketError::ToleranceTooHigh {
                requested_bps,
                max_bps: self.instant_max_bps,
            }
            .into());
        }
        min_acceptable_output(reference_price, input_amount, requested_bps)
    }
}
