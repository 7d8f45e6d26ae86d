//! Collaborator boundaries: conversion, token custody and time
//!
//! The engine only ever talks to the outside world through these traits, so
//! routing logic, token contracts and block time stay pluggable.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{AdapterError, CustodyError};
use crate::slippage::{BPS_DENOMINATOR, PRICE_SCALE};
use crate::types::BatchType;

/// Executes the actual swap / issue / redeem of pooled assets.
///
/// `convert` is called at most once per processing call or instant
/// conversion. Implementations must not keep state the engine depends on
/// between calls, and `reference_price` must be read live.
pub trait ConversionAdapter: Send {
    /// Expected output per unit of input, scaled by [`PRICE_SCALE`]
    fn reference_price(&self, batch_type: BatchType) -> Result<U256, AdapterError>;

    /// Convert `input_amount` and report the output received
    fn convert(&mut self, batch_type: BatchType, input_amount: U256) -> Result<U256, AdapterError>;
}

/// Moves tokens across the engine boundary
pub trait TokenCustody: Send {
    /// Take `amount` of `token` from `from` into engine custody
    fn pull(&mut self, token: Address, from: Address, amount: U256) -> Result<(), CustodyError>;

    /// Send `amount` of `token` from engine custody to `to`
    fn push(&mut self, token: Address, to: Address, amount: U256) -> Result<(), CustodyError>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::seconds(secs);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Adapter with a fixed price per batch type.
///
/// Conversions pay out the reference amount minus `execution_haircut_bps`,
/// which models price impact for local runs.
#[derive(Debug, Clone)]
pub struct StaticRateAdapter {
    mint_price: U256,
    redeem_price: U256,
    execution_haircut_bps: u16,
}

impl StaticRateAdapter {
    pub fn new(mint_price: U256, redeem_price: U256) -> Self {
        Self {
            mint_price,
            redeem_price,
            execution_haircut_bps: 0,
        }
    }

    pub fn with_haircut(mut self, execution_haircut_bps: u16) -> Self {
        self.execution_haircut_bps = execution_haircut_bps.min(BPS_DENOMINATOR);
        self
    }

    pub fn set_price(&mut self, batch_type: BatchType, price: U256) {
        match batch_type {
            BatchType::Mint => self.mint_price = price,
            BatchType::Redeem => self.redeem_price = price,
        }
    }

    pub fn set_haircut(&mut self, execution_haircut_bps: u16) {
        self.execution_haircut_bps = execution_haircut_bps.min(BPS_DENOMINATOR);
    }

    fn price(&self, batch_type: BatchType) -> U256 {
        match batch_type {
            BatchType::Mint => self.mint_price,
            BatchType::Redeem => self.redeem_price,
        }
    }
}

impl ConversionAdapter for StaticRateAdapter {
    fn reference_price(&self, batch_type: BatchType) -> Result<U256, AdapterError> {
        let price = self.price(batch_type);
        if price.is_zero() {
            return Err(AdapterError::PriceUnavailable(format!(
                "no {batch_type} price configured"
            )));
        }
        Ok(price)
    }

    fn convert(&mut self, batch_type: BatchType, input_amount: U256) -> Result<U256, AdapterError> {
        let price = self.reference_price(batch_type)?;
        let gross = input_amount
            .checked_mul(price)
            .ok_or_else(|| AdapterError::ConversionFailed("output overflow".to_string()))?
            / PRICE_SCALE;
        let keep = U256::from(BPS_DENOMINATOR - self.execution_haircut_bps);
        let output = gross
            .checked_mul(keep)
            .ok_or_else(|| AdapterError::ConversionFailed("output overflow".to_string()))?
            / U256::from(BPS_DENOMINATOR);

        debug!(
            batch_type = %batch_type,
            input = %input_amount,
            output = %output,
            "Static conversion executed"
        );
        Ok(output)
    }
}

/// Balance-tracking custody.
///
/// In strict mode a pull needs a prior `credit`; in open mode pulls are
/// assumed to be funded by the caller's wallet and only recorded.
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    strict: bool,
    balances: HashMap<(Address, Address), U256>,
    pulled: HashMap<Address, U256>,
    pushed: HashMap<Address, U256>,
}

impl InMemoryCustody {
    /// Custody that rejects pulls exceeding credited balances
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    /// Custody that accepts every pull
    pub fn open() -> Self {
        Self::default()
    }

    /// Credit an account's external wallet balance
    pub fn credit(&mut self, token: Address, account: Address, amount: U256) {
        let balance = self.balances.entry((token, account)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// External wallet balance of `account`
    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Total ever pulled into custody per token
    pub fn total_pulled(&self, token: Address) -> U256 {
        self.pulled.get(&token).copied().unwrap_or(U256::ZERO)
    }

    /// Total ever pushed out of custody per token
    pub fn total_pushed(&self, token: Address) -> U256 {
        self.pushed.get(&token).copied().unwrap_or(U256::ZERO)
    }
}

impl TokenCustody for InMemoryCustody {
    fn pull(&mut self, token: Address, from: Address, amount: U256) -> Result<(), CustodyError> {
        let available = self.balance_of(token, from);
        if self.strict {
            if available < amount {
                return Err(CustodyError::InsufficientBalance {
                    token,
                    account: from,
                    required: amount,
                    available,
                });
            }
            self.balances.insert((token, from), available - amount);
        }

        let pulled = self.pulled.entry(token).or_default();
        *pulled = pulled.saturating_add(amount);
        Ok(())
    }

    fn push(&mut self, token: Address, to: Address, amount: U256) -> Result<(), CustodyError> {
        self.credit(token, to, amount);
        let pushed = self.pushed.entry(token).or_default();
        *pushed = pushed.saturating_add(amount);
        Ok(())
    }
}
