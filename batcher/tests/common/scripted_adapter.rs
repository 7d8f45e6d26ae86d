//! Conversion adapter with scripted outputs
//!
//! Each `convert` call pops the next scripted result; once the script is
//! exhausted it falls back to the reference amount.

use std::collections::VecDeque;

use alloy_primitives::U256;
use batch_engine::{error::AdapterError, slippage::PRICE_SCALE, BatchType, ConversionAdapter};

#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    mint_price: U256,
    redeem_price: U256,
    script: VecDeque<Result<U256, AdapterError>>,
    /// `(batch_type, input)` of every convert call
    pub calls: Vec<(BatchType, U256)>,
}

impl ScriptedAdapter {
    pub fn new(mint_price: U256, redeem_price: U256) -> Self {
        Self {
            mint_price,
            redeem_price,
            ..Default::default()
        }
    }

    /// Adapter converting 1:1 in both directions
    pub fn par() -> Self {
        Self::new(PRICE_SCALE, PRICE_SCALE)
    }

    /// Queue the output of the next conversion
    pub fn then_output(mut self, output: u64) -> Self {
        self.script.push_back(Ok(U256::from(output)));
        self
    }

    /// Queue a failing conversion
    pub fn then_fail(mut self, message: &str) -> Self {
        self.script
            .push_back(Err(AdapterError::ConversionFailed(message.to_string())));
        self
    }

    fn price(&self, batch_type: BatchType) -> U256 {
        match batch_type {
            BatchType::Mint => self.mint_price,
            BatchType::Redeem => self.redeem_price,
        }
    }
}

impl ConversionAdapter for ScriptedAdapter {
    fn reference_price(&self, batch_type: BatchType) -> Result<U256, AdapterError> {
        Ok(self.price(batch_type))
    }

    fn convert(&mut self, batch_type: BatchType, input_amount: U256) -> Result<U256, AdapterError> {
        self.calls.push((batch_type, input_amount));
        match self.script.pop_front() {
            Some(result) => result,
            None => Ok(input_amount * self.price(batch_type) / PRICE_SCALE),
        }
    }
}
