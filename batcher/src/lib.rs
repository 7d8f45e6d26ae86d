//! Batch Mint/Redeem Engine
//!
//! Pools many small deposits into mint and redeem batches, converts each
//! batch in one operation once it is old or large enough, and lets
//! depositors claim their pro-rata share of the output.
//! Ships with a keeper loop and an HTTP API around the engine.

pub mod adapter;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod incentives;
pub mod instant;
pub mod ledger;
pub mod processor;
pub mod service;
pub mod slippage;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use adapter::{
    Clock, ConversionAdapter, InMemoryCustody, ManualClock, StaticRateAdapter, SystemClock,
    TokenCustody,
};
pub use config::BatcherConfig;
pub use engine::{BatchEngine, EngineSettings, RedemptionFee};
pub use error::{BatchError, BatchResult};
pub use health::{ApiState, HealthServer};
pub use incentives::{ChannelIncentives, IncentiveClient, IncentiveForwarder, KeeperIncentives, NoopIncentives};
pub use service::{CycleOutcome, KeeperService, SharedEngine};
pub use slippage::SlippageGuard;
pub use types::*;
