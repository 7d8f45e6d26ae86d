//! Types for the batch engine

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchType {
    /// Input token in, product token out
    Mint,
    /// Product token in, input token out
    Redeem,
}

impl BatchType {
    pub const ALL: [BatchType; 2] = [BatchType::Mint, BatchType::Redeem];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchType::Mint => "mint",
            BatchType::Redeem => "redeem",
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mint" => Ok(BatchType::Mint),
            "redeem" => Ok(BatchType::Redeem),
            other => Err(format!("unknown batch type: {other}")),
        }
    }
}

/// Batch lifecycle status. The only transition is `Open -> Claimable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Open,
    Claimable,
}

/// Batch identifier: gap-free sequence number per batch type.
///
/// Renders as `mint-4` / `redeem-0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchId {
    batch_type: BatchType,
    index: u64,
}

impl BatchId {
    pub fn new(batch_type: BatchType, index: u64) -> Self {
        Self { batch_type, index }
    }

    pub fn batch_type(&self) -> BatchType {
        self.batch_type
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Id of the batch opened after this one
    pub fn next(&self) -> Self {
        Self::new(self.batch_type, self.index + 1)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.batch_type, self.index)
    }
}

impl FromStr for BatchId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, index) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid batch id: {s}"))?;
        let index = index
            .parse::<u64>()
            .map_err(|e| format!("invalid batch index in {s}: {e}"))?;
        Ok(Self::new(kind.parse()?, index))
    }
}

impl TryFrom<String> for BatchId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BatchId> for String {
    fn from(id: BatchId) -> Self {
        id.to_string()
    }
}

/// Token handles of one asset pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Token deposited into mint batches and paid out of redeem batches
    pub input_token: Address,
    /// Token paid out of mint batches and deposited into redeem batches
    pub product_token: Address,
}

impl TokenPair {
    /// Token supplied into a batch of the given type
    pub fn supplied(&self, batch_type: BatchType) -> Address {
        match batch_type {
            BatchType::Mint => self.input_token,
            BatchType::Redeem => self.product_token,
        }
    }

    /// Token claimed out of a batch of the given type
    pub fn claimable(&self, batch_type: BatchType) -> Address {
        match batch_type {
            BatchType::Mint => self.product_token,
            BatchType::Redeem => self.input_token,
        }
    }
}

/// A pool of same-type deposits processed in one conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub batch_type: BatchType,
    pub status: BatchStatus,
    pub supplied_token: Address,
    pub claimable_token: Address,
    /// Sum of all live contributions while open; frozen once claimable
    pub supplied_token_total: U256,
    /// Output credited to depositors; present iff the batch is claimable
    pub claimable_token_total: Option<U256>,
    /// Contribution shares already settled against the output
    pub claimed_supplied: U256,
    /// Output already paid out (or moved) to depositors
    pub paid_out: U256,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub(crate) fn open(id: BatchId, tokens: &TokenPair, created_at: DateTime<Utc>) -> Self {
        let batch_type = id.batch_type();
        Self {
            id,
            batch_type,
            status: BatchStatus::Open,
            supplied_token: tokens.supplied(batch_type),
            claimable_token: tokens.claimable(batch_type),
            supplied_token_total: U256::ZERO,
            claimable_token_total: None,
            claimed_supplied: U256::ZERO,
            paid_out: U256::ZERO,
            created_at,
            processed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == BatchStatus::Open
    }

    pub fn is_claimable(&self) -> bool {
        self.status == BatchStatus::Claimable
    }

    /// Seconds elapsed since the batch was opened
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created_at).num_seconds()
    }

    /// Contribution shares not yet settled
    pub fn outstanding_supplied(&self) -> U256 {
        self.supplied_token_total.saturating_sub(self.claimed_supplied)
    }

    /// Rounding residual left behind once every contribution is settled
    pub fn dust(&self) -> Option<U256> {
        let total = self.claimable_token_total?;
        if self.claimed_supplied < self.supplied_token_total {
            return None;
        }
        Some(total.saturating_sub(self.paid_out))
    }
}

/// Keeper eligibility thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchThresholds {
    /// Batch age after which it is eligible regardless of size
    pub cooldown_secs: u64,
    /// Supplied total at which a mint batch is eligible immediately
    pub mint_threshold: U256,
    /// Supplied total at which a redeem batch is eligible immediately
    pub redeem_threshold: U256,
}

impl BatchThresholds {
    pub fn size_threshold(&self, batch_type: BatchType) -> U256 {
        match batch_type {
            BatchType::Mint => self.mint_threshold,
            BatchType::Redeem => self.redeem_threshold,
        }
    }
}

/// Keeper-visible processing state of the currently open batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    AwaitingThreshold,
    Eligible,
}

/// Signal emitted after a batch transitions to claimable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedBatch {
    pub batch_id: BatchId,
    pub batch_type: BatchType,
    pub keeper: Address,
    pub supplied_token_total: U256,
    /// Gross adapter output
    pub output: U256,
    pub min_output: U256,
    /// Redemption fee retained from the gross output
    pub fee: U256,
    pub claimable_token_total: U256,
    pub next_batch_id: BatchId,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of a deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionReceipt {
    pub batch_id: BatchId,
    pub account: Address,
    pub amount: U256,
    /// Account contribution after the operation
    pub contribution: U256,
    /// Batch supplied total after the operation
    pub batch_total: U256,
}

/// Outcome of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub batch_id: BatchId,
    pub account: Address,
    pub token: Address,
    pub shares: U256,
    pub amount: U256,
}

/// Outcome of moving claimable output into the open batch of another type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReceipt {
    pub account: Address,
    pub source_batches: Vec<BatchId>,
    pub target_batch: BatchId,
    pub amount: U256,
}

/// Outcome of an instant conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantReceipt {
    pub batch_type: BatchType,
    pub account: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub input: U256,
    pub output: U256,
    pub min_output: U256,
    pub slippage_bps: u16,
}

/// Keeper service statistics
#[derive(Debug, Clone, Default)]
pub struct KeeperStats {
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_slippage_rejections: u64,
    pub total_skipped: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub last_batch_id: Option<BatchId>,
    /// Consecutive failures (resets on success)
    pub consecutive_failures: u64,
    /// Average processing time in milliseconds
    pub avg_process_time_ms: u64,
    /// Service start time
    pub service_started: Option<DateTime<Utc>>,
    /// Total poll cycles completed
    pub total_cycles: u64,
    /// Completion time of the last poll cycle
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Circuit breaker state
    pub circuit_breaker_state: CircuitBreakerState,
    /// Total cycles skipped due to open circuit breaker
    pub circuit_breaker_open_skips: u64,
}

impl KeeperStats {
    /// Record a successfully processed batch
    pub fn record_success(&mut self, batch_id: BatchId, process_time_ms: u64) {
        self.total_processed += 1;
        self.consecutive_failures = 0;
        self.last_processed_at = Some(Utc::now());
        self.last_batch_id = Some(batch_id);

        if self.total_processed == 1 {
            self.avg_process_time_ms = process_time_ms;
        } else {
            self.avg_process_time_ms = (self.avg_process_time_ms * 9 + process_time_ms) / 10;
        }
    }

    /// Record a failed processing attempt
    pub fn record_failure(&mut self, slippage: bool) {
        self.total_failed += 1;
        self.consecutive_failures += 1;
        if slippage {
            self.total_slippage_rejections += 1;
        }
    }

    /// Record a batch that was not ready for processing
    pub fn record_skip(&mut self) {
        self.total_skipped += 1;
    }

    /// Share of processing attempts that succeeded
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed + self.total_failed;
        if total == 0 {
            return 1.0;
        }
        self.total_processed as f64 / total as f64
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitBreakerState {
    /// Normal operation
    #[default]
    Closed,
    /// Testing if processing has recovered
    HalfOpen,
    /// Blocking processing attempts
    Open,
}

impl CircuitBreakerState {
    /// String representation for logs and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitBreakerState::Closed => "closed",
            CircuitBreakerState::HalfOpen => "half-open",
            CircuitBreakerState::Open => "open",
        }
    }

    /// Metric representation for Prometheus (0=closed, 1=half-open, 2=open)
    pub fn as_metric(&self) -> u64 {
        match self {
            CircuitBreakerState::Closed => 0,
            CircuitBreakerState::HalfOpen => 1,
            CircuitBreakerState::Open => 2,
        }
    }
}

/// Circuit breaker around keeper processing attempts
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    pub state: CircuitBreakerState,
    pub failure_threshold: u64,
    pub reset_timeout_secs: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub half_open_success_count: u64,
    pub half_open_success_threshold: u64,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_threshold: 5,
            reset_timeout_secs: 60,
            last_failure_time: None,
            half_open_success_count: 0,
            half_open_success_threshold: 3,
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with custom settings
    pub fn new(failure_threshold: u64, reset_timeout_secs: u64, half_open_success_threshold: u64) -> Self {
        Self {
            failure_threshold,
            reset_timeout_secs,
            half_open_success_threshold,
            ..Default::default()
        }
    }

    /// Check if a processing attempt should be allowed at `now`
    pub fn allow_request(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::Open => {
                if let Some(last_failure) = self.last_failure_time {
                    let elapsed = now.signed_duration_since(last_failure);
                    if elapsed.num_seconds() >= self.reset_timeout_secs as i64 {
                        self.state = CircuitBreakerState::HalfOpen;
                        self.half_open_success_count = 0;
                        return true;
                    }
                }
                false
            }
            CircuitBreakerState::HalfOpen => true,
        }
    }

    /// Record a successful attempt
    pub fn record_success(&mut self) {
        match self.state {
            CircuitBreakerState::HalfOpen => {
                self.half_open_success_count += 1;
                if self.half_open_success_count >= self.half_open_success_threshold {
                    self.state = CircuitBreakerState::Closed;
                    self.half_open_success_count = 0;
                }
            }
            CircuitBreakerState::Closed => {}
            CircuitBreakerState::Open => {
                self.state = CircuitBreakerState::Closed;
            }
        }
    }

    /// Record a failed attempt
    pub fn record_failure(&mut self, consecutive_failures: u64, now: DateTime<Utc>) {
        self.last_failure_time = Some(now);

        match self.state {
            CircuitBreakerState::Closed => {
                if consecutive_failures >= self.failure_threshold {
                    self.state = CircuitBreakerState::Open;
                }
            }
            CircuitBreakerState::HalfOpen => {
                self.state = CircuitBreakerState::Open;
                self.half_open_success_count = 0;
            }
            CircuitBreakerState::Open => {}
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CircuitBreakerState::Open)
    }
}
