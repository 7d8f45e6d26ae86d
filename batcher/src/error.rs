//! Error types for the batch engine
//!
//! Errors are grouped by the party expected to react to them: depositors
//! (ledger errors), keepers (eligibility errors), and everybody when the
//! market moves (market errors). Collaborator failures and configuration
//! problems have their own enums.

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::types::BatchId;

/// Main error type for the batch engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// Caller-correctable ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Keeper-facing eligibility errors
    #[error("Eligibility error: {0}")]
    Eligibility(#[from] EligibilityError),

    /// Price / batch-content safety errors
    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    /// Conversion adapter failures
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Token custody failures
    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Deposits, processing and instant conversions are suspended
    #[error("Engine is paused")]
    Paused,

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

/// Contribution ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid batch {batch_id}: {reason}")]
    InvalidBatch {
        batch_id: BatchId,
        reason: &'static str,
    },

    #[error("Insufficient contribution in {batch_id}: requested {requested}, available {available}")]
    InsufficientContribution {
        batch_id: BatchId,
        requested: U256,
        available: U256,
    },

    #[error("Nothing to claim in {batch_id} for {account}")]
    NothingToClaim { batch_id: BatchId, account: Address },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Unknown batch {0}")]
    UnknownBatch(BatchId),

    #[error("Mismatched input: {batch_ids} batch ids, {shares} share amounts")]
    MismatchedInput { batch_ids: usize, shares: usize },

    #[error("No redemption fees accrued")]
    NoFeesAccrued,

    #[error("No undelivered {token} output for {account}")]
    NothingUndelivered { token: Address, account: Address },
}

/// Processing eligibility errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("Batch {batch_id} is not eligible: age {age_secs}s, supplied {supplied}")]
    NotEligible {
        batch_id: BatchId,
        age_secs: i64,
        supplied: U256,
    },

    #[error("Batch {0} has already been processed")]
    AlreadyClosed(BatchId),
}

/// Market and batch-content safety errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Slippage exceeded: output {actual} below minimum {min_out}")]
    SlippageExceeded { actual: U256, min_out: U256 },

    #[error("Batch {0} has no supplied tokens")]
    EmptyBatch(BatchId),

    #[error("Slippage tolerance {requested_bps} bps exceeds maximum {max_bps} bps")]
    ToleranceTooHigh { requested_bps: u16, max_bps: u16 },

    #[error("Reference price must be non-zero")]
    ZeroPrice,
}

/// Conversion adapter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Reference price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
}

/// Token custody errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("Insufficient balance of {token} for {account}: required {required}, available {available}")]
    InsufficientBalance {
        token: Address,
        account: Address,
        required: U256,
        available: U256,
    },

    #[error("Transfer of {token} failed: {message}")]
    TransferFailed { token: Address, message: String },
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),
}

/// Error severity levels for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Transient errors that may resolve on retry
    Transient,
    /// Errors requiring attention but not critical
    Warning,
    /// Critical errors requiring immediate attention
    Critical,
    /// Fatal errors that prevent operation
    Fatal,
}

/// Who is expected to react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller re-queries state and retries with corrected parameters
    UserInput,
    /// Keeper re-polls later
    Eligibility,
    /// Current call reverted, a later attempt may succeed
    MarketSafety,
    /// Collaborator, configuration or arithmetic failure
    System,
}

impl BatchError {
    /// Get the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BatchError::Ledger(_) => ErrorSeverity::Warning,
            BatchError::Eligibility(_) => ErrorSeverity::Transient,
            BatchError::Market(e) => e.severity(),
            BatchError::Adapter(_) => ErrorSeverity::Transient,
            BatchError::Custody(e) => e.severity(),
            BatchError::Config(_) => ErrorSeverity::Fatal,
            BatchError::Paused => ErrorSeverity::Warning,
            BatchError::Overflow(_) => ErrorSeverity::Critical,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Transient)
    }

    /// Map onto the depositor / keeper / market taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            BatchError::Ledger(_) => ErrorCategory::UserInput,
            BatchError::Eligibility(_) => ErrorCategory::Eligibility,
            BatchError::Market(MarketError::ToleranceTooHigh { .. }) => ErrorCategory::UserInput,
            BatchError::Market(_) => ErrorCategory::MarketSafety,
            _ => ErrorCategory::System,
        }
    }

    /// Get a short error code for metrics/logging
    pub fn error_code(&self) -> &'static str {
        match self {
            BatchError::Ledger(e) => match e {
                LedgerError::InvalidBatch { .. } => "INVALID_BATCH",
                LedgerError::InsufficientContribution { .. } => "INSUFFICIENT_CONTRIBUTION",
                LedgerError::NothingToClaim { .. } => "NOTHING_TO_CLAIM",
                LedgerError::ZeroAmount => "ZERO_AMOUNT",
                LedgerError::UnknownBatch(_) => "UNKNOWN_BATCH",
                LedgerError::MismatchedInput { .. } => "MISMATCHED_INPUT",
                LedgerError::NoFeesAccrued => "NO_FEES_ACCRUED",
                LedgerError::NothingUndelivered { .. } => "NOTHING_UNDELIVERED",
            },
            BatchError::Eligibility(e) => match e {
                EligibilityError::NotEligible { .. } => "NOT_ELIGIBLE",
                EligibilityError::AlreadyClosed(_) => "ALREADY_CLOSED",
            },
            BatchError::Market(e) => match e {
                MarketError::SlippageExceeded { .. } => "SLIPPAGE_EXCEEDED",
                MarketError::EmptyBatch(_) => "EMPTY_BATCH",
                MarketError::ToleranceTooHigh { .. } => "TOLERANCE_TOO_HIGH",
                MarketError::ZeroPrice => "ZERO_PRICE",
            },
            BatchError::Adapter(_) => "ADAPTER_ERROR",
            BatchError::Custody(_) => "CUSTODY_ERROR",
            BatchError::Config(_) => "CONFIG_ERROR",
            BatchError::Paused => "PAUSED",
            BatchError::Overflow(_) => "OVERFLOW",
        }
    }
}

impl MarketError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            MarketError::SlippageExceeded { .. } => ErrorSeverity::Transient,
            MarketError::EmptyBatch(_) => ErrorSeverity::Transient,
            MarketError::ToleranceTooHigh { .. } => ErrorSeverity::Warning,
            MarketError::ZeroPrice => ErrorSeverity::Critical,
        }
    }
}

impl CustodyError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            CustodyError::InsufficientBalance { .. } => ErrorSeverity::Warning,
            CustodyError::TransferFailed { .. } => ErrorSeverity::Critical,
        }
    }
}

/// Result type alias using BatchError
pub type BatchResult<T> = std::result::Result<T, BatchError>;
