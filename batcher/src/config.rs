//! Configuration for the batch keeper

use std::path::Path;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use serde::Deserialize;

use crate::engine::{EngineSettings, RedemptionFee};
use crate::error::ConfigError;
use crate::slippage::SlippageGuard;
use crate::types::{BatchThresholds, TokenPair};

/// Batch keeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BatcherConfig {
    /// Token deposited into mint batches and paid out by redeem batches
    pub input_token_address: String,

    /// Token paid out by mint batches and deposited into redeem batches
    pub product_token_address: String,

    /// Address credited for keeper work
    #[serde(default = "default_keeper_address")]
    pub keeper_address: String,

    /// Seconds after which any non-empty batch may be processed
    #[serde(default = "default_cooldown")]
    pub batch_cooldown_secs: u64,

    /// Supplied amount that makes a mint batch eligible (base units)
    #[serde(default = "default_size_threshold")]
    pub mint_threshold: String,

    /// Supplied amount that makes a redeem batch eligible (base units)
    #[serde(default = "default_size_threshold")]
    pub redeem_threshold: String,

    #[serde(default = "default_batch_slippage_bps")]
    pub mint_slippage_bps: u16,

    #[serde(default = "default_batch_slippage_bps")]
    pub redeem_slippage_bps: u16,

    /// Largest tolerance an instant caller may request
    #[serde(default = "default_instant_max_slippage_bps")]
    pub instant_max_slippage_bps: u16,

    /// Fee on redeem batch output in bps (0 = disabled)
    #[serde(default)]
    pub redemption_fee_bps: u16,

    #[serde(default)]
    pub fee_recipient: Option<String>,

    /// Product tokens per input token, scaled by 1e18
    #[serde(default = "default_price")]
    pub mint_price: String,

    /// Input tokens per product token, scaled by 1e18
    #[serde(default = "default_price")]
    pub redeem_price: String,

    /// Execution haircut applied by the static adapter in bps
    #[serde(default)]
    pub execution_haircut_bps: u16,

    /// Keeper poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// External incentive coordinator (None = signals are dropped)
    #[serde(default)]
    pub incentive_coordinator_url: Option<String>,

    /// Maximum retries for failed incentive deliveries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry delay in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Emit JSON logs
    #[serde(default)]
    pub log_json: bool,

    /// Circuit breaker failure threshold (consecutive failures)
    #[serde(default = "default_circuit_breaker_failure_threshold")]
    pub circuit_breaker_failure_threshold: u64,

    /// Circuit breaker reset timeout in seconds
    #[serde(default = "default_circuit_breaker_reset_timeout_secs")]
    pub circuit_breaker_reset_timeout_secs: u64,

    /// Circuit breaker successes required to close after half-open
    #[serde(default = "default_circuit_breaker_half_open_success_threshold")]
    pub circuit_breaker_half_open_success_threshold: u64,
}

fn default_keeper_address() -> String {
    Address::ZERO.to_string()
}

fn default_cooldown() -> u64 {
    1_800
}

fn default_size_threshold() -> String {
    "1000000000000000000000".to_string()
}

fn default_batch_slippage_bps() -> u16 {
    7
}

fn default_instant_max_slippage_bps() -> u16 {
    100
}

fn default_price() -> String {
    "1000000000000000000".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_http_port() -> u16 {
    9090
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_circuit_breaker_failure_threshold() -> u64 {
    5
}

fn default_circuit_breaker_reset_timeout_secs() -> u64 {
    60
}

fn default_circuit_breaker_half_open_success_threshold() -> u64 {
    3
}

fn env_or<T: FromStr>(key: &str, default: impl FnOnce() -> T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(default)
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(format!("{field}: {value}")))
}

fn parse_amount(field: &str, value: &str) -> Result<U256, ConfigError> {
    U256::from_str(value.trim()).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: e.to_string(),
    })
}

impl BatcherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            input_token_address: std::env::var("INPUT_TOKEN_ADDRESS")
                .map_err(|_| ConfigError::MissingEnvVar("INPUT_TOKEN_ADDRESS".to_string()))?,
            product_token_address: std::env::var("PRODUCT_TOKEN_ADDRESS")
                .map_err(|_| ConfigError::MissingEnvVar("PRODUCT_TOKEN_ADDRESS".to_string()))?,
            keeper_address: std::env::var("KEEPER_ADDRESS").unwrap_or_else(|_| default_keeper_address()),
            batch_cooldown_secs: env_or("BATCH_COOLDOWN_SECS", default_cooldown),
            mint_threshold: std::env::var("MINT_THRESHOLD").unwrap_or_else(|_| default_size_threshold()),
            redeem_threshold: std::env::var("REDEEM_THRESHOLD").unwrap_or_else(|_| default_size_threshold()),
            mint_slippage_bps: env_or("MINT_SLIPPAGE_BPS", default_batch_slippage_bps),
            redeem_slippage_bps: env_or("REDEEM_SLIPPAGE_BPS", default_batch_slippage_bps),
            instant_max_slippage_bps: env_or("INSTANT_MAX_SLIPPAGE_BPS", default_instant_max_slippage_bps),
            redemption_fee_bps: env_or("REDEMPTION_FEE_BPS", || 0),
            fee_recipient: std::env::var("FEE_RECIPIENT").ok(),
            mint_price: std::env::var("MINT_PRICE").unwrap_or_else(|_| default_price()),
            redeem_price: std::env::var("REDEEM_PRICE").unwrap_or_else(|_| default_price()),
            execution_haircut_bps: env_or("EXECUTION_HAIRCUT_BPS", || 0),
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", default_poll_interval),
            http_port: env_or("HTTP_PORT", default_http_port),
            incentive_coordinator_url: std::env::var("INCENTIVE_COORDINATOR_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            max_retries: env_or("MAX_RETRIES", default_max_retries),
            retry_delay_secs: env_or("RETRY_DELAY_SECS", default_retry_delay),
            log_json: env_or("LOG_JSON", || false),
            circuit_breaker_failure_threshold: env_or(
                "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                default_circuit_breaker_failure_threshold,
            ),
            circuit_breaker_reset_timeout_secs: env_or(
                "CIRCUIT_BREAKER_RESET_TIMEOUT_SECS",
                default_circuit_breaker_reset_timeout_secs,
            ),
            circuit_breaker_half_open_success_threshold: env_or(
                "CIRCUIT_BREAKER_HALF_OPEN_SUCCESS_THRESHOLD",
                default_circuit_breaker_half_open_success_threshold,
            ),
        })
    }

    /// Load configuration from a file, overlaid with `BATCHER_*` variables
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("BATCHER"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn keeper(&self) -> Result<Address, ConfigError> {
        parse_address("keeper_address", &self.keeper_address)
    }

    /// Reference prices for the static adapter as `(mint, redeem)`
    pub fn prices(&self) -> Result<(U256, U256), ConfigError> {
        Ok((
            parse_amount("mint_price", &self.mint_price)?,
            parse_amount("redeem_price", &self.redeem_price)?,
        ))
    }

    /// Engine parameters described by this configuration
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let tokens = TokenPair {
            input_token: parse_address("input_token_address", &self.input_token_address)?,
            product_token: parse_address("product_token_address", &self.product_token_address)?,
        };

        let thresholds = BatchThresholds {
            cooldown_secs: self.batch_cooldown_secs,
            mint_threshold: parse_amount("mint_threshold", &self.mint_threshold)?,
            redeem_threshold: parse_amount("redeem_threshold", &self.redeem_threshold)?,
        };

        let slippage = SlippageGuard {
            mint_bps: self.mint_slippage_bps,
            redeem_bps: self.redeem_slippage_bps,
            instant_max_bps: self.instant_max_slippage_bps,
        };

        let recipient = match &self.fee_recipient {
            Some(value) => parse_address("fee_recipient", value)?,
            None => Address::ZERO,
        };

        let settings = EngineSettings {
            tokens,
            thresholds,
            slippage,
            redemption_fee: RedemptionFee {
                rate_bps: self.redemption_fee_bps,
                recipient,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate everything the keeper needs before starting
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_settings()?;
        self.keeper()?;

        let (mint_price, redeem_price) = self.prices()?;
        if mint_price.is_zero() || redeem_price.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "mint_price/redeem_price".to_string(),
                message: "reference prices must be non-zero".to_string(),
            });
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if let Some(url) = &self.incentive_coordinator_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: "incentive_coordinator_url".to_string(),
                    message: format!("{url} is not an http(s) URL"),
                });
            }
        }

        Ok(())
    }
}
