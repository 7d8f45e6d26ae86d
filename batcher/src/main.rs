//! Batch keeper
//!
//! Runs the batch engine against the static reference adapter with
//! in-memory custody, polls for eligible batches and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use batch_engine::{
    ApiState, BatchEngine, BatcherConfig, ChannelIncentives, CircuitBreaker, HealthServer,
    InMemoryCustody, IncentiveClient, IncentiveForwarder, KeeperIncentives, KeeperService,
    KeeperStats, NoopIncentives, StaticRateAdapter, SystemClock,
};

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,batch_engine=debug"));

    if json {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = match std::env::var("BATCHER_CONFIG") {
        Ok(path) => BatcherConfig::from_file(path)?,
        Err(_) => BatcherConfig::from_env()?,
    };

    init_logging(config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Batch keeper starting"
    );

    config.validate()?;
    let settings = config.engine_settings()?;
    let keeper = config.keeper()?;
    let (mint_price, redeem_price) = config.prices()?;

    info!(
        input_token = %settings.tokens.input_token,
        product_token = %settings.tokens.product_token,
        cooldown_secs = settings.thresholds.cooldown_secs,
        mint_threshold = %settings.thresholds.mint_threshold,
        redeem_threshold = %settings.thresholds.redeem_threshold,
        poll_interval_secs = config.poll_interval_secs,
        http_port = config.http_port,
        "Configuration loaded"
    );

    let incentives: Box<dyn KeeperIncentives> = match &config.incentive_coordinator_url {
        Some(url) => {
            let (sink, receiver) = ChannelIncentives::channel();
            let forwarder = IncentiveForwarder::new(
                IncentiveClient::new(url),
                receiver,
                config.max_retries,
                Duration::from_secs(config.retry_delay_secs),
            );
            tokio::spawn(forwarder.run());
            info!(coordinator = %url, "Forwarding keeper incentive signals");
            Box::new(sink)
        }
        None => Box::new(NoopIncentives),
    };

    let adapter = StaticRateAdapter::new(mint_price, redeem_price).with_haircut(config.execution_haircut_bps);
    let engine = BatchEngine::with_parts(
        settings,
        adapter,
        InMemoryCustody::open(),
        incentives,
        Arc::new(SystemClock),
    )?;
    let engine = Arc::new(Mutex::new(engine));

    // Create shared stats
    let stats = Arc::new(RwLock::new(KeeperStats::default()));

    let service = KeeperService::new(
        Arc::clone(&engine),
        keeper,
        Duration::from_secs(config.poll_interval_secs),
    )
    .with_stats(Arc::clone(&stats))
    .with_circuit_breaker(CircuitBreaker::new(
        config.circuit_breaker_failure_threshold,
        config.circuit_breaker_reset_timeout_secs,
        config.circuit_breaker_half_open_success_threshold,
    ));

    let server = HealthServer::new(
        ApiState::new(Arc::clone(&engine), Arc::clone(&stats), config.poll_interval_secs),
        config.http_port,
    );

    // Run both services concurrently
    tokio::select! {
        result = service.run() => {
            if let Err(e) = result {
                error!(error = %e, "Keeper service failed");
                return Err(e);
            }
        }
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Batch keeper stopped");
    Ok(())
}
