//! Health check, metrics and API HTTP server
//!
//! Probe and monitoring endpoints:
//! - GET /health - Liveness probe (always returns 200 if server is running)
//! - GET /ready - Readiness probe (keeper polled recently, breaker not open)
//! - GET /metrics - Prometheus-compatible metrics
//! - GET /stats - JSON keeper statistics
//!
//! The JSON engine API from [`crate::api`] is served on the same port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::adapter::{ConversionAdapter, TokenCustody};
use crate::api;
use crate::service::SharedEngine;
use crate::types::{BatchType, CircuitBreakerState, KeeperStats};

/// Server state shared across handlers
pub struct ApiState<A, V> {
    /// Service start time for uptime calculation
    pub start_time: Instant,

    pub engine: SharedEngine<A, V>,

    /// Keeper statistics
    pub stats: Arc<RwLock<KeeperStats>>,

    /// Keeper poll interval, used to judge readiness
    pub poll_interval_secs: u64,
}

impl<A, V> ApiState<A, V> {
    pub fn new(engine: SharedEngine<A, V>, stats: Arc<RwLock<KeeperStats>>, poll_interval_secs: u64) -> Self {
        Self {
            start_time: Instant::now(),
            engine,
            stats,
            poll_interval_secs,
        }
    }
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub paused: bool,
    pub circuit_breaker: &'static str,
    pub last_cycle_secs_ago: Option<i64>,
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_slippage_rejections: u64,
    pub total_skipped: u64,
    pub total_cycles: u64,
    pub success_rate: f64,
    pub consecutive_failures: u64,
    pub avg_process_time_ms: u64,
    pub last_processed_at: Option<String>,
    pub last_batch_id: Option<String>,
    pub circuit_breaker: &'static str,
    pub uptime_secs: u64,
}

/// Health check handler - liveness probe
async fn health_handler<A, V>(State(state): State<Arc<ApiState<A, V>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check handler - readiness probe
async fn ready_handler<A, V>(State(state): State<Arc<ApiState<A, V>>>) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let paused = state.engine.lock().await.is_paused();
    let stats = state.stats.read().await;

    let last_cycle_secs_ago = stats
        .last_cycle_at
        .map(|t| Utc::now().signed_duration_since(t).num_seconds());

    // A cycle must have completed within three poll intervals
    let window = (state.poll_interval_secs.max(1) * 3) as i64;
    let polled_recently = last_cycle_secs_ago.map(|ago| ago <= window).unwrap_or(false);
    let breaker_open = stats.circuit_breaker_state == CircuitBreakerState::Open;

    let response = ReadyResponse {
        ready: polled_recently && !breaker_open,
        paused,
        circuit_breaker: stats.circuit_breaker_state.as_str(),
        last_cycle_secs_ago,
    };

    if response.ready {
        (StatusCode::OK, Json(response)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response()
    }
}

/// Metrics handler - Prometheus format
async fn metrics_handler<A, V>(State(state): State<Arc<ApiState<A, V>>>) -> String
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let (open_mint, open_redeem, accumulated_fees, paused) = {
        let engine = state.engine.lock().await;
        let supplied = |batch_type| {
            engine
                .batch(engine.current_open_batch(batch_type))
                .map(|b| b.supplied_token_total.to_string())
                .unwrap_or_else(|_| "0".to_string())
        };
        (
            supplied(BatchType::Mint),
            supplied(BatchType::Redeem),
            engine.accumulated_fees().to_string(),
            engine.is_paused(),
        )
    };

    let stats = state.stats.read().await;
    let uptime = state.start_time.elapsed().as_secs();

    format!(
        r#"# HELP batch_engine_batches_total Total number of batch processing attempts
# TYPE batch_engine_batches_total counter
batch_engine_batches_total{{status="processed"}} {}
batch_engine_batches_total{{status="failed"}} {}
batch_engine_batches_total{{status="skipped"}} {}

# HELP batch_engine_slippage_rejections_total Processing attempts rejected by the slippage guard
# TYPE batch_engine_slippage_rejections_total counter
batch_engine_slippage_rejections_total {}

# HELP batch_engine_cycles_total Keeper poll cycles completed
# TYPE batch_engine_cycles_total counter
batch_engine_cycles_total {}

# HELP batch_engine_success_rate Ratio of successful processing attempts
# TYPE batch_engine_success_rate gauge
batch_engine_success_rate {}

# HELP batch_engine_open_batch_supplied Supplied amount in the open batch
# TYPE batch_engine_open_batch_supplied gauge
batch_engine_open_batch_supplied{{batch_type="mint"}} {}
batch_engine_open_batch_supplied{{batch_type="redeem"}} {}

# HELP batch_engine_accumulated_fees Redemption fees awaiting collection
# TYPE batch_engine_accumulated_fees gauge
batch_engine_accumulated_fees {}

# HELP batch_engine_paused Whether the engine is paused
# TYPE batch_engine_paused gauge
batch_engine_paused {}

# HELP batch_engine_circuit_breaker_state Circuit breaker state (0=closed, 1=half-open, 2=open)
# TYPE batch_engine_circuit_breaker_state gauge
batch_engine_circuit_breaker_state {}

# HELP batch_engine_uptime_seconds Service uptime in seconds
# TYPE batch_engine_uptime_seconds gauge
batch_engine_uptime_seconds {}
"#,
        stats.total_processed,
        stats.total_failed,
        stats.total_skipped,
        stats.total_slippage_rejections,
        stats.total_cycles,
        stats.success_rate(),
        open_mint,
        open_redeem,
        accumulated_fees,
        if paused { 1 } else { 0 },
        stats.circuit_breaker_state.as_metric(),
        uptime,
    )
}

/// Stats handler - JSON statistics
async fn stats_handler<A, V>(State(state): State<Arc<ApiState<A, V>>>) -> Json<StatsResponse> {
    let stats = state.stats.read().await;

    Json(StatsResponse {
        total_processed: stats.total_processed,
        total_failed: stats.total_failed,
        total_slippage_rejections: stats.total_slippage_rejections,
        total_skipped: stats.total_skipped,
        total_cycles: stats.total_cycles,
        success_rate: stats.success_rate(),
        consecutive_failures: stats.consecutive_failures,
        avg_process_time_ms: stats.avg_process_time_ms,
        last_processed_at: stats.last_processed_at.map(|t| t.to_rfc3339()),
        last_batch_id: stats.last_batch_id.map(|id| id.to_string()),
        circuit_breaker: stats.circuit_breaker_state.as_str(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Create the server router
pub fn create_router<A, V>(state: Arc<ApiState<A, V>>) -> Router
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    Router::new()
        .route("/health", get(health_handler::<A, V>))
        .route("/ready", get(ready_handler::<A, V>))
        .route("/metrics", get(metrics_handler::<A, V>))
        .route("/stats", get(stats_handler::<A, V>))
        .merge(api::routes::<A, V>())
        .with_state(state)
}

/// HTTP server that runs alongside the keeper service
pub struct HealthServer<A, V> {
    state: Arc<ApiState<A, V>>,
    port: u16,
}

impl<A, V> HealthServer<A, V>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    /// Create a new server
    pub fn new(state: ApiState<A, V>, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            port,
        }
    }

    /// Get shared state
    pub fn state(&self) -> Arc<ApiState<A, V>> {
        Arc::clone(&self.state)
    }

    /// Run the server
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = create_router(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        info!(port = self.port, "HTTP server starting");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
