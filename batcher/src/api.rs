//! JSON API over the batch engine
//!
//! - GET  /v1/batches/{id}
//! - GET  /v1/batches/current/{type}
//! - GET  /v1/batches/{id}/contributions/{account}
//! - GET  /v1/accounts/{account}/batches
//! - GET  /v1/accounts/{account}/undelivered/{token}
//! - POST /v1/deposits, /v1/withdrawals, /v1/claims, /v1/moves, /v1/deliveries
//! - POST /v1/instant/{type}
//! - POST /v1/process/{type}

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{ConversionAdapter, TokenCustody};
use crate::error::{BatchError, CustodyError, ErrorCategory, LedgerError};
use crate::health::ApiState;
use crate::types::{Batch, BatchId, BatchType};

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    pub retryable: bool,
}

/// Engine or request error rendered as an HTTP response
#[derive(Debug)]
pub enum ApiError {
    Engine(BatchError),
    BadRequest(String),
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        ApiError::Engine(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(BatchError::Ledger(LedgerError::UnknownBatch(_))) => StatusCode::NOT_FOUND,
            ApiError::Engine(BatchError::Paused) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Engine(BatchError::Custody(CustodyError::InsufficientBalance { .. })) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Engine(e) => match e.category() {
                ErrorCategory::UserInput => StatusCode::BAD_REQUEST,
                ErrorCategory::Eligibility => StatusCode::CONFLICT,
                ErrorCategory::MarketSafety => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCategory::System => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message) => ErrorResponse {
                error_code: "INVALID_REQUEST".to_string(),
                message,
                retryable: false,
            },
            ApiError::Engine(e) => ErrorResponse {
                error_code: e.error_code().to_string(),
                message: e.to_string(),
                retryable: e.is_retryable(),
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_batch_id(raw: &str) -> Result<BatchId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid batch id: {raw}")))
}

fn parse_batch_type(raw: &str) -> Result<BatchType, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid batch type: {raw}")))
}

fn parse_account(raw: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid address: {raw}")))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContributionResponse {
    pub batch_id: BatchId,
    pub account: Address,
    pub amount: U256,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountBatchesResponse {
    pub account: Address,
    pub batch_ids: Vec<BatchId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UndeliveredResponse {
    pub account: Address,
    pub token: Address,
    pub amount: U256,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub batch_type: BatchType,
    pub account: Address,
    pub amount: U256,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub batch_id: BatchId,
    pub account: Address,
    pub amount: U256,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub batch_id: BatchId,
    pub account: Address,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub account: Address,
    pub batch_ids: Vec<BatchId>,
    pub shares: Vec<U256>,
    pub target_type: BatchType,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryRequest {
    pub account: Address,
    pub token: Address,
}

/// Processing is permissionless; the caller names the keeper to credit
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub keeper: Address,
}

#[derive(Debug, Deserialize)]
pub struct InstantRequest {
    pub account: Address,
    pub amount: U256,
    pub max_slippage_bps: u16,
}

async fn batch_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Path(id): Path<String>,
) -> ApiResult<Batch>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let batch_id = parse_batch_id(&id)?;
    let engine = state.engine.lock().await;
    Ok(Json(engine.batch(batch_id)?.clone()))
}

async fn current_batch_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Path(batch_type): Path<String>,
) -> ApiResult<Batch>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let batch_type = parse_batch_type(&batch_type)?;
    let engine = state.engine.lock().await;
    let batch_id = engine.current_open_batch(batch_type);
    Ok(Json(engine.batch(batch_id)?.clone()))
}

async fn contribution_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Path((id, account)): Path<(String, String)>,
) -> ApiResult<ContributionResponse>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let batch_id = parse_batch_id(&id)?;
    let account = parse_account(&account)?;
    let engine = state.engine.lock().await;
    engine.batch(batch_id)?;

    Ok(Json(ContributionResponse {
        batch_id,
        account,
        amount: engine.contribution(batch_id, account),
    }))
}

async fn account_batches_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Path(account): Path<String>,
) -> ApiResult<AccountBatchesResponse>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let account = parse_account(&account)?;
    let engine = state.engine.lock().await;

    Ok(Json(AccountBatchesResponse {
        account,
        batch_ids: engine.account_batches(account).to_vec(),
    }))
}

async fn undelivered_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Path((account, token)): Path<(String, String)>,
) -> ApiResult<UndeliveredResponse>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let account = parse_account(&account)?;
    let token = parse_account(&token)?;
    let engine = state.engine.lock().await;

    Ok(Json(UndeliveredResponse {
        account,
        token,
        amount: engine.undelivered_output(token, account),
    }))
}

async fn deposit_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Json(req): Json<DepositRequest>,
) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    debug!(batch_type = %req.batch_type, account = %req.account, "Deposit request");
    let result = state
        .engine
        .lock()
        .await
        .deposit(req.batch_type, req.amount, req.account);
    respond(result)
}

async fn withdraw_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Json(req): Json<WithdrawRequest>,
) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let result = state
        .engine
        .lock()
        .await
        .withdraw_from_batch(req.batch_id, req.amount, req.account);
    respond(result)
}

async fn claim_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Json(req): Json<ClaimRequest>,
) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let result = state.engine.lock().await.claim(req.batch_id, req.account);
    respond(result)
}

async fn move_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Json(req): Json<MoveRequest>,
) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let result = state.engine.lock().await.move_unclaimed_into_current_batch(
        req.account,
        &req.batch_ids,
        &req.shares,
        req.target_type,
    );
    respond(result)
}

async fn delivery_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Json(req): Json<DeliveryRequest>,
) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let result = state
        .engine
        .lock()
        .await
        .deliver_undelivered(req.token, req.account);
    respond(result)
}

async fn process_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Path(batch_type): Path<String>,
    Json(req): Json<ProcessRequest>,
) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let batch_type = match parse_batch_type(&batch_type) {
        Ok(batch_type) => batch_type,
        Err(e) => return e.into_response(),
    };

    debug!(batch_type = %batch_type, keeper = %req.keeper, "Process request");
    let result = state.engine.lock().await.process(batch_type, req.keeper);
    respond(result)
}

async fn instant_handler<A, V>(
    State(state): State<Arc<ApiState<A, V>>>,
    Path(batch_type): Path<String>,
    Json(req): Json<InstantRequest>,
) -> Response
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    let batch_type = match parse_batch_type(&batch_type) {
        Ok(batch_type) => batch_type,
        Err(e) => return e.into_response(),
    };

    let mut engine = state.engine.lock().await;
    let result = match batch_type {
        BatchType::Mint => engine.instant_mint(req.account, req.amount, req.max_slippage_bps),
        BatchType::Redeem => engine.instant_redeem(req.account, req.amount, req.max_slippage_bps),
    };
    respond(result)
}

fn respond<T: Serialize>(result: Result<T, BatchError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Routes of the JSON API
pub fn routes<A, V>() -> Router<Arc<ApiState<A, V>>>
where
    A: ConversionAdapter + 'static,
    V: TokenCustody + 'static,
{
    Router::new()
        .route("/v1/batches/current/{batch_type}", get(current_batch_handler::<A, V>))
        .route("/v1/batches/{id}", get(batch_handler::<A, V>))
        .route(
            "/v1/batches/{id}/contributions/{account}",
            get(contribution_handler::<A, V>),
        )
        .route("/v1/accounts/{account}/batches", get(account_batches_handler::<A, V>))
        .route("/v1/deposits", post(deposit_handler::<A, V>))
        .route("/v1/withdrawals", post(withdraw_handler::<A, V>))
        .route("/v1/claims", post(claim_handler::<A, V>))
        .route("/v1/moves", post(move_handler::<A, V>))
        .route(
            "/v1/accounts/{account}/undelivered/{token}",
            get(undelivered_handler::<A, V>),
        )
        .route("/v1/deliveries", post(delivery_handler::<A, V>))
        .route("/v1/instant/{batch_type}", post(instant_handler::<A, V>))
        .route("/v1/process/{batch_type}", post(process_handler::<A, V>))
}
