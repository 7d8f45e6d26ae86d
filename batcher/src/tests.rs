//! Unit tests for keeper components

#[cfg(test)]
mod config_tests {
    use crate::config::BatcherConfig;
    use alloy_primitives::{Address, U256};
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    const INPUT: &str = "0x1111111111111111111111111111111111111111";
    const PRODUCT: &str = "0x2222222222222222222222222222222222222222";

    fn clear_env_vars() {
        for key in [
            "INPUT_TOKEN_ADDRESS",
            "PRODUCT_TOKEN_ADDRESS",
            "KEEPER_ADDRESS",
            "BATCH_COOLDOWN_SECS",
            "MINT_THRESHOLD",
            "REDEEM_THRESHOLD",
            "MINT_SLIPPAGE_BPS",
            "REDEEM_SLIPPAGE_BPS",
            "INSTANT_MAX_SLIPPAGE_BPS",
            "REDEMPTION_FEE_BPS",
            "FEE_RECIPIENT",
            "MINT_PRICE",
            "REDEEM_PRICE",
            "POLL_INTERVAL_SECS",
            "HTTP_PORT",
            "INCENTIVE_COORDINATOR_URL",
            "MAX_RETRIES",
            "BATCHER_POLL_INTERVAL_SECS",
        ] {
            env::remove_var(key);
        }
    }

    fn set_required() {
        env::set_var("INPUT_TOKEN_ADDRESS", INPUT);
        env::set_var("PRODUCT_TOKEN_ADDRESS", PRODUCT);
    }

    #[test]
    #[serial]
    fn test_config_from_env_required_fields() {
        clear_env_vars();

        let result = BatcherConfig::from_env();
        assert!(result.is_err());

        env::set_var("INPUT_TOKEN_ADDRESS", INPUT);
        let result = BatcherConfig::from_env();
        assert!(result.is_err()); // Still missing PRODUCT_TOKEN_ADDRESS

        env::set_var("PRODUCT_TOKEN_ADDRESS", PRODUCT);
        let result = BatcherConfig::from_env();
        assert!(result.is_ok());

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env_vars();
        set_required();

        let config = BatcherConfig::from_env().unwrap();

        assert_eq!(config.batch_cooldown_secs, 1_800);
        assert_eq!(config.mint_slippage_bps, 7);
        assert_eq!(config.redeem_slippage_bps, 7);
        assert_eq!(config.instant_max_slippage_bps, 100);
        assert_eq!(config.redemption_fee_bps, 0);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.http_port, 9090);
        assert!(config.incentive_coordinator_url.is_none());
        assert!(config.validate().is_ok());

        let settings = config.engine_settings().unwrap();
        assert_eq!(settings.tokens.input_token, INPUT.parse::<Address>().unwrap());
        assert_eq!(
            settings.thresholds.mint_threshold,
            U256::from(1_000u64) * U256::from(10u64).pow(U256::from(18))
        );

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_custom_values() {
        clear_env_vars();
        set_required();
        env::set_var("BATCH_COOLDOWN_SECS", "600");
        env::set_var("MINT_THRESHOLD", "5000");
        env::set_var("REDEEM_THRESHOLD", "0x10");
        env::set_var("REDEMPTION_FEE_BPS", "25");
        env::set_var("FEE_RECIPIENT", "0x3333333333333333333333333333333333333333");
        env::set_var("POLL_INTERVAL_SECS", "5");
        env::set_var("HTTP_PORT", "8080");
        env::set_var("INCENTIVE_COORDINATOR_URL", "http://coordinator:4000");

        let config = BatcherConfig::from_env().unwrap();
        assert!(config.validate().is_ok());

        let settings = config.engine_settings().unwrap();
        assert_eq!(settings.thresholds.cooldown_secs, 600);
        assert_eq!(settings.thresholds.mint_threshold, U256::from(5_000));
        assert_eq!(settings.thresholds.redeem_threshold, U256::from(16));
        assert_eq!(settings.redemption_fee.rate_bps, 25);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.http_port, 8080);
        assert_eq!(
            config.incentive_coordinator_url.as_deref(),
            Some("http://coordinator:4000")
        );

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_validation_failures() {
        clear_env_vars();
        set_required();

        env::set_var("REDEMPTION_FEE_BPS", "101");
        env::set_var("FEE_RECIPIENT", "0x3333333333333333333333333333333333333333");
        assert!(BatcherConfig::from_env().unwrap().validate().is_err());
        env::remove_var("REDEMPTION_FEE_BPS");

        env::set_var("MINT_SLIPPAGE_BPS", "201");
        assert!(BatcherConfig::from_env().unwrap().validate().is_err());
        env::remove_var("MINT_SLIPPAGE_BPS");

        env::set_var("PRODUCT_TOKEN_ADDRESS", "not-an-address");
        assert!(BatcherConfig::from_env().unwrap().validate().is_err());
        env::set_var("PRODUCT_TOKEN_ADDRESS", INPUT);
        assert!(BatcherConfig::from_env().unwrap().validate().is_err());
        env::set_var("PRODUCT_TOKEN_ADDRESS", PRODUCT);

        env::set_var("MINT_PRICE", "0");
        assert!(BatcherConfig::from_env().unwrap().validate().is_err());
        env::remove_var("MINT_PRICE");

        env::set_var("INCENTIVE_COORDINATOR_URL", "coordinator:4000");
        assert!(BatcherConfig::from_env().unwrap().validate().is_err());

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_from_file_with_env_overlay() {
        clear_env_vars();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
input_token_address = "{INPUT}"
product_token_address = "{PRODUCT}"
batch_cooldown_secs = 900
mint_threshold = "250"
poll_interval_secs = 10
"#
        )
        .unwrap();

        let config = BatcherConfig::from_file(file.path()).unwrap();
        assert_eq!(config.batch_cooldown_secs, 900);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.http_port, 9090);
        assert_eq!(
            config.engine_settings().unwrap().thresholds.mint_threshold,
            U256::from(250)
        );

        env::set_var("BATCHER_POLL_INTERVAL_SECS", "3");
        let config = BatcherConfig::from_file(file.path()).unwrap();
        assert_eq!(config.poll_interval_secs, 3);

        clear_env_vars();
    }
}

#[cfg(test)]
mod types_tests {
    use crate::types::{BatchId, BatchThresholds, BatchType, ContributionReceipt, KeeperStats};
    use alloy_primitives::{Address, U256};

    #[test]
    fn test_contribution_receipt_serialization() {
        let receipt = ContributionReceipt {
            batch_id: BatchId::new(BatchType::Mint, 2),
            account: Address::repeat_byte(0xa1),
            amount: U256::from(50),
            contribution: U256::from(80),
            batch_total: U256::from(200),
        };

        let json = serde_json::to_string(&receipt).unwrap();
        assert!(json.contains("\"mint-2\""));

        let deserialized: ContributionReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(receipt, deserialized);
    }

    #[test]
    fn test_batch_type_serialization() {
        assert_eq!(serde_json::to_string(&BatchType::Redeem).unwrap(), "\"redeem\"");
        assert_eq!("mint".parse::<BatchType>().unwrap(), BatchType::Mint);
    }

    #[test]
    fn test_thresholds_per_type() {
        let thresholds = BatchThresholds {
            cooldown_secs: 60,
            mint_threshold: U256::from(1),
            redeem_threshold: U256::from(2),
        };
        assert_eq!(thresholds.size_threshold(BatchType::Mint), U256::from(1));
        assert_eq!(thresholds.size_threshold(BatchType::Redeem), U256::from(2));
    }

    #[test]
    fn test_keeper_stats_default() {
        let stats = KeeperStats::default();

        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.total_failed, 0);
        assert!(stats.last_processed_at.is_none());
        assert!(stats.last_cycle_at.is_none());
    }
}

#[cfg(test)]
mod service_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use alloy_primitives::{Address, U256};
    use chrono::Utc;
    use tokio::sync::Mutex;

    use crate::adapter::{ConversionAdapter, InMemoryCustody, ManualClock, StaticRateAdapter};
    use crate::engine::{BatchEngine, EngineSettings, RedemptionFee};
    use crate::error::AdapterError;
    use crate::incentives::NoopIncentives;
    use crate::service::{CycleOutcome, KeeperService, SharedEngine};
    use crate::slippage::{SlippageGuard, PRICE_SCALE};
    use crate::types::{BatchThresholds, BatchType, CircuitBreaker, CircuitBreakerState, TokenPair};

    const ALICE: Address = Address::repeat_byte(0xa1);
    const KEEPER: Address = Address::repeat_byte(0x4b);

    fn settings() -> EngineSettings {
        EngineSettings {
            tokens: TokenPair {
                input_token: Address::repeat_byte(0x11),
                product_token: Address::repeat_byte(0x22),
            },
            thresholds: BatchThresholds {
                cooldown_secs: 60,
                mint_threshold: U256::from(100),
                redeem_threshold: U256::from(100),
            },
            slippage: SlippageGuard::default(),
            redemption_fee: RedemptionFee::default(),
        }
    }

    fn shared<A: ConversionAdapter + 'static>(adapter: A, clock: Arc<ManualClock>) -> SharedEngine<A, InMemoryCustody> {
        let engine = BatchEngine::with_parts(
            settings(),
            adapter,
            InMemoryCustody::open(),
            Box::new(NoopIncentives),
            clock,
        )
        .unwrap();
        Arc::new(Mutex::new(engine))
    }

    /// Adapter quoting a zero reference price
    struct ZeroPriceAdapter;

    impl ConversionAdapter for ZeroPriceAdapter {
        fn reference_price(&self, _batch_type: BatchType) -> Result<U256, AdapterError> {
            Ok(U256::ZERO)
        }

        fn convert(&mut self, _batch_type: BatchType, input_amount: U256) -> Result<U256, AdapterError> {
            Ok(input_amount)
        }
    }

    #[tokio::test]
    async fn test_cycle_skips_empty_and_young_batches_then_processes() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = shared(StaticRateAdapter::new(PRICE_SCALE, PRICE_SCALE), clock.clone());
        let service = KeeperService::new(Arc::clone(&engine), KEEPER, Duration::from_secs(1));

        let outcomes = service.run_cycle().await;
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, CycleOutcome::Skipped { reason: "empty batch", .. })));

        engine.lock().await.deposit_for_mint(U256::from(50), ALICE).unwrap();
        let outcomes = service.run_cycle().await;
        assert_eq!(
            outcomes[0],
            CycleOutcome::Skipped {
                batch_type: BatchType::Mint,
                reason: "awaiting threshold"
            }
        );

        clock.advance_secs(60);
        let outcomes = service.run_cycle().await;
        match &outcomes[0] {
            CycleOutcome::Processed(processed) => {
                assert_eq!(processed.keeper, KEEPER);
                assert_eq!(processed.output, U256::from(50));
            }
            other => panic!("expected processed batch, got {other:?}"),
        }

        let stats = service.stats().await;
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.total_cycles, 3);
        assert!(stats.last_cycle_at.is_some());
        assert_eq!(engine.lock().await.current_open_batch(BatchType::Mint).index(), 1);
    }

    #[tokio::test]
    async fn test_slippage_rejection_is_retried_next_cycle() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = shared(
            StaticRateAdapter::new(PRICE_SCALE, PRICE_SCALE).with_haircut(50),
            clock.clone(),
        );
        let service = KeeperService::new(Arc::clone(&engine), KEEPER, Duration::from_secs(1))
            .with_circuit_breaker(CircuitBreaker::new(1, 60, 1));

        engine.lock().await.deposit_for_mint(U256::from(1_000), ALICE).unwrap();
        let outcomes = service.run_cycle().await;
        assert!(matches!(outcomes[0], CycleOutcome::Failed { .. }));

        let stats = service.stats().await;
        assert_eq!(stats.total_slippage_rejections, 1);
        assert_eq!(stats.circuit_breaker_state, CircuitBreakerState::Closed);

        engine.lock().await.adapter_mut().set_haircut(0);
        let outcomes = service.run_cycle().await;
        assert!(matches!(outcomes[0], CycleOutcome::Processed(_)));
    }

    #[tokio::test]
    async fn test_non_retryable_failures_open_circuit_breaker() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = shared(ZeroPriceAdapter, clock.clone());
        let service = KeeperService::new(Arc::clone(&engine), KEEPER, Duration::from_secs(1))
            .with_circuit_breaker(CircuitBreaker::new(2, 30, 1));

        engine.lock().await.deposit_for_mint(U256::from(1_000), ALICE).unwrap();
        service.run_cycle().await;
        assert_eq!(service.stats().await.circuit_breaker_state, CircuitBreakerState::Closed);
        service.run_cycle().await;
        assert_eq!(service.stats().await.circuit_breaker_state, CircuitBreakerState::Open);

        assert_eq!(service.run_cycle().await, vec![CycleOutcome::CircuitOpen]);
        assert_eq!(service.stats().await.circuit_breaker_open_skips, 1);

        clock.advance_secs(30);
        let outcomes = service.run_cycle().await;
        assert!(matches!(outcomes[0], CycleOutcome::Failed { .. }));
        assert_eq!(service.stats().await.circuit_breaker_state, CircuitBreakerState::Open);
    }

    #[tokio::test]
    async fn test_paused_engine_is_skipped() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = shared(StaticRateAdapter::new(PRICE_SCALE, PRICE_SCALE), clock);
        let service = KeeperService::new(Arc::clone(&engine), KEEPER, Duration::from_secs(1));

        engine.lock().await.deposit_for_mint(U256::from(1_000), ALICE).unwrap();
        engine.lock().await.pause();

        let outcomes = service.run_cycle().await;
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, CycleOutcome::Skipped { reason: "engine paused", .. })));
        assert_eq!(service.stats().await.total_failed, 0);
    }
}

#[cfg(test)]
mod api_tests {
    use std::sync::Arc;

    use alloy_primitives::{Address, U256};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tokio::sync::{Mutex, RwLock};
    use tower::ServiceExt;

    use crate::adapter::{InMemoryCustody, StaticRateAdapter};
    use crate::api::{AccountBatchesResponse, ContributionResponse, ErrorResponse, UndeliveredResponse};
    use crate::engine::{BatchEngine, EngineSettings, RedemptionFee};
    use crate::health::{create_router, ApiState};
    use crate::slippage::{SlippageGuard, PRICE_SCALE};
    use crate::types::{
        Batch, BatchId, BatchThresholds, BatchType, ClaimReceipt, ContributionReceipt,
        InstantReceipt, KeeperStats, ProcessedBatch, TokenPair,
    };

    const ALICE: Address = Address::repeat_byte(0xa1);
    const KEEPER: Address = Address::repeat_byte(0x4b);

    type TestState = Arc<ApiState<StaticRateAdapter, InMemoryCustody>>;

    fn build_state() -> TestState {
        let engine = BatchEngine::new(
            EngineSettings {
                tokens: TokenPair {
                    input_token: Address::repeat_byte(0x11),
                    product_token: Address::repeat_byte(0x22),
                },
                thresholds: BatchThresholds {
                    cooldown_secs: 3_600,
                    mint_threshold: U256::from(100),
                    redeem_threshold: U256::from(100),
                },
                slippage: SlippageGuard::default(),
                redemption_fee: RedemptionFee::default(),
            },
            StaticRateAdapter::new(U256::from(2) * PRICE_SCALE, PRICE_SCALE / U256::from(2)),
            InMemoryCustody::open(),
        )
        .unwrap();

        Arc::new(ApiState::new(
            Arc::new(Mutex::new(engine)),
            Arc::new(RwLock::new(KeeperStats::default())),
            30,
        ))
    }

    async fn call(state: &TestState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = create_router(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_deposit_then_read_back() {
        let state = build_state();

        let (status, body) = call(
            &state,
            "POST",
            "/v1/deposits",
            Some(json!({ "batch_type": "mint", "account": ALICE, "amount": U256::from(60) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: ContributionReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(receipt.batch_id, BatchId::new(BatchType::Mint, 0));

        let (status, body) = call(&state, "GET", "/v1/batches/current/mint", None).await;
        assert_eq!(status, StatusCode::OK);
        let batch: Batch = serde_json::from_slice(&body).unwrap();
        assert_eq!(batch.supplied_token_total, U256::from(60));

        let (status, body) = call(
            &state,
            "GET",
            &format!("/v1/batches/mint-0/contributions/{ALICE}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let contribution: ContributionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(contribution.amount, U256::from(60));

        let (_, body) = call(&state, "GET", &format!("/v1/accounts/{ALICE}/batches"), None).await;
        let batches: AccountBatchesResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(batches.batch_ids, vec![BatchId::new(BatchType::Mint, 0)]);
    }

    #[tokio::test]
    async fn test_withdraw_and_claim_flow() {
        let state = build_state();
        call(
            &state,
            "POST",
            "/v1/deposits",
            Some(json!({ "batch_type": "mint", "account": ALICE, "amount": U256::from(150) })),
        )
        .await;

        let (status, body) = call(
            &state,
            "POST",
            "/v1/withdrawals",
            Some(json!({ "batch_id": "mint-0", "account": ALICE, "amount": U256::from(50) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: ContributionReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(receipt.contribution, U256::from(100));

        // claiming an open batch is a caller error
        let (status, body) = call(
            &state,
            "POST",
            "/v1/claims",
            Some(json!({ "batch_id": "mint-0", "account": ALICE })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_code, "INVALID_BATCH");

        state.engine.lock().await.process(BatchType::Mint, KEEPER).unwrap();

        let (status, body) = call(
            &state,
            "POST",
            "/v1/claims",
            Some(json!({ "batch_id": "mint-0", "account": ALICE })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let claim: ClaimReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(claim.amount, U256::from(200));
    }

    #[tokio::test]
    async fn test_instant_endpoint_enforces_tolerance() {
        let state = build_state();

        let (status, body) = call(
            &state,
            "POST",
            "/v1/instant/redeem",
            Some(json!({ "account": ALICE, "amount": U256::from(1_000), "max_slippage_bps": 500 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_code, "TOLERANCE_TOO_HIGH");

        let (status, body) = call(
            &state,
            "POST",
            "/v1/instant/redeem",
            Some(json!({ "account": ALICE, "amount": U256::from(1_000), "max_slippage_bps": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: InstantReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(receipt.output, U256::from(500));
    }

    #[tokio::test]
    async fn test_process_endpoint_is_permissionless() {
        let state = build_state();
        let deposit = |amount: u64| json!({ "batch_type": "mint", "account": ALICE, "amount": U256::from(amount) });

        call(&state, "POST", "/v1/deposits", Some(deposit(40))).await;
        let (status, body) = call(&state, "POST", "/v1/process/mint", Some(json!({ "keeper": KEEPER }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_code, "NOT_ELIGIBLE");

        call(&state, "POST", "/v1/deposits", Some(deposit(60))).await;
        let (status, body) = call(&state, "POST", "/v1/process/mint", Some(json!({ "keeper": KEEPER }))).await;
        assert_eq!(status, StatusCode::OK);
        let processed: ProcessedBatch = serde_json::from_slice(&body).unwrap();
        assert_eq!(processed.batch_id, BatchId::new(BatchType::Mint, 0));
        assert_eq!(processed.keeper, KEEPER);
        assert_eq!(processed.output, U256::from(200));

        let (status, _) = call(&state, "POST", "/v1/process/burn", Some(json!({ "keeper": KEEPER }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_undelivered_output_read_back() {
        let state = build_state();
        let product = Address::repeat_byte(0x22);

        let (status, body) = call(
            &state,
            "GET",
            &format!("/v1/accounts/{ALICE}/undelivered/{product}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let undelivered: UndeliveredResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(undelivered.amount, U256::ZERO);

        let (status, body) = call(
            &state,
            "POST",
            "/v1/deliveries",
            Some(json!({ "account": ALICE, "token": product })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_code, "NOTHING_UNDELIVERED");
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_batches() {
        let state = build_state();

        let (status, body) = call(&state, "GET", "/v1/batches/redeem-9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_code, "UNKNOWN_BATCH");

        let (status, _) = call(&state, "GET", "/v1/batches/bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, "GET", "/v1/batches/current/burn", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_paused_engine_rejects_deposits() {
        let state = build_state();
        state.engine.lock().await.pause();

        let (status, body) = call(
            &state,
            "POST",
            "/v1/deposits",
            Some(json!({ "batch_type": "redeem", "account": ALICE, "amount": U256::from(1) })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_code, "PAUSED");
    }
}
