//! Mock incentive coordinator for integration testing
//!
//! Wiremock-based server that records keeper incentive accruals.

use std::sync::{Arc, RwLock};

use batch_engine::ProcessedBatch;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Mock coordinator state
#[derive(Debug, Default)]
pub struct MockCoordinatorState {
    /// Accruals accepted
    pub accruals: Vec<ProcessedBatch>,
    /// Requests received, including rejected ones
    pub requests: usize,
    /// Requests to reject with 503 before accepting
    pub fail_first: usize,
}

/// Mock incentive coordinator server
pub struct MockCoordinator {
    server: MockServer,
    state: Arc<RwLock<MockCoordinatorState>>,
}

impl MockCoordinator {
    /// Start a new mock coordinator
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(RwLock::new(MockCoordinatorState::default()));

        Self { server, state }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Reject the next `count` accrual requests
    pub fn fail_first(&self, count: usize) {
        self.state.write().unwrap().fail_first = count;
    }

    /// Accruals accepted so far
    pub fn accruals(&self) -> Vec<ProcessedBatch> {
        self.state.read().unwrap().accruals.clone()
    }

    /// Accrual requests received so far
    pub fn request_count(&self) -> usize {
        self.state.read().unwrap().requests
    }

    /// Set up mock for POST /v1/incentives/accrue
    pub async fn mock_accrue(&self) {
        let state = Arc::clone(&self.state);

        Mock::given(method("POST"))
            .and(path("/v1/incentives/accrue"))
            .respond_with(move |req: &wiremock::Request| {
                let mut state = state.write().unwrap();
                state.requests += 1;

                if state.fail_first > 0 {
                    state.fail_first -= 1;
                    return ResponseTemplate::new(503);
                }

                let processed: ProcessedBatch = match req.body_json() {
                    Ok(p) => p,
                    Err(_) => return ResponseTemplate::new(400),
                };
                state.accruals.push(processed);

                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" }))
            })
            .mount(&self.server)
            .await;
    }

    /// Set up mock for GET /health
    pub async fn mock_health(&self) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Set up all standard mocks
    pub async fn setup_standard_mocks(&self) {
        self.mock_accrue().await;
        self.mock_health().await;
    }
}
