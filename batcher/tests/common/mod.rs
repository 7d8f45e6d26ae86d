//! Common test utilities for integration tests

#![allow(dead_code)]

pub mod mock_coordinator;
pub mod scripted_adapter;

pub use mock_coordinator::MockCoordinator;
pub use scripted_adapter::ScriptedAdapter;
