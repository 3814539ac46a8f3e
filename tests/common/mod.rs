//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Mock RemoteService that records requests and fails on demand
//! - Mock MessageQueue with per-operation failure injection
//! - Mock EventLog that records call order
//! - Config presets for both transport modes

pub mod mock_transport;

pub use mock_transport::*;
