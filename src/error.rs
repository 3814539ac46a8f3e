// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the outbox.
//!
//! Errors are categorized by where they come from (caller misuse, broken
//! internal invariants, the transport) and carry enough context to log them
//! without extra bookkeeping.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Transport` | Yes | RPC or message queue failure |
//! | `Timeout` | Yes | Queue receive gave up waiting |
//! | `IllegalState` | No | Transaction begin/commit/rollback misuse |
//! | `ArgumentMismatch` | No | Participant and address lists differ in length |
//! | `MalformedAccumulator` | No | Pending queue is corrupt (fatal) |
//! | `Config` | No | Configuration invalid |
//!
//! # Retry Behavior
//!
//! [`OutboxError::is_retryable()`] tells whether the send cycle may try
//! again. [`OutboxError::is_fatal()`] marks the one error the client must
//! never recover from: a broken accumulator invariant.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;

/// Errors that can occur while queueing, composing or sending a batch.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Transaction control called in the wrong state.
    ///
    /// e.g. `commit_transaction()` with no open transaction, or a second
    /// `begin_transaction()` before the first one is closed.
    #[error("Illegal state: expected {expected}, got {actual}")]
    IllegalState { expected: String, actual: String },

    /// Participant names and device addresses have different lengths.
    ///
    /// Raised by the multi-participant movelet set constructor before
    /// anything is enqueued.
    #[error("Argument mismatch: {participants} participant names but {addresses} device addresses")]
    ArgumentMismatch { participants: usize, addresses: usize },

    /// The pending queue holds something the public API can never produce.
    ///
    /// Signals a programming error. Never retried, never recovered.
    #[error("Malformed accumulator: {0}")]
    MalformedAccumulator(String),

    /// Network or queue failure while talking to the backend.
    #[error("Transport error ({operation}): {message}")]
    Transport {
        operation: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// Queue receive did not produce a message in time.
    #[error("Timed out after {timeout:?} waiting for {operation}")]
    Timeout { operation: String, timeout: Duration },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OutboxError {
    /// Create a transport error from a collaborator failure.
    pub fn transport(operation: impl Into<String>, source: TransportError) -> Self {
        match source {
            TransportError::Timeout(timeout) => Self::Timeout {
                operation: operation.into(),
                timeout,
            },
            source => Self::Transport {
                operation: operation.into(),
                message: source.to_string(),
                source: Some(source),
            },
        }
    }

    /// Create a transport error without source.
    pub fn transport_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Transaction misuse error.
    pub(crate) fn illegal_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IllegalState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Timeout { .. } => true,
            Self::IllegalState { .. } => false,
            Self::ArgumentMismatch { .. } => false,
            Self::MalformedAccumulator(_) => false,
            Self::Config(_) => false,
        }
    }

    /// Check if this error means the client state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedAccumulator(_))
    }
}

impl From<TransportError> for OutboxError {
    fn from(e: TransportError) -> Self {
        Self::transport("unknown", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_transport() {
        let err = OutboxError::transport_msg("submit_batch", "connection reset");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("submit_batch"));
    }

    #[test]
    fn test_transport_timeout_maps_to_timeout() {
        let err = OutboxError::transport("receive", TransportError::Timeout(Duration::from_secs(10)));
        assert!(matches!(err, OutboxError::Timeout { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_transport_keeps_source() {
        let err = OutboxError::transport(
            "send",
            TransportError::QueueNotFound("requests".to_string()),
        );
        match err {
            OutboxError::Transport { source, message, .. } => {
                assert!(source.is_some());
                assert!(message.contains("requests"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_retryable_illegal_state() {
        let err = OutboxError::illegal_state("open transaction", "no transaction");
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("open transaction"));
    }

    #[test]
    fn test_not_retryable_argument_mismatch() {
        let err = OutboxError::ArgumentMismatch {
            participants: 2,
            addresses: 3,
        };
        assert!(!err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_malformed_accumulator_is_fatal() {
        let err = OutboxError::MalformedAccumulator("group nesting too deep".to_string());
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_retryable_config() {
        let err = OutboxError::Config("missing request queue".to_string());
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_from_transport_error() {
        let err: OutboxError = TransportError::Unavailable("dns".to_string()).into();
        assert!(err.to_string().contains("unknown"));
        assert!(err.is_retryable());
    }
}
