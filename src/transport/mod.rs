// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transport layer: how a composed [`Request`] reaches the backend.
//!
//! Two modes, selected once from configuration:
//!
//! ```text
//! Direct                          Queue relay
//! ──────                          ───────────
//! submit_batch ──► Response       handoff 1: begin → send(request queue) → commit
//!   │ fail                        handoff 2: begin → receive(response queue) → commit
//!   ▼                                  │ any failure
//! sleep(delay), retry ≤ N             ▼
//!   │ exhausted                   abort handoff, log, Ok(None)
//!   ▼
//! Err(Transport)
//! ```
//!
//! There is no fallback from one mode to the other.
//!
//! The collaborators ([`RemoteService`], [`MessageQueue`]) are traits so the
//! generated RPC proxy and the real queue system stay outside this crate.

pub mod queue;
pub mod remote;

use crate::config::QueueRelayConfig;
use crate::error::{OutboxError, Result};
use crate::metrics;
use crate::protocol::{Request, Response};
use crate::resilience::{retry, RetryConfig};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

pub use queue::{HandoffId, InMemoryQueue, MessageQueue};
pub use remote::{Endpoint, NoOpRemote, RemoteService};

/// Result type for collaborator operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Failure reported by a transport collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Endpoint or broker not reachable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The peer answered with something we cannot use.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No answer within the allowed time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The named queue does not exist.
    #[error("queue not found: {0}")]
    QueueNotFound(String),
}

/// Send `request` directly, retrying per `retry_config`.
///
/// Every attempt is bounded by `endpoint.timeout`. The last failure is
/// surfaced as [`OutboxError::Transport`].
pub(crate) async fn send_direct<R>(
    remote: &R,
    request: &Request,
    endpoint: &Endpoint,
    retry_config: &RetryConfig,
) -> Result<Response>
where
    R: RemoteService + ?Sized,
{
    let start = Instant::now();
    let result = retry(retry_config, "submit_batch", |attempt| async move {
        debug!(attempt, url = %endpoint.url, "Submitting batch");
        let outcome = match tokio::time::timeout(
            endpoint.timeout,
            remote.submit_batch(request, endpoint),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(endpoint.timeout)),
        };
        metrics::record_send_attempt("direct", outcome.is_ok());
        outcome
    })
    .await;
    metrics::record_send_latency("direct", start.elapsed());

    result.map_err(|e| OutboxError::Transport {
        operation: "submit_batch".to_string(),
        message: e.to_string(),
        source: Some(e),
    })
}

/// Relay `request` through the queue pair and wait for the response.
///
/// Never fails: any error aborts the open handoff, is logged, and yields
/// `None` ("no response this cycle").
pub(crate) async fn send_via_queue<Q>(
    queue: &Q,
    request: &Request,
    config: &QueueRelayConfig,
) -> Option<Response>
where
    Q: MessageQueue + ?Sized,
{
    let start = Instant::now();
    let result = relay(queue, request, config).await;
    metrics::record_send_latency("queue_relay", start.elapsed());

    match result {
        Ok(response) => {
            metrics::record_send_attempt("queue_relay", true);
            Some(response)
        }
        Err(OutboxError::Timeout { operation, timeout }) => {
            metrics::record_queue_timeout(&config.response_queue);
            metrics::record_send_attempt("queue_relay", false);
            warn!(
                operation = %operation,
                queue = %config.response_queue,
                timeout_ms = timeout.as_millis() as u64,
                "No response this cycle"
            );
            None
        }
        Err(e) => {
            metrics::record_send_attempt("queue_relay", false);
            error!(error = %e, "Queue relay failed, no response this cycle");
            None
        }
    }
}

async fn relay<Q>(queue: &Q, request: &Request, config: &QueueRelayConfig) -> Result<Response>
where
    Q: MessageQueue + ?Sized,
{
    let body = serde_json::to_string(request)
        .map_err(|e| OutboxError::transport_msg("serialize_request", e.to_string()))?;

    // Handoff 1: publish the request.
    let handoff = queue
        .begin_handoff()
        .await
        .map_err(|e| OutboxError::transport("begin_handoff", e))?;
    let sent = queue
        .send(handoff, &config.request_queue, body)
        .await
        .map_err(|e| OutboxError::transport("send", e));
    finish_handoff(queue, handoff, sent).await?;
    debug!(queue = %config.request_queue, %handoff, "Request handed off");

    // Handoff 2: collect the response.
    let timeout = config.receive_timeout_duration();
    let handoff = queue
        .begin_handoff()
        .await
        .map_err(|e| OutboxError::transport("begin_handoff", e))?;
    let received = match tokio::time::timeout(
        timeout,
        queue.receive(handoff, &config.response_queue, timeout),
    )
    .await
    {
        Ok(outcome) => outcome.map_err(|e| OutboxError::transport("receive", e)),
        Err(_) => Err(OutboxError::Timeout {
            operation: "receive".to_string(),
            timeout,
        }),
    };
    let body = finish_handoff(queue, handoff, received).await?;
    debug!(queue = %config.response_queue, %handoff, bytes = body.len(), "Response received");

    // The handoff is already committed, so a body that does not parse is gone.
    serde_json::from_str(&body).map_err(|e| {
        warn!(
            queue = %config.response_queue,
            %handoff,
            bytes = body.len(),
            error = %e,
            "Discarding unparseable response"
        );
        OutboxError::transport_msg("parse_response", e.to_string())
    })
}

/// Commit on success, abort on failure (or when the commit itself fails).
async fn finish_handoff<Q, T>(queue: &Q, handoff: HandoffId, result: Result<T>) -> Result<T>
where
    Q: MessageQueue + ?Sized,
{
    match result {
        Ok(value) => match queue.commit_handoff(handoff).await {
            Ok(()) => Ok(value),
            Err(e) => {
                abort_quietly(queue, handoff).await;
                Err(OutboxError::transport("commit_handoff", e))
            }
        },
        Err(e) => {
            abort_quietly(queue, handoff).await;
            Err(e)
        }
    }
}

async fn abort_quietly<Q>(queue: &Q, handoff: HandoffId)
where
    Q: MessageQueue + ?Sized,
{
    if let Err(e) = queue.abort_handoff(handoff).await {
        warn!(%handoff, error = %e, "Failed to abort handoff");
    }
}
