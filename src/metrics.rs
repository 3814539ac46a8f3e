// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Enqueued operations and open transactions
//! - Composed requests, per operation kind
//! - Send attempts and latency per transport mode
//! - Recovery (requeue) and dropped batches
//! - Response ingestion
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `outbox_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! # Usage
//!
//! ```rust,no_run
//! use movilizer_outbox::metrics;
//! use std::time::Duration;
//!
//! metrics::record_send_attempt("direct", false);
//! metrics::record_send_latency("direct", Duration::from_millis(120));
//! ```

use crate::model::OperationKind;
use crate::protocol::Request;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one operation accepted by the enqueue API.
pub fn record_operation_enqueued(kind: OperationKind) {
    counter!("outbox_operations_enqueued_total", "kind" => kind.as_str()).increment(1);
}

/// Record a transaction lifecycle event ("begin", "commit", "rollback").
pub fn record_transaction(event: &'static str) {
    counter!("outbox_transactions_total", "event" => event).increment(1);
}

/// Record a composed request, broken down by operation kind.
pub fn record_compose(request: &Request) {
    counter!("outbox_requests_composed_total").increment(1);
    let per_kind = [
        (OperationKind::MoveletSet, request.movelet_sets.len()),
        (OperationKind::MoveletAssignment, request.movelet_assignments.len()),
        (
            OperationKind::MoveletAssignmentDelete,
            request.movelet_assignment_deletes.len(),
        ),
        (OperationKind::MoveletDelete, request.movelet_deletes.len()),
        (
            OperationKind::MasterdataPoolUpdate,
            request.masterdata_pool_updates.len(),
        ),
        (
            OperationKind::DocumentPoolUpdate,
            request.document_pool_updates.len(),
        ),
        (OperationKind::ParticipantReset, request.participant_resets.len()),
    ];
    for (kind, count) in per_kind {
        if count > 0 {
            counter!("outbox_operations_composed_total", "kind" => kind.as_str())
                .increment(count as u64);
        }
    }
    histogram!("outbox_request_operations").record(request.operation_count() as f64);
}

/// Record one send attempt.
pub fn record_send_attempt(mode: &'static str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("outbox_send_attempts_total", "mode" => mode, "status" => status).increment(1);
}

/// Record the wall time of a whole send (all attempts).
pub fn record_send_latency(mode: &'static str, duration: Duration) {
    histogram!("outbox_send_duration_seconds", "mode" => mode).record(duration.as_secs_f64());
}

/// Record a queue receive that timed out.
pub fn record_queue_timeout(queue: &str) {
    counter!("outbox_queue_timeouts_total", "queue" => queue.to_string()).increment(1);
}

/// Record a failed batch put back for the next compose.
pub fn record_requeue(operations: usize) {
    counter!("outbox_requeues_total").increment(1);
    counter!("outbox_requeued_operations_total").increment(operations as u64);
}

/// Record a failed batch discarded without recovery.
pub fn record_batch_dropped(operations: usize) {
    counter!("outbox_batches_dropped_total").increment(1);
    counter!("outbox_dropped_operations_total").increment(operations as u64);
}

/// Record an ingested response.
pub fn record_response(reply_objects: usize, status_messages: usize, movelet_errors: usize) {
    counter!("outbox_responses_total").increment(1);
    counter!("outbox_reply_objects_total").increment(reply_objects as u64);
    counter!("outbox_status_messages_total").increment(status_messages as u64);
    counter!("outbox_movelet_errors_total").increment(movelet_errors as u64);
}

/// Set the number of operations waiting for the next compose.
pub fn set_pending_operations(count: usize) {
    gauge!("outbox_pending_operations").set(count as f64);
}

/// Set the number of reply objects waiting to be dequeued.
pub fn set_inbound_depth(depth: usize) {
    gauge!("outbox_inbound_depth").set(depth as f64);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
