// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chaos tests: simulate failures and verify graceful degradation.
//!
//! These tests verify the client handles transport failures without panics,
//! lost operations or stuck handoffs.
//!
//! Run with: cargo test --test chaos_tests -- --nocapture

mod common;

use common::{
    direct_config, relay_config, MockQueue, MockRemote, QueueFault, REQUEST_QUEUE, RESPONSE_QUEUE,
};
use movilizer_outbox::config::{DirectRetryConfig, QueueRelayConfig, DEBUG_REQUEST_FILE};
use movilizer_outbox::protocol::ReplyMovelet;
use movilizer_outbox::{OutboxClient, OutboxConfig, OutboxError, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn client_with(
    config: OutboxConfig,
    remote: MockRemote,
    queue: MockQueue,
) -> (OutboxClient<MockRemote, MockQueue>, Arc<MockRemote>, Arc<MockQueue>) {
    let remote = Arc::new(remote);
    let queue = Arc::new(queue);
    let client =
        OutboxClient::with_transports(config, Arc::clone(&remote), Arc::clone(&queue)).unwrap();
    (client, remote, queue)
}

// =============================================================================
// Direct Mode Retry
// =============================================================================

/// Test: 3 attempts take exactly 2 fixed waits
#[tokio::test(start_paused = true)]
async fn direct_retry_waits_twice_for_three_attempts() {
    let config = OutboxConfig {
        retry: DirectRetryConfig::default(),
        ..direct_config(true)
    };
    let (mut client, remote, _) = client_with(config, MockRemote::failing(), MockQueue::new());
    client.enqueue_participant_reset("+1");

    let start = tokio::time::Instant::now();
    let err = client.post_request().await.unwrap_err();

    assert!(err.is_retryable());
    assert!(!err.is_fatal());
    assert_eq!(remote.call_count(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

/// Test: repeated outages keep requeueing without duplicating operations
#[tokio::test]
async fn direct_repeated_outages_do_not_duplicate() {
    let (mut client, remote, _) = client_with(direct_config(true), MockRemote::failing(), MockQueue::new());

    client.enqueue_movelet_deletion("D1", None);
    for _ in 0..3 {
        assert!(matches!(
            client.post_request().await,
            Err(OutboxError::Transport { .. })
        ));
    }
    assert_eq!(remote.call_count(), 9);
    assert_eq!(client.pending_operations(), 1);

    remote.recover();
    client.post_request().await.unwrap();
    let last = remote.requests().await.pop().unwrap();
    assert_eq!(last.movelet_deletes.len(), 1);
    assert_eq!(client.pending_operations(), 0);
}

/// Test: a remote that never answers is cut off by the per-attempt timeout
#[tokio::test(start_paused = true)]
async fn direct_stalled_remote_times_out_each_attempt() {
    let (mut client, remote, _) =
        client_with(direct_config(true), MockRemote::stalled(), MockQueue::new());
    client.enqueue_participant_reset("+1");

    let start = tokio::time::Instant::now();
    let err = client.post_request().await.unwrap_err();

    // 3 attempts of 5 minutes plus 2 waits of 10ms
    assert!(matches!(err, OutboxError::Transport { .. }), "got {err:?}");
    assert_eq!(remote.call_count(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(900) + Duration::from_millis(20));
    assert_eq!(client.pending_operations(), 1);
}

/// Test: a disabled retry makes one attempt only
#[tokio::test]
async fn direct_retry_disabled_single_attempt() {
    let config = OutboxConfig {
        retry: DirectRetryConfig {
            enabled: false,
            ..DirectRetryConfig::for_testing()
        },
        ..direct_config(false)
    };
    let (mut client, remote, _) = client_with(config, MockRemote::failing(), MockQueue::new());
    assert!(client.post_request().await.is_err());
    assert_eq!(remote.call_count(), 1);
}

/// Test: a failed cycle keeps the previous ack key for the resend
#[tokio::test]
async fn direct_failure_keeps_ack_key() {
    let (mut client, remote, _) = client_with(direct_config(true), MockRemote::new(), MockQueue::new());
    remote.push_response(Response::acknowledged("k1")).await;
    client.post_request().await.unwrap();

    remote.start_failing();
    client.enqueue_participant_reset("+1");
    assert!(client.post_request().await.is_err());
    assert_eq!(client.acknowledge_key(), Some("k1"));

    remote.recover();
    client.post_request().await.unwrap();
    let last = remote.requests().await.pop().unwrap();
    assert_eq!(last.request_acknowledge_key.as_deref(), Some("k1"));
    assert_eq!(last.participant_resets.len(), 1);
}

// =============================================================================
// Queue Relay Failures
// =============================================================================

/// Test: each handoff failure yields "no response" and leaves no open handoff
#[tokio::test]
async fn relay_faults_yield_no_response() {
    let faults = [
        QueueFault::Begin,
        QueueFault::Send,
        QueueFault::Commit(1),
        QueueFault::Receive,
        QueueFault::Commit(2),
    ];

    for fault in faults {
        let (mut client, remote, queue) =
            client_with(relay_config(), MockRemote::new(), MockQueue::with_fault(fault));
        queue.respond(&Response::acknowledged("k")).await;
        client.enqueue_participant_reset("+1");

        let response = client.post_request().await;
        assert!(
            matches!(response, Ok(None)),
            "fault {fault:?} should yield Ok(None), got {response:?}"
        );
        assert_eq!(queue.open_handoffs().await, 0, "fault {fault:?} left a handoff open");
        assert_eq!(client.pending_operations(), 0, "fault {fault:?} requeued operations");
        assert_eq!(client.acknowledge_key(), None);
        assert_eq!(remote.call_count(), 0);
    }
}

/// Test: a receive that never completes is cut off by the receive timeout
#[tokio::test(start_paused = true)]
async fn relay_stalled_receive_yields_no_response() {
    let config = OutboxConfig {
        queue_relay: QueueRelayConfig::enabled(REQUEST_QUEUE, RESPONSE_QUEUE),
        ..direct_config(false)
    };
    let (mut client, _, queue) =
        client_with(config, MockRemote::new(), MockQueue::with_fault(QueueFault::StallReceive));
    client.enqueue_participant_reset("+1");

    let start = tokio::time::Instant::now();
    let response = client.post_request().await;

    assert!(matches!(response, Ok(None)), "got {response:?}");
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert_eq!(queue.open_handoffs().await, 0);
    assert_eq!(queue.depth(REQUEST_QUEUE).await, 1);
    assert_eq!(client.pending_operations(), 0);
}

/// Test: a failed request handoff publishes nothing
#[tokio::test]
async fn relay_request_handoff_fault_publishes_nothing() {
    let (mut client, _, queue) =
        client_with(relay_config(), MockRemote::new(), MockQueue::with_fault(QueueFault::Commit(1)));
    client.enqueue_participant_reset("+1");

    assert!(client.post_request().await.unwrap().is_none());
    assert_eq!(queue.depth(REQUEST_QUEUE).await, 0);
    assert!(queue.aborts() >= 1);
}

/// Test: an aborted receive returns the response for the next cycle
#[tokio::test]
async fn relay_aborted_receive_returns_message() {
    let (mut client, _, queue) =
        client_with(relay_config(), MockRemote::new(), MockQueue::with_fault(QueueFault::Commit(2)));
    queue
        .respond(&Response {
            reply_movelets: vec![ReplyMovelet::new("R1", "+1")],
            request_acknowledge_key: Some("k2".to_string()),
            ..Default::default()
        })
        .await;

    assert!(client.post_request().await.unwrap().is_none());
    assert_eq!(queue.depth(RESPONSE_QUEUE).await, 1);
    assert_eq!(client.inbound_len(), 0);

    queue.clear_fault();
    let response = client.post_request().await.unwrap().unwrap();
    assert_eq!(response.request_acknowledge_key.as_deref(), Some("k2"));
    assert_eq!(client.inbound_len(), 1);
}

/// Test: a late response is picked up on a later cycle
#[tokio::test]
async fn relay_late_response_picked_up_later() {
    let (mut client, _, queue) = client_with(relay_config(), MockRemote::new(), MockQueue::new());

    assert!(client.post_request().await.unwrap().is_none());
    queue.respond(&Response::acknowledged("late")).await;
    assert!(client.post_request().await.unwrap().is_some());
    assert_eq!(client.acknowledge_key(), Some("late"));
}

/// Test: garbage on the response queue is not fatal
#[tokio::test]
async fn relay_corrupted_response_no_panic() {
    let (mut client, _, queue) = client_with(relay_config(), MockRemote::new(), MockQueue::new());
    let bodies = ["", "{", "null", "[1,2,3]", "{\"reply_movelets\": 5}"];

    for body in bodies {
        queue.respond_raw(body).await;
        assert!(client.post_request().await.unwrap().is_none(), "body {body:?}");
        // Consumed, so the next cycle is not blocked by it
        assert_eq!(queue.depth(RESPONSE_QUEUE).await, 0, "body {body:?}");
        assert_eq!(queue.open_handoffs().await, 0);
    }
}

// =============================================================================
// Debug Dump
// =============================================================================

/// Test: the composed request is dumped before sending
#[tokio::test]
async fn debug_dump_written_when_configured() {
    let dir = tempdir().unwrap();
    let config = OutboxConfig {
        debug_output_path: Some(dir.path().to_path_buf()),
        ..direct_config(false)
    };
    let (mut client, _, _) = client_with(config, MockRemote::new(), MockQueue::new());
    client.enqueue_participant_reset("+1");
    client.post_request().await.unwrap();

    let dumped = std::fs::read_to_string(dir.path().join(DEBUG_REQUEST_FILE)).unwrap();
    let request: Request = serde_json::from_str(&dumped).unwrap();
    assert_eq!(request.participant_resets.len(), 1);
    assert_eq!(request.system_id, 4711);
    // Pretty printed
    assert!(dumped.contains('\n'));
}

/// Test: the dump is written even when the send then fails
#[tokio::test]
async fn debug_dump_written_before_failed_send() {
    let dir = tempdir().unwrap();
    let config = OutboxConfig {
        debug_output_path: Some(dir.path().to_path_buf()),
        ..direct_config(false)
    };
    let (mut client, _, _) = client_with(config, MockRemote::failing(), MockQueue::new());
    client.enqueue_participant_reset("+1");
    assert!(client.post_request().await.is_err());
    assert!(dir.path().join(DEBUG_REQUEST_FILE).exists());
}

/// Test: an unwritable dump location does not affect the send
#[tokio::test]
async fn debug_dump_failure_ignored() {
    let dir = tempdir().unwrap();
    let config = OutboxConfig {
        debug_output_path: Some(dir.path().join("does").join("not").join("exist")),
        ..direct_config(false)
    };
    let (mut client, remote, _) = client_with(config, MockRemote::new(), MockQueue::new());
    client.enqueue_participant_reset("+1");

    assert!(client.post_request().await.unwrap().is_some());
    assert_eq!(remote.call_count(), 1);
}
