//! Mock transport collaborators for testing.
//!
//! Records every call so tests can assert on what the client sent, and lets
//! tests decide which calls fail.

#![allow(dead_code)]

use movilizer_outbox::config::{OutboxConfig, QueueRelayConfig};
use movilizer_outbox::protocol::{MoveletError, Request, Response, StatusMessage};
use movilizer_outbox::transport::{
    BoxFuture, Endpoint, HandoffId, InMemoryQueue, MessageQueue, RemoteService, TransportError,
};
use movilizer_outbox::EventLog;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;

pub const REQUEST_QUEUE: &str = "movilizer.requests";
pub const RESPONSE_QUEUE: &str = "movilizer.responses";

/// Direct mode config with millisecond retries.
pub fn direct_config(force_requeue: bool) -> OutboxConfig {
    OutboxConfig {
        force_requeue_on_error: force_requeue,
        ..OutboxConfig::for_testing(4711)
    }
}

/// Queue relay config with a short receive timeout.
pub fn relay_config() -> OutboxConfig {
    OutboxConfig {
        queue_relay: QueueRelayConfig {
            receive_timeout: "100ms".to_string(),
            ..QueueRelayConfig::enabled(REQUEST_QUEUE, RESPONSE_QUEUE)
        },
        ..OutboxConfig::for_testing(4711)
    }
}

// =============================================================================
// Remote
// =============================================================================

/// Mock implementation of RemoteService that records all calls.
///
/// # Example
/// ```rust,ignore
/// let mock = MockRemote::failing_times(2);
/// mock.push_response(Response::acknowledged("k1")).await;
///
/// // Use in tests...
///
/// assert_eq!(mock.call_count(), 3);
/// ```
pub struct MockRemote {
    /// Recorded submit_batch() requests
    requests: RwLock<Vec<Request>>,
    /// Recorded endpoints
    endpoints: RwLock<Vec<Endpoint>>,
    /// Queued responses; an empty response when exhausted
    responses: RwLock<VecDeque<Response>>,
    /// Fail the first N calls
    fail_first: AtomicUsize,
    /// Fail every call while set
    failing: AtomicBool,
    /// Never answer while set
    stalled: AtomicBool,
    /// Counter for submit_batch() calls
    call_count: AtomicUsize,
}

impl MockRemote {
    /// Create a mock that answers every call.
    pub fn new() -> Self {
        Self::failing_times(0)
    }

    /// Create a mock that fails every call.
    pub fn failing() -> Self {
        let mock = Self::new();
        mock.start_failing();
        mock
    }

    /// Create a mock whose calls never complete.
    pub fn stalled() -> Self {
        let mock = Self::new();
        mock.stalled.store(true, Ordering::SeqCst);
        mock
    }

    /// Create a mock that fails the first `n` calls.
    pub fn failing_times(n: usize) -> Self {
        Self {
            requests: RwLock::new(Vec::new()),
            endpoints: RwLock::new(Vec::new()),
            responses: RwLock::new(VecDeque::new()),
            fail_first: AtomicUsize::new(n),
            failing: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            call_count: AtomicUsize::new(0),
        }
    }

    pub async fn push_response(&self, response: Response) {
        self.responses.write().await.push_back(response);
    }

    /// Make every later call fail.
    pub fn start_failing(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Make every later call succeed.
    pub fn recover(&self) {
        self.fail_first.store(0, Ordering::SeqCst);
        self.failing.store(false, Ordering::SeqCst);
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.requests.read().await.clone()
    }

    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.read().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl RemoteService for MockRemote {
    fn submit_batch<'a>(
        &'a self,
        request: &'a Request,
        endpoint: &'a Endpoint,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            self.requests.write().await.push(request.clone());
            self.endpoints.write().await.push(endpoint.clone());
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.stalled.load(Ordering::SeqCst) {
                return std::future::pending().await;
            }
            if self.failing.load(Ordering::SeqCst) || call < self.fail_first.load(Ordering::SeqCst) {
                return Err(TransportError::Unavailable(format!(
                    "simulated outage (call {})",
                    call + 1
                )));
            }
            Ok(self.responses.write().await.pop_front().unwrap_or_default())
        })
    }
}

// =============================================================================
// Queue
// =============================================================================

/// Queue operation a [`MockQueue`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFault {
    Begin,
    Send,
    Receive,
    /// Receive never completes.
    StallReceive,
    /// Fail the n-th commit (1-indexed).
    Commit(usize),
}

/// In-memory queue pair with failure injection.
pub struct MockQueue {
    inner: InMemoryQueue,
    fault: Mutex<Option<QueueFault>>,
    commits: AtomicUsize,
    aborts: AtomicUsize,
}

impl MockQueue {
    pub fn new() -> Self {
        Self {
            inner: InMemoryQueue::with_queues(&[REQUEST_QUEUE, RESPONSE_QUEUE]),
            fault: Mutex::new(None),
            commits: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
        }
    }

    pub fn with_fault(fault: QueueFault) -> Self {
        let queue = Self::new();
        *queue.fault.lock().unwrap() = Some(fault);
        queue
    }

    pub fn clear_fault(&self) {
        *self.fault.lock().unwrap() = None;
    }

    /// Play the backend: put a response on the response queue.
    pub async fn respond(&self, response: &Response) {
        let body = serde_json::to_string(response).unwrap();
        self.inner.push(RESPONSE_QUEUE, body).await.unwrap();
    }

    /// Play the backend: put an arbitrary body on the response queue.
    pub async fn respond_raw(&self, body: &str) {
        self.inner.push(RESPONSE_QUEUE, body.to_string()).await.unwrap();
    }

    /// Play the backend: take the oldest published request.
    pub async fn take_request(&self) -> Option<Request> {
        self.inner
            .pop(REQUEST_QUEUE)
            .await
            .unwrap()
            .map(|body| serde_json::from_str(&body).unwrap())
    }

    pub async fn depth(&self, queue: &str) -> usize {
        self.inner.depth(queue).await.unwrap_or(0)
    }

    pub async fn open_handoffs(&self) -> usize {
        self.inner.open_handoffs().await
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    fn faulted(&self, fault: QueueFault) -> bool {
        *self.fault.lock().unwrap() == Some(fault)
    }
}

impl MessageQueue for MockQueue {
    fn begin_handoff(&self) -> BoxFuture<'_, HandoffId> {
        if self.faulted(QueueFault::Begin) {
            return Box::pin(async { Err(TransportError::Unavailable("broker down".into())) });
        }
        self.inner.begin_handoff()
    }

    fn send<'a>(&'a self, handoff: HandoffId, queue: &'a str, body: String) -> BoxFuture<'a, ()> {
        if self.faulted(QueueFault::Send) {
            return Box::pin(async { Err(TransportError::Unavailable("send refused".into())) });
        }
        self.inner.send(handoff, queue, body)
    }

    fn receive<'a>(
        &'a self,
        handoff: HandoffId,
        queue: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, String> {
        if self.faulted(QueueFault::Receive) {
            return Box::pin(async { Err(TransportError::Unavailable("receive refused".into())) });
        }
        if self.faulted(QueueFault::StallReceive) {
            return Box::pin(std::future::pending());
        }
        self.inner.receive(handoff, queue, timeout)
    }

    fn commit_handoff(&self, handoff: HandoffId) -> BoxFuture<'_, ()> {
        let commit = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if self.faulted(QueueFault::Commit(commit)) {
            return Box::pin(async { Err(TransportError::Unavailable("commit refused".into())) });
        }
        self.inner.commit_handoff(handoff)
    }

    fn abort_handoff(&self, handoff: HandoffId) -> BoxFuture<'_, ()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort_handoff(handoff)
    }
}

// =============================================================================
// Event log
// =============================================================================

/// One recorded event log call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggedEvent {
    Status(String),
    MoveletError(String),
}

/// Mock EventLog that records calls in order.
#[derive(Default)]
pub struct MockEventLog {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MockEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventLog for MockEventLog {
    fn status_message(&self, message: &StatusMessage) {
        self.events
            .lock()
            .unwrap()
            .push(LoggedEvent::Status(message.message.clone()));
    }

    fn movelet_error(&self, error: &MoveletError) {
        self.events
            .lock()
            .unwrap()
            .push(LoggedEvent::MoveletError(error.movelet_key.clone()));
    }
}
