// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Queue relay collaborator: transactional access to named message queues.
//!
//! A handoff groups queue operations into one all-or-nothing unit:
//!
//! - `send` stages a message; it becomes visible only on commit
//! - `receive` takes a message; on abort it goes back to the head of its queue
//!
//! [`InMemoryQueue`] implements this in process. It backs standalone use and
//! the tests; production deployments plug in their queue system instead.

use super::{BoxFuture, TransportError, TransportResult};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Identifier of one open handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandoffId(pub u64);

impl fmt::Display for HandoffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handoff-{}", self.0)
    }
}

/// Transactional message queue used by queue relay mode.
///
/// Message bodies are serialized request/response JSON.
pub trait MessageQueue: Send + Sync + 'static {
    /// Open a new handoff.
    fn begin_handoff(&self) -> BoxFuture<'_, HandoffId>;

    /// Stage `body` for `queue` inside `handoff`.
    fn send<'a>(&'a self, handoff: HandoffId, queue: &'a str, body: String) -> BoxFuture<'a, ()>;

    /// Take the oldest message of `queue` inside `handoff`, waiting at most `timeout`.
    fn receive<'a>(
        &'a self,
        handoff: HandoffId,
        queue: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, String>;

    /// Make every staged send visible and forget every received message.
    fn commit_handoff(&self, handoff: HandoffId) -> BoxFuture<'_, ()>;

    /// Drop every staged send and return every received message.
    fn abort_handoff(&self, handoff: HandoffId) -> BoxFuture<'_, ()>;
}

#[derive(Debug, Default)]
struct Handoff {
    staged: Vec<(String, String)>,
    received: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<String>>,
    handoffs: HashMap<HandoffId, Handoff>,
    next_handoff: u64,
}

impl QueueState {
    fn handoff_mut(&mut self, handoff: HandoffId) -> TransportResult<&mut Handoff> {
        self.handoffs
            .get_mut(&handoff)
            .ok_or_else(|| TransportError::Protocol(format!("unknown {handoff}")))
    }

    fn take_handoff(&mut self, handoff: HandoffId) -> TransportResult<Handoff> {
        self.handoffs
            .remove(&handoff)
            .ok_or_else(|| TransportError::Protocol(format!("unknown {handoff}")))
    }
}

/// In-process [`MessageQueue`] with named FIFOs.
///
/// Queues must be declared before use; sending to or receiving from an
/// undeclared queue fails with [`TransportError::QueueNotFound`].
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    committed: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the given queues already declared.
    pub fn with_queues(names: &[&str]) -> Self {
        let state = QueueState {
            queues: names
                .iter()
                .map(|name| (name.to_string(), VecDeque::new()))
                .collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            committed: Notify::new(),
        }
    }

    /// Declare a queue. Declaring an existing queue keeps its messages.
    pub async fn declare(&self, name: &str) {
        let mut state = self.state.lock().await;
        state.queues.entry(name.to_string()).or_default();
    }

    /// Append a message outside any handoff (the backend side of the relay).
    pub async fn push(&self, queue: &str, body: String) -> TransportResult<()> {
        {
            let mut state = self.state.lock().await;
            state
                .queues
                .get_mut(queue)
                .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?
                .push_back(body);
        }
        self.committed.notify_waiters();
        Ok(())
    }

    /// Take the oldest message outside any handoff, if there is one.
    pub async fn pop(&self, queue: &str) -> TransportResult<Option<String>> {
        let mut state = self.state.lock().await;
        Ok(state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?
            .pop_front())
    }

    /// Number of visible messages, or `None` for an undeclared queue.
    pub async fn depth(&self, queue: &str) -> Option<usize> {
        let state = self.state.lock().await;
        state.queues.get(queue).map(VecDeque::len)
    }

    /// Number of handoffs neither committed nor aborted.
    pub async fn open_handoffs(&self) -> usize {
        self.state.lock().await.handoffs.len()
    }

    async fn try_receive(&self, handoff: HandoffId, queue: &str) -> TransportResult<Option<String>> {
        let mut state = self.state.lock().await;
        state.handoff_mut(handoff)?;
        let body = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?
            .pop_front();
        let Some(body) = body else {
            return Ok(None);
        };
        state
            .handoff_mut(handoff)?
            .received
            .push((queue.to_string(), body.clone()));
        Ok(Some(body))
    }
}

impl MessageQueue for InMemoryQueue {
    fn begin_handoff(&self) -> BoxFuture<'_, HandoffId> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.next_handoff += 1;
            let handoff = HandoffId(state.next_handoff);
            state.handoffs.insert(handoff, Handoff::default());
            trace!(%handoff, "Handoff opened");
            Ok(handoff)
        })
    }

    fn send<'a>(&'a self, handoff: HandoffId, queue: &'a str, body: String) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if !state.queues.contains_key(queue) {
                return Err(TransportError::QueueNotFound(queue.to_string()));
            }
            state
                .handoff_mut(handoff)?
                .staged
                .push((queue.to_string(), body));
            Ok(())
        })
    }

    fn receive<'a>(
        &'a self,
        handoff: HandoffId,
        queue: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let deadline = Instant::now() + timeout;
            loop {
                // Register for wakeups before checking, so a commit between
                // the check and the wait is not missed.
                let mut notified = std::pin::pin!(self.committed.notified());
                notified.as_mut().enable();

                if let Some(body) = self.try_receive(handoff, queue).await? {
                    return Ok(body);
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return Err(TransportError::Timeout(timeout));
                }
            }
        })
    }

    fn commit_handoff(&self, handoff: HandoffId) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let published = {
                let mut state = self.state.lock().await;
                let open = state.take_handoff(handoff)?;
                let published = open.staged.len();
                for (queue, body) in open.staged {
                    // Declared queues are never removed, checked at send time.
                    state.queues.entry(queue).or_default().push_back(body);
                }
                published
            };
            if published > 0 {
                self.committed.notify_waiters();
            }
            debug!(%handoff, published, "Handoff committed");
            Ok(())
        })
    }

    fn abort_handoff(&self, handoff: HandoffId) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let returned = {
                let mut state = self.state.lock().await;
                let open = state.take_handoff(handoff)?;
                let returned = open.received.len();
                // Newest first, so the oldest ends up back at the head.
                for (queue, body) in open.received.into_iter().rev() {
                    state.queues.entry(queue).or_default().push_front(body);
                }
                returned
            };
            if returned > 0 {
                self.committed.notify_waiters();
            }
            debug!(%handoff, returned, "Handoff aborted");
            Ok(())
        })
    }
}
