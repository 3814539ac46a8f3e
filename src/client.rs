// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The outbox client.
//!
//! Ties together:
//! - The enqueue API and transaction control over [`Accumulator`]
//! - Pool templates
//! - One send cycle: compose → debug dump → send → ingest or recover
//! - Acknowledgement key continuity across cycles
//! - The inbound FIFO of reply objects
//!
//! # Send cycle
//!
//! ```text
//! post_request()
//!   │
//!   ├─ compose            (drain templates + queue into one Request)
//!   ├─ dump               (pretty JSON under debug_output_path, best effort)
//!   ├─ send               (direct with retry, or queue relay)
//!   │    ├─ Some(response) → treat_response: replies → FIFO, ack key, event log
//!   │    ├─ None           → nothing this cycle (queue relay only)
//!   │    └─ Err            → requeue if force_requeue_on_error, then surface
//!   └─ done
//! ```
//!
//! # Concurrency
//!
//! Every method takes `&mut self` and there is no internal locking. A client
//! shared between tasks must be serialized by the caller, e.g. behind a
//! `tokio::sync::Mutex`. Enqueue order is the order in which those calls
//! acquire the client.

use crate::accumulator::{Accumulator, Identity, TransactionState};
use crate::config::{OutboxConfig, TransportMode};
use crate::error::{OutboxError, Result};
use crate::event_log::{EventLog, TracingEventLog};
use crate::inbound::{InboundQueue, ReplyObject};
use crate::metrics;
use crate::model::{
    DocumentPoolUpdate, MasterdataPoolUpdate, Movelet, MoveletAssignment,
    MoveletAssignmentDelete, MoveletDelete, MoveletSet, Operation, Participant, ParticipantReset,
};
use crate::protocol::{Request, Response};
use crate::resilience::RetryConfig;
use crate::template::{DocumentPoolTemplate, MasterdataPoolTemplate};
use crate::transport::{self, Endpoint, InMemoryQueue, MessageQueue, NoOpRemote, RemoteService};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Client-side outbox for one backend system.
///
/// Generic over its collaborators so the RPC proxy and the queue system can
/// be swapped for mocks in tests.
pub struct OutboxClient<R: RemoteService = NoOpRemote, Q: MessageQueue = InMemoryQueue> {
    /// Snapshot captured at construction, never re-read
    config: OutboxConfig,

    /// Selected once from `config`
    mode: TransportMode,

    /// Direct mode attempt budget
    retry: RetryConfig,

    accumulator: Accumulator,
    inbound: InboundQueue,

    /// Key from the last response, echoed on the next request
    ack_key: Option<String>,

    remote: Arc<R>,
    queue: Arc<Q>,
    event_log: Arc<dyn EventLog>,
}

impl OutboxClient<NoOpRemote, InMemoryQueue> {
    /// Create a standalone client: no-op remote and an in-process queue pair.
    pub fn new(config: OutboxConfig) -> Result<Self> {
        let queue = InMemoryQueue::with_queues(&[
            config.queue_relay.request_queue.as_str(),
            config.queue_relay.response_queue.as_str(),
        ]);
        Self::with_transports(config, Arc::new(NoOpRemote), Arc::new(queue))
    }
}

impl<R: RemoteService, Q: MessageQueue> OutboxClient<R, Q> {
    /// Create a client over the given collaborators.
    ///
    /// Fails with [`OutboxError::Config`] if the snapshot does not validate.
    pub fn with_transports(config: OutboxConfig, remote: Arc<R>, queue: Arc<Q>) -> Result<Self> {
        config.validate()?;
        let mode = config.transport_mode();
        let retry = config.retry.retry_config();
        info!(
            system_id = config.system_id,
            %mode,
            force_requeue = config.force_requeue_on_error,
            "Outbox client created"
        );
        Ok(Self {
            config,
            mode,
            retry,
            accumulator: Accumulator::new(),
            inbound: InboundQueue::new(),
            ack_key: None,
            remote,
            queue,
            event_log: Arc::new(TracingEventLog),
        })
    }

    /// Replace the event log sink.
    pub fn with_event_log(mut self, event_log: Arc<dyn EventLog>) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn config(&self) -> &OutboxConfig {
        &self.config
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.mode
    }

    /// Key that the next request will carry.
    pub fn acknowledge_key(&self) -> Option<&str> {
        self.ack_key.as_deref()
    }

    /// Operations waiting for the next compose, open transaction excluded.
    pub fn pending_operations(&self) -> usize {
        self.accumulator.pending_operations()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Enqueue API
    // ═══════════════════════════════════════════════════════════════════════

    /// Enqueue any operation.
    pub fn enqueue(&mut self, operation: impl Into<Operation>) {
        let operation = operation.into();
        metrics::record_operation_enqueued(operation.kind());
        self.accumulator.push(operation);
    }

    /// Deploy one movelet to one participant.
    pub fn enqueue_movelet(&mut self, movelet: Movelet, uname: &str, phone: &str) {
        self.enqueue(MoveletSet::single(movelet, uname, phone));
    }

    /// Deploy a prebuilt set, participants included.
    pub fn enqueue_movelet_set(&mut self, set: MoveletSet) {
        self.enqueue(set);
    }

    /// Deploy a set to one participant, replacing its participants.
    pub fn enqueue_movelet_set_for(&mut self, mut set: MoveletSet, uname: &str, phone: &str) {
        set.participants = vec![Participant::new(uname, phone)];
        self.enqueue(set);
    }

    /// Deploy a set to several participants, replacing its participants.
    ///
    /// `unames[i]` pairs with `phones[i]`. Nothing is enqueued on a length
    /// mismatch.
    pub fn enqueue_movelet_set_for_all(
        &mut self,
        mut set: MoveletSet,
        unames: &[&str],
        phones: &[&str],
    ) -> Result<()> {
        set.participants = participants(unames, phones)?;
        self.enqueue(set);
        Ok(())
    }

    pub fn enqueue_movelet_assignment(
        &mut self,
        movelet_key: &str,
        movelet_key_ext: Option<&str>,
        uname: &str,
        phone: &str,
    ) {
        self.enqueue(MoveletAssignment::new(movelet_key, movelet_key_ext, uname, phone));
    }

    /// Assign a movelet to several participants in one operation.
    pub fn enqueue_movelet_assignment_for_all(
        &mut self,
        movelet_key: &str,
        movelet_key_ext: Option<&str>,
        unames: &[&str],
        phones: &[&str],
    ) -> Result<()> {
        let participants = participants(unames, phones)?;
        self.enqueue(MoveletAssignment::for_participants(
            movelet_key,
            movelet_key_ext,
            participants,
        ));
        Ok(())
    }

    pub fn enqueue_movelet_deletion(&mut self, movelet_key: &str, movelet_key_ext: Option<&str>) {
        self.enqueue(MoveletDelete::new(movelet_key, movelet_key_ext));
    }

    /// Hard-delete one assignment from a device.
    pub fn enqueue_movelet_assignment_deletion(
        &mut self,
        movelet_key: &str,
        movelet_key_ext: Option<&str>,
        phone: &str,
    ) {
        self.enqueue(MoveletAssignmentDelete::new(
            Some(movelet_key),
            movelet_key_ext,
            phone,
            true,
        ));
    }

    /// Hard-delete one assignment from several devices, one operation per device.
    pub fn enqueue_movelet_assignment_deletion_for_all(
        &mut self,
        movelet_key: &str,
        movelet_key_ext: Option<&str>,
        phones: &[&str],
    ) {
        for phone in phones {
            self.enqueue_movelet_assignment_deletion(movelet_key, movelet_key_ext, phone);
        }
    }

    /// Hard-delete every assignment of a device.
    pub fn enqueue_all_movelets_assignment_deletion(&mut self, phone: &str) {
        self.enqueue(MoveletAssignmentDelete::all_for_device(phone));
    }

    pub fn enqueue_participant_reset(&mut self, phone: &str) {
        self.enqueue(ParticipantReset::new(phone));
    }

    pub fn enqueue_masterdata_pool_update(&mut self, update: MasterdataPoolUpdate) {
        self.enqueue(update);
    }

    pub fn enqueue_document_pool_update(&mut self, update: DocumentPoolUpdate) {
        self.enqueue(update);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transactions
    // ═══════════════════════════════════════════════════════════════════════

    pub fn transaction_state(&self) -> TransactionState {
        self.accumulator.transaction_state()
    }

    /// Open a transaction. Fails if one is already open.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.accumulator.begin_transaction()?;
        metrics::record_transaction("begin");
        Ok(())
    }

    /// Close the open transaction, keeping its operations adjacent.
    pub fn commit_transaction(&mut self) -> Result<()> {
        self.accumulator.commit_transaction()?;
        metrics::record_transaction("commit");
        Ok(())
    }

    /// Discard the open transaction.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        self.accumulator.rollback_transaction()?;
        metrics::record_transaction("rollback");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Pool templates
    // ═══════════════════════════════════════════════════════════════════════

    /// Live template for a masterdata pool, created on first use.
    pub fn masterdata_template(&mut self, pool: &str) -> &mut MasterdataPoolTemplate {
        self.accumulator.masterdata_template(pool)
    }

    /// Live template for a document pool, created on first use.
    pub fn document_template(&mut self, pool: &str) -> &mut DocumentPoolTemplate {
        self.accumulator.document_template(pool)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Send cycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Drain everything pending into one request stamped with the session identity.
    pub fn compose_request(&mut self) -> Result<Request> {
        let identity = Identity {
            system_id: self.config.system_id,
            system_password: self.config.system_password.clone(),
            request_acknowledge_key: self.ack_key.clone(),
            num_responses: self.config.num_responses,
        };
        let request = self.accumulator.compose(identity)?;
        metrics::record_compose(&request);
        metrics::set_pending_operations(self.accumulator.pending_operations());
        Ok(request)
    }

    /// Run one send cycle.
    ///
    /// Returns the ingested response, or `None` when queue relay mode got no
    /// response this cycle. In direct mode, an exhausted retry budget is
    /// surfaced after recovery has run.
    #[instrument(skip(self), fields(mode = %self.mode, system_id = self.config.system_id))]
    pub async fn post_request(&mut self) -> Result<Option<Response>> {
        let request = self.compose_request()?;
        self.dump_request(&request).await;

        let response = match self.mode {
            TransportMode::Direct => {
                let endpoint = Endpoint::from_config(&self.config.web_service);
                match transport::send_direct(&*self.remote, &request, &endpoint, &self.retry).await
                {
                    Ok(response) => Some(response),
                    Err(e) => {
                        self.recover(&request, &e);
                        return Err(e);
                    }
                }
            }
            TransportMode::QueueRelay => {
                transport::send_via_queue(&*self.queue, &request, &self.config.queue_relay).await
            }
        };

        if let Some(response) = &response {
            self.treat_response(response);
        }
        Ok(response)
    }

    /// Ingest a backend response.
    ///
    /// Reply objects go to the inbound FIFO, the acknowledgement key replaces
    /// the stored one (also when absent), then every status message and every
    /// movelet error is forwarded to the event log.
    pub fn treat_response(&mut self, response: &Response) {
        let reply_objects = self.inbound.enqueue_response(response);
        self.ack_key = response.request_acknowledge_key.clone();

        for message in &response.status_messages {
            self.event_log.status_message(message);
        }
        for movelet_error in &response.movelet_errors {
            self.event_log.movelet_error(movelet_error);
        }

        metrics::record_response(
            reply_objects,
            response.status_messages.len(),
            response.movelet_errors.len(),
        );
        metrics::set_inbound_depth(self.inbound.len());
        debug!(
            reply_objects,
            status_messages = response.status_messages.len(),
            movelet_errors = response.movelet_errors.len(),
            has_ack_key = self.ack_key.is_some(),
            "Response ingested"
        );
    }

    /// Put every operation of `request` back for the next compose.
    pub fn requeue(&mut self, request: &Request) {
        self.accumulator.requeue(request);
        metrics::record_requeue(request.operation_count());
        metrics::set_pending_operations(self.accumulator.pending_operations());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Inbound
    // ═══════════════════════════════════════════════════════════════════════

    /// Oldest reply object, or `None` if there is none. Never waits.
    pub fn dequeue_response_object(&mut self) -> Option<ReplyObject> {
        let item = self.inbound.dequeue();
        if item.is_some() {
            metrics::set_inbound_depth(self.inbound.len());
        }
        item
    }

    /// Reply objects not yet dequeued.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    fn recover(&mut self, request: &Request, e: &OutboxError) {
        if self.config.force_requeue_on_error {
            warn!(
                operations = request.operation_count(),
                error = %e,
                "Send failed, requeueing batch for next cycle"
            );
            self.requeue(request);
        } else {
            error!(
                operations = request.operation_count(),
                error = %e,
                "Send failed, batch dropped"
            );
            metrics::record_batch_dropped(request.operation_count());
        }
    }

    async fn dump_request(&self, request: &Request) {
        let Some(path) = self.config.debug_request_path() else {
            return;
        };
        let written = match serde_json::to_vec_pretty(request) {
            Ok(body) => tokio::fs::write(&path, body).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match written {
            Ok(()) => debug!(path = %path.display(), "Request dumped"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to dump request"),
        }
    }
}

fn participants(unames: &[&str], phones: &[&str]) -> Result<Vec<Participant>> {
    if unames.len() != phones.len() {
        return Err(OutboxError::ArgumentMismatch {
            participants: unames.len(),
            addresses: phones.len(),
        });
    }
    Ok(unames
        .iter()
        .zip(phones)
        .map(|(uname, phone)| Participant::new(*uname, *phone))
        .collect())
}
