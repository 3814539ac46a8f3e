// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Outbound accumulator.
//!
//! Holds pending operations until the next send cycle drains them into a
//! single [`Request`].
//!
//! # Design
//!
//! ```text
//! enqueue ──┬──▶ open transaction (PendingGroup) ──commit──┐
//!           │                                              ▼
//!           └──────────────────────────────────▶ top-level PendingGroup
//!                                                          │
//! templates ──finalize──┐                                  │ depth-first walk
//!                       ▼                                  ▼
//!   requeued ops ──▶ Buckets (one Vec per OperationKind) ◀─┘
//!                       │
//!                       ▼
//!                    Request
//! ```
//!
//! A transaction is just another [`PendingGroup`], appended to the top level
//! as one nested [`Element`] on commit. That keeps its operations adjacent in
//! the flattened batch; the backend gets no atomicity guarantee from it.
//!
//! The accumulator has no internal locking. It is owned by the client driving
//! the send cycle and every mutation goes through `&mut self`.

use crate::error::{OutboxError, Result};
use crate::model::{
    DocumentPoolUpdate, MasterdataPoolUpdate, MoveletAssignment, MoveletAssignmentDelete,
    MoveletDelete, MoveletSet, Operation, OperationKind, ParticipantReset,
};
use crate::protocol::Request;
use crate::template::{DocumentPoolTemplate, MasterdataPoolTemplate, TemplateRegistry};
use tracing::{debug, trace};

/// Deepest group nesting the walk accepts.
///
/// The public API only ever nests one level (a committed transaction inside
/// the top-level group); anything deeper means the queue was corrupted.
pub const MAX_GROUP_DEPTH: usize = 8;

/// One entry of a pending group.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Operation(Operation),
    Group(PendingGroup),
}

/// Ordered sequence of pending elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingGroup {
    elements: Vec<Element>,
}

impl PendingGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        self.elements.push(Element::Operation(operation));
    }

    pub fn push_group(&mut self, group: PendingGroup) {
        self.elements.push(Element::Group(group));
    }

    /// Number of direct children (a nested group counts as one).
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of operations, including those inside nested groups.
    pub fn operation_count(&self) -> usize {
        self.elements
            .iter()
            .map(|element| match element {
                Element::Operation(_) => 1,
                Element::Group(group) => group.operation_count(),
            })
            .sum()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

/// Transaction state of the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    NoTransactionOpen,
    TransactionOpen,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::NoTransactionOpen => write!(f, "NoTransactionOpen"),
            TransactionState::TransactionOpen => write!(f, "TransactionOpen"),
        }
    }
}

/// Operations classified by kind, in enqueue order within each kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    pub movelet_sets: Vec<MoveletSet>,
    pub movelet_assignments: Vec<MoveletAssignment>,
    pub movelet_assignment_deletes: Vec<MoveletAssignmentDelete>,
    pub movelet_deletes: Vec<MoveletDelete>,
    pub masterdata_pool_updates: Vec<MasterdataPoolUpdate>,
    pub document_pool_updates: Vec<DocumentPoolUpdate>,
    pub participant_resets: Vec<ParticipantReset>,
}

impl Buckets {
    /// Append an operation to the bucket matching its kind.
    pub fn classify(&mut self, operation: Operation) {
        match operation {
            Operation::MoveletSet(v) => self.movelet_sets.push(v),
            Operation::MoveletAssignment(v) => self.movelet_assignments.push(v),
            Operation::MoveletAssignmentDelete(v) => self.movelet_assignment_deletes.push(v),
            Operation::MoveletDelete(v) => self.movelet_deletes.push(v),
            Operation::MasterdataPoolUpdate(v) => self.masterdata_pool_updates.push(v),
            Operation::DocumentPoolUpdate(v) => self.document_pool_updates.push(v),
            Operation::ParticipantReset(v) => self.participant_resets.push(v),
        }
    }

    /// Append every array of `request` to the matching bucket.
    pub fn extend_from_request(&mut self, request: &Request) {
        self.movelet_sets.extend_from_slice(&request.movelet_sets);
        self.movelet_assignments
            .extend_from_slice(&request.movelet_assignments);
        self.movelet_assignment_deletes
            .extend_from_slice(&request.movelet_assignment_deletes);
        self.movelet_deletes.extend_from_slice(&request.movelet_deletes);
        self.masterdata_pool_updates
            .extend_from_slice(&request.masterdata_pool_updates);
        self.document_pool_updates
            .extend_from_slice(&request.document_pool_updates);
        self.participant_resets
            .extend_from_slice(&request.participant_resets);
    }

    pub fn len_of(&self, kind: OperationKind) -> usize {
        match kind {
            OperationKind::MoveletSet => self.movelet_sets.len(),
            OperationKind::MoveletAssignment => self.movelet_assignments.len(),
            OperationKind::MoveletAssignmentDelete => self.movelet_assignment_deletes.len(),
            OperationKind::MoveletDelete => self.movelet_deletes.len(),
            OperationKind::MasterdataPoolUpdate => self.masterdata_pool_updates.len(),
            OperationKind::DocumentPoolUpdate => self.document_pool_updates.len(),
            OperationKind::ParticipantReset => self.participant_resets.len(),
        }
    }

    pub fn len(&self) -> usize {
        OperationKind::ALL.iter().map(|kind| self.len_of(*kind)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session identity stamped on every composed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub system_id: i64,
    pub system_password: String,
    pub request_acknowledge_key: Option<String>,
    pub num_responses: u32,
}

/// Pending outbound state: queue, open transaction, templates, buckets.
#[derive(Debug, Default)]
pub struct Accumulator {
    queue: PendingGroup,
    transaction: Option<PendingGroup>,
    masterdata_templates: TemplateRegistry<MasterdataPoolTemplate>,
    document_templates: TemplateRegistry<DocumentPoolTemplate>,
    buckets: Buckets,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation to the open transaction, or the top level if none is open.
    pub fn push(&mut self, operation: Operation) {
        trace!(kind = %operation.kind(), key = %operation.key(), "Operation enqueued");
        match self.transaction.as_mut() {
            Some(group) => group.push(operation),
            None => self.queue.push(operation),
        }
    }

    pub fn transaction_state(&self) -> TransactionState {
        if self.transaction.is_some() {
            TransactionState::TransactionOpen
        } else {
            TransactionState::NoTransactionOpen
        }
    }

    /// Open a transaction. Nested transactions are rejected.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(OutboxError::illegal_state(
                TransactionState::NoTransactionOpen.to_string(),
                TransactionState::TransactionOpen.to_string(),
            ));
        }
        self.transaction = Some(PendingGroup::new());
        debug!("Transaction opened");
        Ok(())
    }

    /// Append the open transaction to the top level as one nested group.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let group = self.take_transaction()?;
        debug!(operations = group.operation_count(), "Transaction committed");
        self.queue.push_group(group);
        Ok(())
    }

    /// Discard the open transaction and everything enqueued in it.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        let group = self.take_transaction()?;
        debug!(discarded = group.operation_count(), "Transaction rolled back");
        Ok(())
    }

    fn take_transaction(&mut self) -> Result<PendingGroup> {
        self.transaction.take().ok_or_else(|| {
            OutboxError::illegal_state(
                TransactionState::TransactionOpen.to_string(),
                TransactionState::NoTransactionOpen.to_string(),
            )
        })
    }

    pub fn masterdata_template(&mut self, pool: &str) -> &mut MasterdataPoolTemplate {
        self.masterdata_templates.get_or_create(pool)
    }

    pub fn document_template(&mut self, pool: &str) -> &mut DocumentPoolTemplate {
        self.document_templates.get_or_create(pool)
    }

    /// Number of registered pool templates of both kinds.
    pub fn template_count(&self) -> usize {
        self.masterdata_templates.len() + self.document_templates.len()
    }

    /// Operations waiting for the next compose (open transaction excluded).
    pub fn pending_operations(&self) -> usize {
        self.queue.operation_count() + self.buckets.len()
    }

    /// True if the next compose would carry no operation.
    pub fn is_empty(&self) -> bool {
        self.pending_operations() == 0 && self.template_count() == 0
    }

    /// Put the contents of a failed request back into the plain buckets.
    ///
    /// Contents are appended, never replacing what is already buffered.
    pub fn requeue(&mut self, request: &Request) {
        self.buckets.extend_from_request(request);
    }

    /// Drain all pending state into one request.
    ///
    /// 1. Finalize templates (masterdata, then document) into their buckets
    /// 2. Depth-first walk of the queue, classifying each operation
    /// 3. Build the request from identity + buckets
    /// 4. Leave the accumulator empty
    ///
    /// An open transaction is untouched and stays open.
    pub fn compose(&mut self, identity: Identity) -> Result<Request> {
        for operation in self.masterdata_templates.drain() {
            self.buckets.classify(operation);
        }
        for operation in self.document_templates.drain() {
            self.buckets.classify(operation);
        }

        let queue = std::mem::take(&mut self.queue);
        if let Err(e) = flatten_into(queue, &mut self.buckets) {
            self.buckets = Buckets::default();
            return Err(e);
        }

        let buckets = std::mem::take(&mut self.buckets);
        let request = Request {
            system_id: identity.system_id,
            system_password: identity.system_password,
            request_acknowledge_key: identity.request_acknowledge_key,
            num_responses: identity.num_responses,
            movelet_sets: buckets.movelet_sets,
            movelet_assignments: buckets.movelet_assignments,
            movelet_assignment_deletes: buckets.movelet_assignment_deletes,
            movelet_deletes: buckets.movelet_deletes,
            masterdata_pool_updates: buckets.masterdata_pool_updates,
            document_pool_updates: buckets.document_pool_updates,
            participant_resets: buckets.participant_resets,
        };

        debug!(operations = request.operation_count(), "Request composed");
        Ok(request)
    }

    #[cfg(test)]
    pub(crate) fn queue_mut(&mut self) -> &mut PendingGroup {
        &mut self.queue
    }
}

/// Iterative depth-first walk of `group`, classifying operations in order.
fn flatten_into(group: PendingGroup, buckets: &mut Buckets) -> Result<()> {
    let mut stack = vec![group.elements.into_iter()];

    while let Some(frame) = stack.last_mut() {
        match frame.next() {
            Some(Element::Operation(operation)) => buckets.classify(operation),
            Some(Element::Group(inner)) => {
                if stack.len() > MAX_GROUP_DEPTH {
                    return Err(OutboxError::MalformedAccumulator(format!(
                        "group nesting deeper than {MAX_GROUP_DEPTH}"
                    )));
                }
                stack.push(inner.elements.into_iter());
            }
            None => {
                stack.pop();
            }
        }
    }

    Ok(())
}
