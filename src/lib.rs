//! # Movilizer Outbox
//!
//! A client-side outbox for a Movilizer workforce-dispatch backend.
//!
//! ## Architecture
//!
//! Callers enqueue operations; each send cycle drains them into one batched
//! request, sends it over one of two transports and routes the backend's
//! reply objects back:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                              OutboxClient                                 │
//! │                                                                           │
//! │  enqueue_*  ─┐                                                            │
//! │  begin/commit├──► ┌─────────────┐   compose   ┌─────────┐                 │
//! │  rollback   ─┘    │ Accumulator │ ──────────► │ Request │──┐              │
//! │  *_template ────► │ + templates │             └─────────┘  │              │
//! │                   └─────────────┘                          ▼              │
//! │                          ▲ requeue on failure     ┌──────────────────┐    │
//! │                          └─────────────────────── │ Transport        │    │
//! │                                                   │ direct | relay   │    │
//! │  dequeue_response_object ◄── InboundQueue ◄────── └──────────────────┘    │
//! │                                  (replies)          Response, ack key     │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering
//!
//! A composed request holds one array per operation kind. Within a kind,
//! operations keep enqueue order; a committed transaction keeps its
//! operations adjacent; a rolled back one leaves no trace.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use movilizer_outbox::{Movelet, OutboxClient, OutboxConfig};
//!
//! #[tokio::main]
//! async fn main() -> movilizer_outbox::Result<()> {
//!     let mut client = OutboxClient::new(OutboxConfig::for_testing(12345))?;
//!
//!     client.begin_transaction()?;
//!     client.enqueue_movelet(Movelet::new("INSPECTION", "Inspection"), "alice", "+4915100000");
//!     client.enqueue_participant_reset("+4915100001");
//!     client.commit_transaction()?;
//!
//!     client
//!         .masterdata_template("customers")
//!         .delete("obsolete-customer");
//!
//!     if client.post_request().await?.is_some() {
//!         while let Some(reply) = client.dequeue_response_object() {
//!             println!("reply from {}", reply.device_address());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod accumulator;
pub mod client;
pub mod config;
pub mod error;
pub mod event_log;
pub mod inbound;
pub mod metrics;
pub mod model;
pub mod protocol;
pub mod resilience;
pub mod template;
pub mod transport;

// Re-exports for convenience
pub use accumulator::{Accumulator, TransactionState};
pub use client::OutboxClient;
pub use config::{OutboxConfig, QueueRelayConfig, TransportMode, WebServiceConfig};
pub use error::{OutboxError, Result};
pub use event_log::{EventLog, TracingEventLog};
pub use inbound::ReplyObject;
pub use model::{
    DocumentEntry, DocumentPoolUpdate, MasterdataEntry, MasterdataPoolUpdate, Movelet,
    MoveletAssignment, MoveletAssignmentDelete, MoveletDelete, MoveletSet, Operation,
    OperationKind, Participant, ParticipantReset,
};
pub use protocol::{Request, Response};
pub use template::{DocumentPoolTemplate, MasterdataPoolTemplate};
pub use transport::{
    Endpoint, HandoffId, InMemoryQueue, MessageQueue, NoOpRemote, RemoteService, TransportError,
};
