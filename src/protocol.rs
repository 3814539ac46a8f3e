// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Request and response records exchanged with the backend.
//!
//! These are the bodies handed to the transport collaborators. The RPC wire
//! format itself belongs to the remote service implementation; here they are
//! plain serde records so they can be dumped for debugging or carried through
//! a message queue.

use crate::model::{
    DocumentPoolUpdate, MasterdataPoolUpdate, MoveletAssignment, MoveletAssignmentDelete,
    MoveletDelete, MoveletSet, ParticipantReset,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One batched request: session identity plus one array per operation kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub system_id: i64,
    pub system_password: String,
    /// Key from the previous response, `None` on the first request.
    #[serde(default)]
    pub request_acknowledge_key: Option<String>,
    /// Maximum number of reply objects the backend may return.
    #[serde(default)]
    pub num_responses: u32,
    #[serde(default)]
    pub movelet_sets: Vec<MoveletSet>,
    #[serde(default)]
    pub movelet_assignments: Vec<MoveletAssignment>,
    #[serde(default)]
    pub movelet_assignment_deletes: Vec<MoveletAssignmentDelete>,
    #[serde(default)]
    pub movelet_deletes: Vec<MoveletDelete>,
    #[serde(default)]
    pub masterdata_pool_updates: Vec<MasterdataPoolUpdate>,
    #[serde(default)]
    pub document_pool_updates: Vec<DocumentPoolUpdate>,
    #[serde(default)]
    pub participant_resets: Vec<ParticipantReset>,
}

impl Request {
    /// Total number of operations carried by this request.
    pub fn operation_count(&self) -> usize {
        self.movelet_sets.len()
            + self.movelet_assignments.len()
            + self.movelet_assignment_deletes.len()
            + self.movelet_deletes.len()
            + self.masterdata_pool_updates.len()
            + self.document_pool_updates.len()
            + self.participant_resets.len()
    }

    /// True if no operation is carried (the request may still poll replies).
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }
}

/// A completed movelet sent back by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMovelet {
    pub movelet_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movelet_key_extension: Option<String>,
    pub device_address: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl ReplyMovelet {
    pub fn new(movelet_key: impl Into<String>, device_address: impl Into<String>) -> Self {
        Self {
            movelet_key: movelet_key.into(),
            movelet_key_extension: None,
            device_address: device_address.into(),
            values: BTreeMap::new(),
        }
    }
}

/// Free-form data uploaded by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadDataContainer {
    pub key: String,
    pub device_address: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl UploadDataContainer {
    pub fn new(key: impl Into<String>, device_address: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            device_address: device_address.into(),
            data: serde_json::Value::Null,
        }
    }
}

/// Informational message about the processed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message_type: i32,
    pub message: String,
}

/// Per-movelet processing error reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveletError {
    pub movelet_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movelet_key_extension: Option<String>,
    pub message: String,
}

/// Backend reply to one [`Request`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub reply_movelets: Vec<ReplyMovelet>,
    #[serde(default)]
    pub upload_containers: Vec<UploadDataContainer>,
    #[serde(default)]
    pub status_messages: Vec<StatusMessage>,
    #[serde(default)]
    pub movelet_errors: Vec<MoveletError>,
    /// Echoed on the next request.
    #[serde(default)]
    pub request_acknowledge_key: Option<String>,
}

impl Response {
    /// An empty response carrying only an acknowledgement key.
    pub fn acknowledged(key: impl Into<String>) -> Self {
        Self {
            request_acknowledge_key: Some(key.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request() {
        let request = Request::default();
        assert!(request.is_empty());
        assert_eq!(request.operation_count(), 0);
        assert!(request.request_acknowledge_key.is_none());
    }

    #[test]
    fn test_operation_count_spans_all_kinds() {
        let request = Request {
            movelet_sets: vec![MoveletSet::default()],
            movelet_deletes: vec![MoveletDelete::new("a", None), MoveletDelete::new("b", None)],
            participant_resets: vec![ParticipantReset::new("+49")],
            ..Default::default()
        };
        assert_eq!(request.operation_count(), 4);
        assert!(!request.is_empty());
    }

    #[test]
    fn test_response_acknowledged() {
        let response = Response::acknowledged("ack-1");
        assert_eq!(response.request_acknowledge_key.as_deref(), Some("ack-1"));
        assert!(response.reply_movelets.is_empty());
    }

    #[test]
    fn test_response_parses_with_missing_arrays() {
        let response: Response =
            serde_json::from_str(r#"{"request_acknowledge_key": "k"}"#).unwrap();
        assert_eq!(response.request_acknowledge_key.as_deref(), Some("k"));
        assert!(response.status_messages.is_empty());
        assert!(response.movelet_errors.is_empty());
    }
}
