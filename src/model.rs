// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Operation model.
//!
//! The closed set of outbound operations a caller can enqueue. Every record
//! is plain data: once built it is never mutated by the outbox, only moved
//! from the pending queue into a [`Request`](crate::protocol::Request).
//!
//! | Operation | Natural key |
//! |-----------|-------------|
//! | `MoveletSet` | keys of the contained movelets |
//! | `MoveletAssignment` | movelet key + extension |
//! | `MoveletAssignmentDelete` | movelet key (or `*`) + extension + device address |
//! | `MoveletDelete` | movelet key + extension |
//! | `MasterdataPoolUpdate` | pool name |
//! | `DocumentPoolUpdate` | pool name |
//! | `ParticipantReset` | device address |

use serde::{Deserialize, Serialize};

/// A device participant, derived from a (username, phone) pair.
///
/// By convention both `name` and `participant_key` are the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub device_address: String,
    pub name: String,
    pub participant_key: String,
}

impl Participant {
    pub fn new(uname: impl Into<String>, device_address: impl Into<String>) -> Self {
        let uname = uname.into();
        Self {
            device_address: device_address.into(),
            name: uname.clone(),
            participant_key: uname,
        }
    }
}

/// A movelet (task) definition.
///
/// The definition body is opaque to the outbox and forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movelet {
    pub movelet_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movelet_key_extension: Option<String>,
    pub name: String,
    #[serde(default)]
    pub definition: serde_json::Value,
}

impl Movelet {
    pub fn new(movelet_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            movelet_key: movelet_key.into(),
            movelet_key_extension: None,
            name: name.into(),
            definition: serde_json::Value::Null,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.movelet_key_extension = Some(extension.into());
        self
    }

    pub fn with_definition(mut self, definition: serde_json::Value) -> Self {
        self.definition = definition;
        self
    }
}

/// A set of movelets deployed to a set of participants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveletSet {
    pub movelets: Vec<Movelet>,
    pub participants: Vec<Participant>,
}

impl MoveletSet {
    pub fn new(movelets: Vec<Movelet>) -> Self {
        Self {
            movelets,
            participants: Vec::new(),
        }
    }

    /// A set holding exactly one movelet and one participant.
    pub fn single(movelet: Movelet, uname: &str, phone: &str) -> Self {
        Self {
            movelets: vec![movelet],
            participants: vec![Participant::new(uname, phone)],
        }
    }
}

/// Assigns an already deployed movelet to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveletAssignment {
    pub movelet_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movelet_key_extension: Option<String>,
    /// Set when no extension is given, so the backend never has to infer it.
    #[serde(default)]
    pub ignore_extension_key: bool,
    pub participants: Vec<Participant>,
}

impl MoveletAssignment {
    pub fn new(movelet_key: &str, movelet_key_ext: Option<&str>, uname: &str, phone: &str) -> Self {
        Self::for_participants(movelet_key, movelet_key_ext, vec![Participant::new(uname, phone)])
    }

    /// One assignment shared by several participants.
    pub fn for_participants(
        movelet_key: &str,
        movelet_key_ext: Option<&str>,
        participants: Vec<Participant>,
    ) -> Self {
        Self {
            movelet_key: movelet_key.to_string(),
            movelet_key_extension: movelet_key_ext.map(str::to_string),
            ignore_extension_key: movelet_key_ext.is_none(),
            participants,
        }
    }
}

/// Deletes a movelet from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveletDelete {
    pub movelet_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movelet_key_extension: Option<String>,
    #[serde(default)]
    pub ignore_extension_key: bool,
}

impl MoveletDelete {
    pub fn new(movelet_key: &str, movelet_key_ext: Option<&str>) -> Self {
        Self {
            movelet_key: movelet_key.to_string(),
            movelet_key_extension: movelet_key_ext.map(str::to_string),
            ignore_extension_key: movelet_key_ext.is_none(),
        }
    }
}

/// Removes a movelet assignment from a device.
///
/// A `None` movelet key removes every assignment of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveletAssignmentDelete {
    pub movelet_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movelet_key_extension: Option<String>,
    #[serde(default)]
    pub ignore_extension_key: bool,
    pub device_address: String,
    pub hard_delete: bool,
}

impl MoveletAssignmentDelete {
    pub fn new(
        movelet_key: Option<&str>,
        movelet_key_ext: Option<&str>,
        device_address: &str,
        hard_delete: bool,
    ) -> Self {
        Self {
            movelet_key: movelet_key.map(str::to_string),
            movelet_key_extension: movelet_key_ext.map(str::to_string),
            ignore_extension_key: movelet_key_ext.is_none(),
            device_address: device_address.to_string(),
            hard_delete,
        }
    }

    /// Wildcard delete of every assignment on `device_address`.
    pub fn all_for_device(device_address: &str) -> Self {
        Self::new(None, None, device_address, true)
    }

    pub fn is_wildcard(&self) -> bool {
        self.movelet_key.is_none()
    }
}

/// Resets a participant's device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantReset {
    pub device_address: String,
}

impl ParticipantReset {
    pub fn new(device_address: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
        }
    }
}

/// One masterdata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterdataEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data: std::collections::BTreeMap<String, String>,
}

impl MasterdataEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            group: None,
            description: String::new(),
            data: Default::default(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }
}

/// A delete inside a masterdata pool: one key or a whole group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterdataDelete {
    Key(String),
    Group(String),
}

/// Finalized edits to one masterdata pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterdataPoolUpdate {
    pub pool: String,
    #[serde(default)]
    pub updates: Vec<MasterdataEntry>,
    #[serde(default)]
    pub deletes: Vec<MasterdataDelete>,
}

impl MasterdataPoolUpdate {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            updates: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

/// One document in a document pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl DocumentEntry {
    pub fn new(key: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            suffix: None,
            language: None,
            data,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Finalized edits to one document pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPoolUpdate {
    pub pool: String,
    #[serde(default)]
    pub updates: Vec<DocumentEntry>,
    #[serde(default)]
    pub deletes: Vec<String>,
}

impl DocumentPoolUpdate {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            updates: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

/// Kind of an [`Operation`], one per request bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    MoveletSet,
    MoveletAssignment,
    MoveletAssignmentDelete,
    MoveletDelete,
    MasterdataPoolUpdate,
    DocumentPoolUpdate,
    ParticipantReset,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::MoveletSet,
        OperationKind::MoveletAssignment,
        OperationKind::MoveletAssignmentDelete,
        OperationKind::MoveletDelete,
        OperationKind::MasterdataPoolUpdate,
        OperationKind::DocumentPoolUpdate,
        OperationKind::ParticipantReset,
    ];

    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoveletSet => "movelet_set",
            Self::MoveletAssignment => "movelet_assignment",
            Self::MoveletAssignmentDelete => "movelet_assignment_delete",
            Self::MoveletDelete => "movelet_delete",
            Self::MasterdataPoolUpdate => "masterdata_pool_update",
            Self::DocumentPoolUpdate => "document_pool_update",
            Self::ParticipantReset => "participant_reset",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of outbound work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    MoveletSet(MoveletSet),
    MoveletAssignment(MoveletAssignment),
    MoveletAssignmentDelete(MoveletAssignmentDelete),
    MoveletDelete(MoveletDelete),
    MasterdataPoolUpdate(MasterdataPoolUpdate),
    DocumentPoolUpdate(DocumentPoolUpdate),
    ParticipantReset(ParticipantReset),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::MoveletSet(_) => OperationKind::MoveletSet,
            Self::MoveletAssignment(_) => OperationKind::MoveletAssignment,
            Self::MoveletAssignmentDelete(_) => OperationKind::MoveletAssignmentDelete,
            Self::MoveletDelete(_) => OperationKind::MoveletDelete,
            Self::MasterdataPoolUpdate(_) => OperationKind::MasterdataPoolUpdate,
            Self::DocumentPoolUpdate(_) => OperationKind::DocumentPoolUpdate,
            Self::ParticipantReset(_) => OperationKind::ParticipantReset,
        }
    }

    /// Natural key of the operation, for logging and diagnostics.
    pub fn key(&self) -> String {
        fn with_ext(key: &str, ext: &Option<String>) -> String {
            match ext {
                Some(ext) => format!("{key}/{ext}"),
                None => key.to_string(),
            }
        }

        match self {
            Self::MoveletSet(set) => set
                .movelets
                .iter()
                .map(|m| with_ext(&m.movelet_key, &m.movelet_key_extension))
                .collect::<Vec<_>>()
                .join(","),
            Self::MoveletAssignment(a) => with_ext(&a.movelet_key, &a.movelet_key_extension),
            Self::MoveletAssignmentDelete(d) => format!(
                "{}@{}",
                with_ext(d.movelet_key.as_deref().unwrap_or("*"), &d.movelet_key_extension),
                d.device_address
            ),
            Self::MoveletDelete(d) => with_ext(&d.movelet_key, &d.movelet_key_extension),
            Self::MasterdataPoolUpdate(u) => u.pool.clone(),
            Self::DocumentPoolUpdate(u) => u.pool.clone(),
            Self::ParticipantReset(r) => r.device_address.clone(),
        }
    }
}

impl From<MoveletSet> for Operation {
    fn from(v: MoveletSet) -> Self {
        Self::MoveletSet(v)
    }
}

impl From<MoveletAssignment> for Operation {
    fn from(v: MoveletAssignment) -> Self {
        Self::MoveletAssignment(v)
    }
}

impl From<MoveletAssignmentDelete> for Operation {
    fn from(v: MoveletAssignmentDelete) -> Self {
        Self::MoveletAssignmentDelete(v)
    }
}

impl From<MoveletDelete> for Operation {
    fn from(v: MoveletDelete) -> Self {
        Self::MoveletDelete(v)
    }
}

impl From<MasterdataPoolUpdate> for Operation {
    fn from(v: MasterdataPoolUpdate) -> Self {
        Self::MasterdataPoolUpdate(v)
    }
}

impl From<DocumentPoolUpdate> for Operation {
    fn from(v: DocumentPoolUpdate) -> Self {
        Self::DocumentPoolUpdate(v)
    }
}

impl From<ParticipantReset> for Operation {
    fn from(v: ParticipantReset) -> Self {
        Self::ParticipantReset(v)
    }
}
