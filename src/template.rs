// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pool update templates.
//!
//! Collects incremental edits to a named pool and collapses them into a single
//! pool update at compose time, with key deduplication (latest wins).
//!
//! # Design
//!
//! ```text
//! update(k, v1) ──┐
//! update(k, v2) ──┼──▶ BTreeMap<key, entry> ──┐
//! delete(j)     ──┘    BTreeSet<delete>      ├──▶ finalize() ──▶ one PoolUpdate
//!                                            │
//! TemplateRegistry<T>: pool name ─▶ T ───────┘   (one live template per pool)
//! ```
//!
//! An update cancels a pending delete of the same key and a delete drops a
//! pending update of the same key, so the finalized operation never carries
//! contradicting edits for one key.

use crate::model::{
    DocumentEntry, DocumentPoolUpdate, MasterdataDelete, MasterdataEntry, MasterdataPoolUpdate,
    Operation, OperationKind,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A mutable builder for one pool, finalized into exactly one [`Operation`].
pub trait PoolTemplate {
    /// Create an empty template for `pool`.
    fn for_pool(pool: &str) -> Self;

    /// Operation kind produced by [`finalize`](Self::finalize).
    fn kind() -> OperationKind;

    /// Convert the accumulated edits into a pool update operation.
    fn finalize(self) -> Operation;
}

/// Accumulates edits to a masterdata pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterdataPoolTemplate {
    pool: String,
    updates: BTreeMap<String, MasterdataEntry>,
    deletes: BTreeSet<MasterdataDelete>,
}

impl MasterdataPoolTemplate {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            updates: BTreeMap::new(),
            deletes: BTreeSet::new(),
        }
    }

    /// Insert or replace an entry. The latest edit for a key wins.
    pub fn update(&mut self, entry: MasterdataEntry) -> &mut Self {
        self.deletes.remove(&MasterdataDelete::Key(entry.key.clone()));
        self.updates.insert(entry.key.clone(), entry);
        self
    }

    /// Delete one entry by key.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.updates.remove(&key);
        self.deletes.insert(MasterdataDelete::Key(key));
        self
    }

    /// Delete every entry of a group.
    ///
    /// Pending updates in that group are dropped as well.
    pub fn delete_group(&mut self, group: impl Into<String>) -> &mut Self {
        let group = group.into();
        self.updates
            .retain(|_, entry| entry.group.as_deref() != Some(group.as_str()));
        self.deletes.insert(MasterdataDelete::Group(group));
        self
    }

    pub fn pending_update(&self, key: &str) -> Option<&MasterdataEntry> {
        self.updates.get(key)
    }

    /// Number of distinct edits (updates + deletes).
    pub fn len(&self) -> usize {
        self.updates.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn to_pool_update(&self) -> MasterdataPoolUpdate {
        MasterdataPoolUpdate {
            pool: self.pool.clone(),
            updates: self.updates.values().cloned().collect(),
            deletes: self.deletes.iter().cloned().collect(),
        }
    }
}

impl PoolTemplate for MasterdataPoolTemplate {
    fn for_pool(pool: &str) -> Self {
        Self::new(pool)
    }

    fn kind() -> OperationKind {
        OperationKind::MasterdataPoolUpdate
    }

    fn finalize(self) -> Operation {
        Operation::MasterdataPoolUpdate(MasterdataPoolUpdate {
            pool: self.pool,
            updates: self.updates.into_values().collect(),
            deletes: self.deletes.into_iter().collect(),
        })
    }
}

/// Accumulates edits to a document pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPoolTemplate {
    pool: String,
    updates: BTreeMap<String, DocumentEntry>,
    deletes: BTreeSet<String>,
}

impl DocumentPoolTemplate {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            updates: BTreeMap::new(),
            deletes: BTreeSet::new(),
        }
    }

    /// Insert or replace a document. The latest edit for a key wins.
    pub fn update(&mut self, document: DocumentEntry) -> &mut Self {
        self.deletes.remove(&document.key);
        self.updates.insert(document.key.clone(), document);
        self
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.updates.remove(&key);
        self.deletes.insert(key);
        self
    }

    pub fn pending_update(&self, key: &str) -> Option<&DocumentEntry> {
        self.updates.get(key)
    }

    pub fn len(&self) -> usize {
        self.updates.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn to_pool_update(&self) -> DocumentPoolUpdate {
        DocumentPoolUpdate {
            pool: self.pool.clone(),
            updates: self.updates.values().cloned().collect(),
            deletes: self.deletes.iter().cloned().collect(),
        }
    }
}

impl PoolTemplate for DocumentPoolTemplate {
    fn for_pool(pool: &str) -> Self {
        Self::new(pool)
    }

    fn kind() -> OperationKind {
        OperationKind::DocumentPoolUpdate
    }

    fn finalize(self) -> Operation {
        Operation::DocumentPoolUpdate(DocumentPoolUpdate {
            pool: self.pool,
            updates: self.updates.into_values().collect(),
            deletes: self.deletes.into_iter().collect(),
        })
    }
}

/// Registry of live templates of one kind, keyed by pool name.
///
/// Holds at most one template per pool name. Drains in registration order.
#[derive(Debug)]
pub struct TemplateRegistry<T: PoolTemplate> {
    templates: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: PoolTemplate> Default for TemplateRegistry<T> {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: PoolTemplate> TemplateRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live template for `pool`, registering an empty one first if needed.
    pub fn get_or_create(&mut self, pool: &str) -> &mut T {
        let slot = match self.index.get(pool) {
            Some(&slot) => slot,
            None => {
                self.templates.push(T::for_pool(pool));
                let slot = self.templates.len() - 1;
                self.index.insert(pool.to_string(), slot);
                slot
            }
        };
        &mut self.templates[slot]
    }

    pub fn get(&self, pool: &str) -> Option<&T> {
        self.index.get(pool).map(|&slot| &self.templates[slot])
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Finalize every template into one operation each and clear the registry.
    pub fn drain(&mut self) -> Vec<Operation> {
        self.index.clear();
        std::mem::take(&mut self.templates)
            .into_iter()
            .map(PoolTemplate::finalize)
            .collect()
    }
}
