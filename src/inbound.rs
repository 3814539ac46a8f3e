// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inbound router: FIFO of reply objects produced by the backend.
//!
//! Populated only during response ingestion, on the same owner that drives
//! the send cycle, so dequeueing never waits.

use crate::protocol::{ReplyMovelet, Response, UploadDataContainer};
use std::collections::VecDeque;

/// One object handed back to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyObject {
    ReplyMovelet(ReplyMovelet),
    UploadContainer(UploadDataContainer),
}

impl ReplyObject {
    pub fn device_address(&self) -> &str {
        match self {
            Self::ReplyMovelet(reply) => &reply.device_address,
            Self::UploadContainer(container) => &container.device_address,
        }
    }
}

/// FIFO of reply objects, oldest first.
#[derive(Debug, Default)]
pub struct InboundQueue {
    items: VecDeque<ReplyObject>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, item: ReplyObject) {
        self.items.push_back(item);
    }

    /// Append every reply movelet, then every upload container, in response order.
    ///
    /// Returns how many objects were appended.
    pub fn enqueue_response(&mut self, response: &Response) -> usize {
        let before = self.items.len();
        self.items.extend(
            response
                .reply_movelets
                .iter()
                .cloned()
                .map(ReplyObject::ReplyMovelet),
        );
        self.items.extend(
            response
                .upload_containers
                .iter()
                .cloned()
                .map(ReplyObject::UploadContainer),
        );
        self.items.len() - before
    }

    /// Oldest object, or `None` when empty. Never blocks.
    pub fn dequeue(&mut self) -> Option<ReplyObject> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
