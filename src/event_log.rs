// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sink for backend-reported events.
//!
//! Every status message and movelet error in a response is forwarded here,
//! one call per item, status messages first. Calls are fire-and-forget.
//! Pipeline errors and warnings go to `tracing` directly, not through this
//! trait.

use crate::protocol::{MoveletError, StatusMessage};
use tracing::{info, warn};

/// Receiver of status messages and movelet errors.
pub trait EventLog: Send + Sync + 'static {
    fn status_message(&self, message: &StatusMessage);

    fn movelet_error(&self, error: &MoveletError);
}

/// Default sink: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn status_message(&self, message: &StatusMessage) {
        info!(
            message_type = message.message_type,
            text = %message.message,
            "Backend status message"
        );
    }

    fn movelet_error(&self, error: &MoveletError) {
        warn!(
            movelet_key = %error.movelet_key,
            movelet_key_extension = error.movelet_key_extension.as_deref().unwrap_or(""),
            text = %error.message,
            "Backend reported movelet error"
        );
    }
}
