// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the outbox client.
//!
//! The configuration is a read-only snapshot captured by
//! [`OutboxClient::new()`](crate::OutboxClient::new). It can be constructed
//! programmatically or deserialized from JSON; the client never re-reads it
//! during a send cycle.
//!
//! # Quick Start
//!
//! ```rust
//! use movilizer_outbox::config::OutboxConfig;
//!
//! let config = OutboxConfig {
//!     system_id: 12345,
//!     system_password: "secret".into(),
//!     force_requeue_on_error: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! OutboxConfig
//! ├── system_id / system_password   # Backend session identity
//! ├── web_service: WebServiceConfig # Direct mode endpoint
//! ├── queue_relay: QueueRelayConfig # Queue relay mode (enabled = use it)
//! ├── retry: DirectRetryConfig      # Direct mode attempt budget
//! ├── debug_output_path             # Dump every request here if set
//! ├── force_requeue_on_error        # Recovery on direct mode exhaustion
//! └── num_responses                 # Reply objects per request
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "system_id": 12345,
//!   "system_password": "secret",
//!   "web_service": { "protocol": "https", "host": "movilizer.com", "timeout": "5m" },
//!   "queue_relay": { "enabled": true, "request_queue": "requests", "response_queue": "responses" },
//!   "force_requeue_on_error": true
//! }
//! ```

use crate::error::{OutboxError, Result};
use crate::resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the request dump written under `debug_output_path`.
pub const DEBUG_REQUEST_FILE: &str = "MovilizerRequest.json";

/// Top-level configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    /// Backend system id stamped on every request.
    pub system_id: i64,

    /// Backend system password stamped on every request.
    pub system_password: String,

    /// Direct mode endpoint.
    #[serde(default)]
    pub web_service: WebServiceConfig,

    /// Queue relay mode. When enabled, direct mode is never used.
    #[serde(default)]
    pub queue_relay: QueueRelayConfig,

    /// Direct mode retry budget.
    #[serde(default)]
    pub retry: DirectRetryConfig,

    /// Directory receiving a copy of every composed request.
    #[serde(default)]
    pub debug_output_path: Option<PathBuf>,

    /// Requeue a batch locally when direct mode exhausts its retries.
    #[serde(default = "default_false")]
    pub force_requeue_on_error: bool,

    /// Maximum reply objects requested per cycle.
    #[serde(default = "default_num_responses")]
    pub num_responses: u32,
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_num_responses() -> u32 {
    1000
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            system_id: 0,
            system_password: String::new(),
            web_service: WebServiceConfig::default(),
            queue_relay: QueueRelayConfig::default(),
            retry: DirectRetryConfig::default(),
            debug_output_path: None,
            force_requeue_on_error: false,
            num_responses: 1000,
        }
    }
}

impl OutboxConfig {
    /// Create a minimal config for testing: direct mode, fast retries.
    pub fn for_testing(system_id: i64) -> Self {
        Self {
            system_id,
            system_password: "test-password".to_string(),
            web_service: WebServiceConfig::for_testing(),
            retry: DirectRetryConfig::for_testing(),
            ..Default::default()
        }
    }

    /// Parse a JSON snapshot and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| OutboxError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject snapshots the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_relay.enabled {
            if self.queue_relay.request_queue.trim().is_empty() {
                return Err(OutboxError::Config(
                    "queue relay enabled without a request queue".to_string(),
                ));
            }
            if self.queue_relay.response_queue.trim().is_empty() {
                return Err(OutboxError::Config(
                    "queue relay enabled without a response queue".to_string(),
                ));
            }
            if self.queue_relay.request_queue.trim() == self.queue_relay.response_queue.trim() {
                return Err(OutboxError::Config(format!(
                    "request and response queue must differ (both {:?})",
                    self.queue_relay.request_queue.trim()
                )));
            }
        } else if self.web_service.host.trim().is_empty() {
            return Err(OutboxError::Config(
                "direct mode requires a web service host".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(OutboxError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport mode selected by this snapshot.
    pub fn transport_mode(&self) -> TransportMode {
        if self.queue_relay.enabled {
            TransportMode::QueueRelay
        } else {
            TransportMode::Direct
        }
    }

    /// Full path of the request dump, if dumping is configured.
    pub fn debug_request_path(&self) -> Option<PathBuf> {
        self.debug_output_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
            .map(|path| path.join(DEBUG_REQUEST_FILE))
    }
}

/// How a composed request reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Synchronous RPC with bounded retry.
    Direct,
    /// Transactional handoff through a request and a response queue.
    QueueRelay,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Direct => write!(f, "direct"),
            TransportMode::QueueRelay => write!(f, "queue_relay"),
        }
    }
}

/// Credentials for an authenticating proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Direct mode endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebServiceConfig {
    /// "https" or "http".
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Backend host, e.g. "movilizer.com".
    #[serde(default)]
    pub host: String,

    /// Service path appended to the host.
    #[serde(default = "default_path")]
    pub path: String,

    /// Proxy URL, if any.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Proxy credentials; `None` uses the default credentials.
    #[serde(default)]
    pub proxy_credentials: Option<ProxyCredentials>,

    /// Per-call timeout as a duration string (e.g., "5m").
    #[serde(default = "default_request_timeout")]
    pub timeout: String,
}

fn default_protocol() -> String {
    "https".to_string()
}

fn default_path() -> String {
    "/MovilizerDistributor/services/MovilizerDistributingWebService".to_string()
}

fn default_request_timeout() -> String {
    "5m".to_string()
}

impl Default for WebServiceConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: "movilizer.com".to_string(),
            path: default_path(),
            proxy: None,
            proxy_credentials: None,
            timeout: default_request_timeout(),
        }
    }
}

impl WebServiceConfig {
    pub fn for_testing() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost:8080".to_string(),
            ..Default::default()
        }
    }

    /// Endpoint URL built from protocol, host and path.
    pub fn url(&self) -> String {
        let path = if self.path.is_empty() || self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}{}", self.protocol, self.host.trim_end_matches('/'), path)
    }

    /// Parse the timeout string to a Duration.
    pub fn timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.timeout).unwrap_or(Duration::from_secs(300))
    }
}

/// Queue relay mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRelayConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// Queue receiving composed requests.
    #[serde(default)]
    pub request_queue: String,

    /// Queue delivering backend responses.
    #[serde(default)]
    pub response_queue: String,

    /// Receive wait as a duration string (e.g., "10s").
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout: String,
}

fn default_receive_timeout() -> String {
    "10s".to_string()
}

impl Default for QueueRelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            request_queue: String::new(),
            response_queue: String::new(),
            receive_timeout: default_receive_timeout(),
        }
    }
}

impl QueueRelayConfig {
    /// Enabled relay over the two named queues.
    pub fn enabled(request_queue: &str, response_queue: &str) -> Self {
        Self {
            enabled: true,
            request_queue: request_queue.to_string(),
            response_queue: response_queue.to_string(),
            ..Default::default()
        }
    }

    /// Parse the receive timeout string to a Duration.
    pub fn receive_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.receive_timeout).unwrap_or(Duration::from_secs(10))
    }
}

/// Direct mode attempt budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectRetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Fixed wait between attempts as a duration string (e.g., "10s").
    #[serde(default = "default_retry_delay")]
    pub delay: String,

    /// Whether retrying is allowed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_delay() -> String {
    "10s".to_string()
}

impl Default for DirectRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: default_retry_delay(),
            enabled: true,
        }
    }
}

impl DirectRetryConfig {
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            delay: "10ms".to_string(),
            enabled: true,
        }
    }

    /// Parse the delay string to a Duration.
    pub fn delay_duration(&self) -> Duration {
        humantime::parse_duration(&self.delay).unwrap_or(Duration::from_secs(10))
    }

    /// Retry policy for direct mode.
    pub fn retry_config(&self) -> RetryConfig {
        if self.enabled {
            RetryConfig::fixed(self.max_attempts, self.delay_duration())
        } else {
            RetryConfig::fixed(1, Duration::ZERO)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
