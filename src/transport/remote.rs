// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Direct mode collaborator: the backend RPC.
//!
//! The generated service proxy lives outside this crate and implements
//! [`RemoteService`]. The client rebuilds an [`Endpoint`] from its config
//! snapshot before every send.
//!
//! # Example
//!
//! ```rust,no_run
//! use movilizer_outbox::protocol::{Request, Response};
//! use movilizer_outbox::transport::{BoxFuture, Endpoint, RemoteService};
//!
//! struct SoapProxy { /* ... */ }
//!
//! impl RemoteService for SoapProxy {
//!     fn submit_batch<'a>(
//!         &'a self,
//!         _request: &'a Request,
//!         _endpoint: &'a Endpoint,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move { Ok(Response::default()) })
//!     }
//! }
//! ```

use super::BoxFuture;
use crate::config::{ProxyCredentials, WebServiceConfig};
use crate::protocol::{Request, Response};
use std::time::Duration;
use tracing::debug;

/// Where and how to reach the backend for one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub proxy: Option<String>,
    /// `None` means use the default credentials.
    pub proxy_credentials: Option<ProxyCredentials>,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn from_config(config: &WebServiceConfig) -> Self {
        Self {
            url: config.url(),
            proxy: config.proxy.clone().filter(|p| !p.trim().is_empty()),
            proxy_credentials: config.proxy_credentials.clone(),
            timeout: config.timeout_duration(),
        }
    }
}

/// The backend's batch RPC.
pub trait RemoteService: Send + Sync + 'static {
    /// Submit one request and wait for the backend's response.
    fn submit_batch<'a>(&'a self, request: &'a Request, endpoint: &'a Endpoint)
        -> BoxFuture<'a, Response>;
}

/// A no-op remote for standalone use and tests.
///
/// Accepts every request and answers with an empty response.
pub struct NoOpRemote;

impl RemoteService for NoOpRemote {
    fn submit_batch<'a>(
        &'a self,
        request: &'a Request,
        endpoint: &'a Endpoint,
    ) -> BoxFuture<'a, Response> {
        debug!(
            url = %endpoint.url,
            operations = request.operation_count(),
            "NoOpRemote: submit_batch"
        );
        Box::pin(async { Ok(Response::default()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_config() {
        let config = WebServiceConfig {
            proxy: Some("http://squid:3128".to_string()),
            proxy_credentials: Some(ProxyCredentials {
                username: "svc".to_string(),
                password: "pw".to_string(),
                domain: None,
            }),
            ..WebServiceConfig::default()
        };
        let endpoint = Endpoint::from_config(&config);
        assert_eq!(
            endpoint.url,
            "https://movilizer.com/MovilizerDistributor/services/MovilizerDistributingWebService"
        );
        assert_eq!(endpoint.proxy.as_deref(), Some("http://squid:3128"));
        assert_eq!(endpoint.proxy_credentials.unwrap().username, "svc");
        assert_eq!(endpoint.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_endpoint_blank_proxy_is_none() {
        let config = WebServiceConfig {
            proxy: Some("  ".to_string()),
            ..WebServiceConfig::default()
        };
        assert!(Endpoint::from_config(&config).proxy.is_none());
    }

    #[tokio::test]
    async fn test_noop_remote_returns_empty_response() {
        let endpoint = Endpoint::from_config(&WebServiceConfig::for_testing());
        let response = NoOpRemote
            .submit_batch(&Request::default(), &endpoint)
            .await
            .unwrap();
        assert_eq!(response, Response::default());
    }
}
