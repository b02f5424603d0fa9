//! `CallbackEndpoint` trait and the HTTP webhook implementation.
//!
//! `WebhookEndpoint` posts the request as JSON to the automation webhook
//! that places the outbound call.  The URL comes from [`CallbackConfig`];
//! nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CallbackConfig;

use super::form::CallbackRequest;

// ---------------------------------------------------------------------------
// CallbackError
// ---------------------------------------------------------------------------

/// Why a callback request did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// No webhook URL is configured.
    #[error("callback webhook URL is not configured")]
    NotConfigured,

    /// Connection, DNS, TLS or timeout failure.
    #[error("callback request failed: {0}")]
    Network(String),

    /// The webhook answered with a non-success status.
    #[error("callback webhook rejected the request with HTTP {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for CallbackError {
    fn from(e: reqwest::Error) -> Self {
        CallbackError::Network(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// CallbackEndpoint trait
// ---------------------------------------------------------------------------

/// Destination for callback requests.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn CallbackEndpoint>`.
#[async_trait]
pub trait CallbackEndpoint: Send + Sync {
    async fn post(&self, request: &CallbackRequest) -> Result<(), CallbackError>;
}

// ---------------------------------------------------------------------------
// WebhookEndpoint
// ---------------------------------------------------------------------------

/// Posts `{name, address, phone}` to an HTTP webhook.
pub struct WebhookEndpoint {
    client: reqwest::Client,
    url: String,
}

impl WebhookEndpoint {
    /// Build from config.  The HTTP client carries the per-request timeout
    /// from `config.timeout_secs`.
    pub fn from_config(config: &CallbackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.webhook_url.trim().to_string(),
        }
    }
}

#[async_trait]
impl CallbackEndpoint for WebhookEndpoint {
    async fn post(&self, request: &CallbackRequest) -> Result<(), CallbackError> {
        if self.url.is_empty() {
            return Err(CallbackError::NotConfigured);
        }

        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status();

        if status.is_success() {
            log::info!("callback webhook accepted request (HTTP {})", status.as_u16());
            Ok(())
        } else {
            Err(CallbackError::Rejected(status.as_u16()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request() -> CallbackRequest {
        CallbackRequest {
            name: "Ada".into(),
            address: "1 Main St".into(),
            phone: "+1 555".into(),
        }
    }

    #[tokio::test]
    async fn missing_url_is_not_configured() {
        let endpoint = WebhookEndpoint::from_config(&CallbackConfig::default());
        assert_eq!(endpoint.post(&request()).await, Err(CallbackError::NotConfigured));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let config = CallbackConfig {
            webhook_url: "http://127.0.0.1:1/hook".into(),
            timeout_secs: 2,
            ..CallbackConfig::default()
        };
        let endpoint = WebhookEndpoint::from_config(&config);
        assert!(matches!(endpoint.post(&request()).await, Err(CallbackError::Network(_))));
    }

    #[test]
    fn endpoint_is_object_safe() {
        let endpoint: Arc<dyn CallbackEndpoint> = Arc::new(WebhookEndpoint::from_config(&CallbackConfig::default()));
        drop(endpoint);
    }

    #[test]
    fn rejected_error_mentions_status() {
        assert!(CallbackError::Rejected(500).to_string().contains("500"));
    }
}
