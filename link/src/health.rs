//! Health probe gating reconnect attempts.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FeedLinkError, Result};

/// External check consulted before every automatic reconnect attempt.
///
/// Returning `false` postpones the attempt by the same delay, after which the
/// probe runs again.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    async fn check(&self) -> bool;
}

/// Probes an HTTP endpoint; any 2xx answer within the timeout is healthy.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    url: reqwest::Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(url.trim()).map_err(|e| {
            FeedLinkError::ConfigurationError(format!("Invalid health_check_url '{}': {}", url, e))
        })?;
        match url.scheme() {
            "http" | "https" => {},
            other => {
                return Err(FeedLinkError::ConfigurationError(format!(
                    "health_check_url must use http:// or https:// (found '{}')",
                    other
                )));
            },
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedLinkError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            url,
            client,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> bool {
        let request = self.client.get(self.url.clone()).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => true,
            Ok(Ok(response)) => {
                log::debug!("[feed-link] Health probe {} answered {}", self.url, response.status());
                false
            },
            Ok(Err(e)) => {
                log::debug!("[feed-link] Health probe {} failed: {}", self.url, e);
                false
            },
            Err(_) => {
                log::debug!(
                    "[feed-link] Health probe {} timed out after {:?}",
                    self.url,
                    self.timeout
                );
                false
            },
        }
    }
}
