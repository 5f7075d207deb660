//! Network reachability preflight

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_CHECK_URL: &str = "https://www.google.com";

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Answers whether the host can currently reach the network
#[async_trait]
pub trait ConnectivityCheck: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Treats any HTTP response from a well-known site as being online
#[derive(Debug, Clone)]
pub struct HttpConnectivityCheck {
    url: String,
    timeout: Duration,
}

impl HttpConnectivityCheck {
    pub fn new() -> Self {
        Self {
            url: DEFAULT_CHECK_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpConnectivityCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectivityCheck for HttpConnectivityCheck {
    async fn is_online(&self) -> bool {
        let client = match Client::builder().timeout(self.timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Could not build connectivity client: {}", e);
                return false;
            }
        };

        match client.head(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Connectivity check against {} failed: {}", self.url, e);
                false
            }
        }
    }
}
