//! Provider capability and shared HTTP plumbing for listing sources

use crate::proxy::models::Proxy;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Default timeout for listing requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for listing requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A source of proxy candidates.
///
/// `gather` must not fail: a provider that cannot reach or parse its feed
/// logs the problem and returns an empty list.
#[async_trait]
pub trait ProxyProvider: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// Fetch every candidate this source currently lists
    async fn gather(&self) -> Vec<Proxy>;
}

/// Configuration shared by the built-in providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Build the HTTP client the built-in providers fetch with
    pub(crate) fn build_client(&self) -> Result<Client> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()?;

        Ok(client)
    }
}

/// Fetch a listing page as text, failing on non-success statuses
pub(crate) async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Run a fallible gather and turn any error into an empty contribution
pub(crate) fn absorb(name: &str, result: Result<Vec<Proxy>>) -> Vec<Proxy> {
    match result {
        Ok(proxies) => {
            tracing::debug!("{} listed {} proxies", name, proxies.len());
            proxies
        }
        Err(e) => {
            tracing::warn!("Provider {} failed: {:#}", name, e);
            Vec::new()
        }
    }
}
