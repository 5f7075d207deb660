//! Concurrent collection of candidates from every provider

use crate::proxy::models::{Proxy, ProxyKey};
use crate::proxy::provider::ProxyProvider;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on a single provider call in seconds
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Configuration for the gatherer
#[derive(Debug, Clone)]
pub struct GathererConfig {
    /// How long one provider may take before it is treated as empty
    pub provider_timeout: Duration,
}

impl Default for GathererConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }
}

impl GathererConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }
}

/// Runs all providers at once and merges what they list
#[derive(Clone)]
pub struct ProxyGatherer {
    providers: Vec<Arc<dyn ProxyProvider>>,
    config: GathererConfig,
}

impl ProxyGatherer {
    pub fn new(providers: Vec<Arc<dyn ProxyProvider>>) -> Self {
        Self::with_config(providers, GathererConfig::default())
    }

    pub fn with_config(providers: Vec<Arc<dyn ProxyProvider>>, config: GathererConfig) -> Self {
        Self { providers, config }
    }

    /// Gather from every provider concurrently and return unique candidates.
    ///
    /// Order of the result is unspecified.
    pub async fn gather(&self) -> Vec<Proxy> {
        tracing::debug!("Gathering proxies from {} providers", self.providers.len());

        let width = self.providers.len().max(1);
        let mut merged: HashMap<ProxyKey, Proxy> = HashMap::new();

        let mut batches = stream::iter(&self.providers)
            .map(|provider| self.run_provider(provider))
            .buffer_unordered(width);

        while let Some(batch) = batches.next().await {
            merge_into(&mut merged, batch);
        }

        tracing::debug!("Finished gathering, {} unique proxies", merged.len());
        merged.into_values().collect()
    }

    async fn run_provider(&self, provider: &Arc<dyn ProxyProvider>) -> Vec<Proxy> {
        match tokio::time::timeout(self.config.provider_timeout, provider.gather()).await {
            Ok(proxies) => proxies,
            Err(_) => {
                tracing::warn!(
                    "Provider {} timed out after {:?}",
                    provider.name(),
                    self.config.provider_timeout
                );
                Vec::new()
            }
        }
    }
}

fn merge_into(merged: &mut HashMap<ProxyKey, Proxy>, proxies: Vec<Proxy>) {
    for proxy in proxies {
        match merged.get_mut(&proxy.key()) {
            Some(existing) => existing.merge(proxy),
            None => {
                merged.insert(proxy.key(), proxy);
            }
        }
    }
}

/// Collapse candidates sharing a `(host, port)` into one representative each.
///
/// See [`Proxy::merge`] for how their claims are combined.
pub fn dedup<I>(proxies: I) -> Vec<Proxy>
where
    I: IntoIterator<Item = Proxy>,
{
    let mut merged = HashMap::new();
    merge_into(&mut merged, proxies.into_iter().collect());
    merged.into_values().collect()
}
