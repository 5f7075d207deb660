//! Gather → filter → validate orchestration

use crate::error::{FetchError, FetchResult};
use crate::proxy::connectivity::{ConnectivityCheck, HttpConnectivityCheck};
use crate::proxy::filterer::ProxyFilter;
use crate::proxy::gatherer::{GathererConfig, ProxyGatherer};
use crate::proxy::models::{Anonymity, Protocol, Proxy};
use crate::proxy::provider::{ProviderConfig, ProxyProvider};
use crate::proxy::sources::default_providers;
use crate::proxy::validator::ProxyValidator;
use std::fmt;
use std::sync::Arc;

/// Pipeline stage, reported in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Gathering,
    Filtering,
    Validating,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Gathering => "gathering",
            Stage::Filtering => "filtering",
            Stage::Validating => "validating",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

fn enter(stage: Stage, candidates: usize) {
    tracing::debug!(%stage, candidates, "Entering {} with {} candidates", stage, candidates);
}

/// Fetches working proxies from the configured providers.
///
/// Building one checks connectivity once; if the host is offline no fetcher
/// is produced and no provider is ever called.
#[derive(Clone)]
pub struct ProxyFetcher {
    gatherer: ProxyGatherer,
    validator: ProxyValidator,
}

impl ProxyFetcher {
    /// Build a fetcher from explicit collaborators
    pub async fn new(
        gatherer: ProxyGatherer,
        validator: ProxyValidator,
        connectivity: &dyn ConnectivityCheck,
    ) -> FetchResult<Self> {
        if !connectivity.is_online().await {
            tracing::warn!("No internet connection, not starting");
            return Err(FetchError::NoInternetConnection);
        }

        Ok(Self {
            gatherer,
            validator,
        })
    }

    /// Builder preloaded with the built-in providers, HTTP probe and HTTP
    /// connectivity check
    pub fn builder() -> ProxyFetcherBuilder {
        ProxyFetcherBuilder::default()
    }

    /// Fetch a single working proxy
    pub async fn get_one(
        &self,
        protocols: &[Protocol],
        anonymities: &[Anonymity],
    ) -> FetchResult<Proxy> {
        self.get(protocols, anonymities, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(FetchError::NoProxiesFound)
    }

    /// Fetch working proxies.
    ///
    /// Empty `protocols` or `anonymities` place no constraint on that axis.
    /// `limit == 0` returns everything that validates; otherwise at most
    /// `limit` proxies are returned. An empty result is reported as
    /// [`FetchError::NoProxiesFound`].
    pub async fn get(
        &self,
        protocols: &[Protocol],
        anonymities: &[Anonymity],
        limit: usize,
    ) -> FetchResult<Vec<Proxy>> {
        let filter = ProxyFilter::new(protocols, anonymities);
        self.run(&filter, limit).await
    }

    async fn run(&self, filter: &ProxyFilter, limit: usize) -> FetchResult<Vec<Proxy>> {
        tracing::debug!("Proxies gather started");

        enter(Stage::Gathering, 0);
        let candidates = self.gatherer.gather().await;

        enter(Stage::Filtering, candidates.len());
        let filtered = filter.filter(candidates);

        enter(Stage::Validating, filtered.len());
        let confirmed = self
            .validator
            .validate_matching(filtered, limit, |observed| filter.matches(observed))
            .await;

        if confirmed.is_empty() {
            enter(Stage::Failed, 0);
            return Err(FetchError::NoProxiesFound);
        }

        enter(Stage::Done, confirmed.len());
        tracing::debug!(
            "Finished proxies gather, {} proxies were found",
            confirmed.len()
        );
        Ok(confirmed)
    }
}

/// Assembles a [`ProxyFetcher`], defaulting every collaborator it is not given
#[derive(Default)]
pub struct ProxyFetcherBuilder {
    providers: Option<Vec<Arc<dyn ProxyProvider>>>,
    provider_config: ProviderConfig,
    gatherer_config: GathererConfig,
    validator: Option<ProxyValidator>,
    connectivity: Option<Arc<dyn ConnectivityCheck>>,
}

impl ProxyFetcherBuilder {
    /// Replace the built-in providers
    pub fn providers(mut self, providers: Vec<Arc<dyn ProxyProvider>>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Configuration for the built-in providers; ignored when providers are replaced
    pub fn provider_config(mut self, config: ProviderConfig) -> Self {
        self.provider_config = config;
        self
    }

    pub fn gatherer_config(mut self, config: GathererConfig) -> Self {
        self.gatherer_config = config;
        self
    }

    pub fn validator(mut self, validator: ProxyValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn ConnectivityCheck>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Check connectivity and build the fetcher
    pub async fn build(self) -> FetchResult<ProxyFetcher> {
        let providers = self
            .providers
            .unwrap_or_else(|| default_providers(&self.provider_config));
        let gatherer = ProxyGatherer::with_config(providers, self.gatherer_config);
        let validator = self.validator.unwrap_or_default();
        let connectivity: Arc<dyn ConnectivityCheck> = match self.connectivity {
            Some(connectivity) => connectivity,
            None => Arc::new(HttpConnectivityCheck::new()),
        };

        ProxyFetcher::new(gatherer, validator, connectivity.as_ref()).await
    }
}
