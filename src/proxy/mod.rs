//! Proxy module for fetching working proxies
//!
//! This module provides functionality for:
//! - Gathering candidates from several listing sources concurrently
//! - Filtering candidates by protocol and anonymity grade
//! - Validating candidates with a bounded number of concurrent probes
//! - Orchestrating the whole pipeline behind [`ProxyFetcher`]

pub mod connectivity;
pub mod fetcher;
pub mod filterer;
pub mod gatherer;
pub mod models;
pub mod parser;
pub mod probe;
pub mod provider;
pub mod sources;
pub mod validator;

pub use connectivity::{ConnectivityCheck, HttpConnectivityCheck};
pub use fetcher::{ProxyFetcher, ProxyFetcherBuilder};
pub use filterer::ProxyFilter;
pub use gatherer::{dedup, GathererConfig, ProxyGatherer};
pub use models::{
    Anonymity, Protocol, Proxy, ProxyAuth, ProxyKey, ValidationOutcome, ValidationStatus,
};
pub use parser::ProxyParser;
pub use probe::{judge_anonymity, HttpProbe, JudgeEcho, ProbeConfig, ProxyProbe};
pub use provider::{ProviderConfig, ProxyProvider};
pub use sources::{
    default_providers, GeonodeProvider, HtmlTableProvider, ProxyListDownloadProvider, TableLayout,
};
pub use validator::{ProxyValidator, ValidatorConfig};
