//! Errors that cross the fetcher boundary

use thiserror::Error;

/// Failures a caller of [`crate::ProxyFetcher`] can observe.
///
/// Provider and probe failures never show up here; they are logged and
/// absorbed where they happen.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The host cannot reach the network. Raised once, when the fetcher is built.
    #[error("No internet connection")]
    NoInternetConnection,

    /// A completed run confirmed no proxies. Retrying or loosening filters may help.
    #[error("No proxies were found")]
    NoProxiesFound,
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
