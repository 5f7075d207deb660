//! Proxy Fetcher - find working public proxies
//!
//! Candidates are gathered from several public listings at once, deduplicated
//! by address, filtered by protocol and anonymity grade, and validated
//! concurrently until the requested number of working proxies is found.

pub mod error;
pub mod logging;
pub mod proxy;

pub use error::{FetchError, FetchResult};
pub use logging::configure;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
