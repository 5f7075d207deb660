//! Protocol and anonymity filtering of candidates

use crate::proxy::models::{Anonymity, Protocol, Proxy};
use std::collections::HashSet;

/// Allowed protocols and anonymity grades.
///
/// An empty set on either axis places no constraint on that axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyFilter {
    pub protocols: HashSet<Protocol>,
    pub anonymities: HashSet<Anonymity>,
}

impl ProxyFilter {
    pub fn new(protocols: &[Protocol], anonymities: &[Anonymity]) -> Self {
        Self {
            protocols: protocols.iter().copied().collect(),
            anonymities: anonymities.iter().copied().collect(),
        }
    }

    /// True when the filter lets every candidate through
    pub fn is_unconstrained(&self) -> bool {
        self.protocols.is_empty() && self.anonymities.is_empty()
    }

    /// Whether a single candidate passes both axes.
    ///
    /// A candidate whose grade is still unknown only passes when no grade
    /// is requested.
    pub fn matches(&self, proxy: &Proxy) -> bool {
        let protocol_ok = self.protocols.is_empty()
            || proxy.protocols.iter().any(|p| self.protocols.contains(p));

        let anonymity_ok = self.anonymities.is_empty()
            || proxy
                .anonymity
                .is_some_and(|grade| self.anonymities.contains(&grade));

        protocol_ok && anonymity_ok
    }

    /// Keep the candidates that pass
    pub fn filter(&self, proxies: Vec<Proxy>) -> Vec<Proxy> {
        if self.is_unconstrained() {
            return proxies;
        }

        proxies.into_iter().filter(|p| self.matches(p)).collect()
    }
}
