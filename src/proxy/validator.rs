//! Concurrent validation of candidates with an early-stop quota

use crate::proxy::models::{Proxy, ValidationOutcome, ValidationStatus};
use crate::proxy::probe::{HttpProbe, ProxyProbe};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Default overall budget for probing one candidate in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 50;

/// Configuration for proxy validation
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Budget for a whole probe; exceeding it rejects the candidate
    pub timeout: Duration,
    /// Number of probes in flight at once, regardless of candidate count
    pub concurrency: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ValidatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Validates candidates through a [`ProxyProbe`]
#[derive(Clone)]
pub struct ProxyValidator {
    config: ValidatorConfig,
    probe: Arc<dyn ProxyProbe>,
}

impl ProxyValidator {
    /// Create a validator using the HTTP probe and default configuration
    pub fn new() -> Self {
        Self::with_probe(Arc::new(HttpProbe::new()), ValidatorConfig::default())
    }

    /// Create a validator with a custom probe and configuration
    pub fn with_probe(probe: Arc<dyn ProxyProbe>, config: ValidatorConfig) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Probe one candidate under the validator's time budget
    pub async fn check(&self, proxy: Proxy) -> ValidationOutcome {
        match tokio::time::timeout(self.config.timeout, self.probe.probe(&proxy)).await {
            Ok(outcome) => outcome,
            Err(_) => ValidationOutcome::timeout(proxy),
        }
    }

    /// Probe candidates concurrently and return the ones that work.
    ///
    /// With `limit == 0` every candidate is probed. Otherwise this returns as
    /// soon as `limit` confirmations have arrived; probes still in flight are
    /// dropped and the rest are never started. Results are in completion order.
    pub async fn validate(&self, candidates: Vec<Proxy>, limit: usize) -> Vec<Proxy> {
        self.validate_matching(candidates, limit, |_| true).await
    }

    /// Like [`ProxyValidator::validate`], but a confirmed proxy is only kept
    /// when `accept` holds for what the probe observed. Discarded
    /// confirmations do not count toward `limit`.
    pub async fn validate_matching<F>(
        &self,
        candidates: Vec<Proxy>,
        limit: usize,
        accept: F,
    ) -> Vec<Proxy>
    where
        F: Fn(&Proxy) -> bool,
    {
        if candidates.is_empty() {
            return Vec::new();
        }

        let total = candidates.len();
        tracing::debug!(
            "Validating {} candidates (limit {}, concurrency {})",
            total,
            limit,
            self.config.concurrency
        );

        let mut outcomes = stream::iter(candidates)
            .map(|proxy| self.check(proxy))
            .buffer_unordered(self.config.concurrency.max(1));

        let mut confirmed = Vec::new();
        let mut probed = 0usize;
        while let Some(outcome) = outcomes.next().await {
            probed += 1;
            match &outcome.status {
                ValidationStatus::Confirmed => {
                    tracing::debug!(
                        "{} confirmed in {}ms",
                        outcome.proxy,
                        outcome.response_time_ms.unwrap_or_default()
                    );
                }
                ValidationStatus::Rejected(reason) => {
                    tracing::debug!("{} rejected: {}", outcome.proxy, reason);
                }
                ValidationStatus::Timeout => {
                    tracing::debug!("{} timed out", outcome.proxy);
                }
            }

            if let Some(proxy) = outcome.into_confirmed() {
                if !accept(&proxy) {
                    tracing::debug!("{} works but no longer matches the filter", proxy);
                    continue;
                }
                confirmed.push(proxy);
                if limit > 0 && confirmed.len() >= limit {
                    tracing::debug!(
                        "Quota of {} reached after {} of {} probes",
                        limit,
                        probed,
                        total
                    );
                    break;
                }
            }
        }

        confirmed
    }
}

impl Default for ProxyValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::Protocol;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Confirms hosts listed in `good`, rejects the rest; `slow` hosts sleep first
    struct ScriptedProbe {
        good: HashSet<String>,
        slow: HashSet<String>,
        delay: Duration,
        started: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(good: &[&str]) -> Self {
            Self {
                good: good.iter().map(|h| h.to_string()).collect(),
                slow: HashSet::new(),
                delay: Duration::ZERO,
                started: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_slow(mut self, slow: &[&str], delay: Duration) -> Self {
            self.slow = slow.iter().map(|h| h.to_string()).collect();
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ProxyProbe for ScriptedProbe {
        async fn probe(&self, proxy: &Proxy) -> ValidationOutcome {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.slow.contains(&proxy.host) {
                tokio::time::sleep(self.delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.good.contains(&proxy.host) {
                ValidationOutcome::confirmed(proxy.clone(), 1)
            } else {
                ValidationOutcome::rejected(proxy.clone(), "refused".to_string())
            }
        }
    }

    fn candidates(hosts: &[&str]) -> Vec<Proxy> {
        hosts
            .iter()
            .map(|h| Proxy::new(h.to_string(), 8080, Protocol::Http))
            .collect()
    }

    fn validator(probe: Arc<ScriptedProbe>, config: ValidatorConfig) -> ProxyValidator {
        ProxyValidator::with_probe(probe, config)
    }

    #[test]
    fn test_validator_config_default() {
        let config = ValidatorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_validator_config_builder() {
        let config = ValidatorConfig::new()
            .with_timeout(Duration::from_secs(30))
            .with_concurrency(20);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.concurrency, 20);

        let validator = ProxyValidator::with_probe(Arc::new(HttpProbe::new()), config);
        assert_eq!(validator.config().concurrency, 20);
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_output() {
        let probe = Arc::new(ScriptedProbe::new(&[]));
        let result = validator(probe.clone(), ValidatorConfig::default())
            .validate(Vec::new(), 0)
            .await;
        assert!(result.is_empty());
        assert_eq!(probe.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unlimited_returns_every_passing_candidate() {
        let hosts: Vec<String> = (0..40).map(|i| format!("10.0.0.{}", i)).collect();
        let host_refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
        let good: Vec<&str> = host_refs.iter().copied().step_by(3).collect();

        let probe = Arc::new(ScriptedProbe::new(&good));
        let result = validator(probe.clone(), ValidatorConfig::new().with_concurrency(7))
            .validate(candidates(&host_refs), 0)
            .await;

        let returned: HashSet<&str> = result.iter().map(|p| p.host.as_str()).collect();
        let expected: HashSet<&str> = good.into_iter().collect();
        assert_eq!(returned, expected);
        assert_eq!(result.len(), expected.len());
        assert_eq!(probe.started.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let hosts: Vec<String> = (0..30).map(|i| format!("10.1.0.{}", i)).collect();
        let host_refs: Vec<&str> = hosts.iter().map(String::as_str).collect();

        let probe = Arc::new(
            ScriptedProbe::new(&host_refs).with_slow(&host_refs, Duration::from_millis(5)),
        );
        validator(probe.clone(), ValidatorConfig::new().with_concurrency(4))
            .validate(candidates(&host_refs), 0)
            .await;

        assert!(probe.max_in_flight.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_limit_one_does_not_wait_for_slow_probes() {
        let probe = Arc::new(
            ScriptedProbe::new(&["1.1.1.1", "2.2.2.2", "3.3.3.3"])
                .with_slow(&["2.2.2.2", "3.3.3.3"], Duration::from_secs(3600)),
        );
        let validator = validator(
            probe,
            ValidatorConfig::new().with_timeout(Duration::from_secs(7200)),
        );

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            validator.validate(candidates(&["2.2.2.2", "3.3.3.3", "1.1.1.1"]), 1),
        )
        .await
        .expect("validation should stop at the first confirmation");

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].host, "1.1.1.1");
    }

    #[tokio::test]
    async fn test_limit_stops_starting_new_probes() {
        let hosts: Vec<String> = (0..50).map(|i| format!("10.2.0.{}", i)).collect();
        let host_refs: Vec<&str> = hosts.iter().map(String::as_str).collect();

        let probe = Arc::new(ScriptedProbe::new(&host_refs));
        let result = validator(probe.clone(), ValidatorConfig::new().with_concurrency(2))
            .validate(candidates(&host_refs), 3)
            .await;

        assert_eq!(result.len(), 3);
        assert!(probe.started.load(Ordering::SeqCst) < 50);
    }

    #[tokio::test]
    async fn test_limit_larger_than_passing_set() {
        let probe = Arc::new(ScriptedProbe::new(&["1.1.1.1"]));
        let result = validator(probe, ValidatorConfig::default())
            .validate(candidates(&["1.1.1.1", "2.2.2.2", "3.3.3.3"]), 5)
            .await;
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_discarded_confirmations_do_not_fill_the_quota() {
        let probe = Arc::new(
            ScriptedProbe::new(&["1.1.1.1", "2.2.2.2", "3.3.3.3"])
                .with_slow(&["3.3.3.3"], Duration::from_millis(20)),
        );
        let result = validator(probe, ValidatorConfig::default())
            .validate_matching(candidates(&["1.1.1.1", "2.2.2.2", "3.3.3.3"]), 1, |p| {
                p.host == "3.3.3.3"
            })
            .await;

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].host, "3.3.3.3");
    }

    #[tokio::test]
    async fn test_probe_timeout_is_a_rejection() {
        let probe = Arc::new(
            ScriptedProbe::new(&["1.1.1.1", "2.2.2.2"])
                .with_slow(&["2.2.2.2"], Duration::from_secs(3600)),
        );
        let validator = validator(
            probe,
            ValidatorConfig::new().with_timeout(Duration::from_millis(50)),
        );

        let outcome = validator
            .check(Proxy::new("2.2.2.2".to_string(), 8080, Protocol::Http))
            .await;
        assert_eq!(outcome.status, ValidationStatus::Timeout);

        let result = validator
            .validate(candidates(&["1.1.1.1", "2.2.2.2"]), 0)
            .await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].host, "1.1.1.1");
    }
}
