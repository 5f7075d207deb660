//! Liveness and anonymity probing of a single candidate

use crate::proxy::models::{Anonymity, Protocol, Proxy, ValidationOutcome};
use crate::Result;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Proxy as ReqwestProxy, Url};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OnceCell;

/// Default timeout for a single request through a proxy in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 8;

/// Echo endpoint used for plain HTTP and SOCKS probes
const DEFAULT_JUDGE_URL: &str = "http://httpbin.org/get";

/// Echo endpoint used to confirm CONNECT tunnelling
const DEFAULT_SECURE_JUDGE_URL: &str = "https://httpbin.org/get";

/// Returns the caller's public address as plain text
const DEFAULT_REAL_IP_URL: &str = "https://api.ipify.org";

const MAX_RAW_RESPONSE_BYTES: u64 = 64 * 1024;

/// Headers a proxy adds when it announces itself
const REVEALING_HEADERS: &[&str] = &[
    "via",
    "x-forwarded-for",
    "forwarded",
    "x-real-ip",
    "proxy-connection",
    "x-proxy-id",
    "client-ip",
];

/// Checks whether a candidate works and what it really offers.
///
/// A probe never fails; every problem becomes a rejected outcome.
#[async_trait]
pub trait ProxyProbe: Send + Sync {
    async fn probe(&self, proxy: &Proxy) -> ValidationOutcome;
}

/// Configuration for [`HttpProbe`]
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Timeout for each request made through the candidate
    pub timeout: Duration,
    /// Plain HTTP echo endpoint
    pub judge_url: String,
    /// HTTPS echo endpoint
    pub secure_judge_url: String,
    /// Endpoint that reports our own public address
    pub real_ip_url: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            judge_url: DEFAULT_JUDGE_URL.to_string(),
            secure_judge_url: DEFAULT_SECURE_JUDGE_URL.to_string(),
            real_ip_url: DEFAULT_REAL_IP_URL.to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_judge_url(mut self, url: String) -> Self {
        self.judge_url = url;
        self
    }

    pub fn with_secure_judge_url(mut self, url: String) -> Self {
        self.secure_judge_url = url;
        self
    }

    pub fn with_real_ip_url(mut self, url: String) -> Self {
        self.real_ip_url = url;
        self
    }
}

/// What an httpbin-style echo endpoint reports about the request it saw
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JudgeEcho {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Grade a proxy from what the judge saw.
///
/// Our own address anywhere in the echo makes it transparent. Otherwise a
/// proxy-revealing header makes it anonymous, and a clean echo makes it elite.
/// Without a known real address only the header rule applies.
pub fn judge_anonymity(echo: &JudgeEcho, real_ip: Option<&str>) -> Anonymity {
    if let Some(ip) = real_ip.filter(|ip| !ip.is_empty()) {
        let leaks = |value: &str| mentions_address(value, ip);
        if leaks(echo.origin.as_str()) || echo.headers.values().any(|v| leaks(v.as_str())) {
            return Anonymity::Transparent;
        }
    }

    let announces_proxy = echo.headers.keys().any(|name| {
        REVEALING_HEADERS
            .iter()
            .any(|header| name.eq_ignore_ascii_case(header))
    });

    if announces_proxy {
        Anonymity::Anonymous
    } else {
        Anonymity::Elite
    }
}

/// Whether `value` lists `ip` as one of its comma or space separated
/// addresses. `for=` prefixes, quotes and ports are ignored.
fn mentions_address(value: &str, ip: &str) -> bool {
    value
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(|token| {
            let token = token.trim();
            let token = token
                .get(..4)
                .filter(|prefix| prefix.eq_ignore_ascii_case("for="))
                .map_or(token, |_| &token[4..]);
            token.trim_matches('"')
        })
        .any(|token| {
            token == ip
                || token
                    .rsplit_once(':')
                    .is_some_and(|(addr, port)| addr == ip && port.parse::<u16>().is_ok())
                || token
                    .strip_prefix('[')
                    .and_then(|rest| rest.split_once(']'))
                    .is_some_and(|(addr, _)| addr == ip)
        })
}

/// Probe that requests a judge endpoint through the candidate once per
/// claimed protocol
#[derive(Clone)]
pub struct HttpProbe {
    config: ProbeConfig,
    real_ip: Arc<OnceCell<Option<String>>>,
}

impl HttpProbe {
    /// Create a new probe with default configuration
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    /// Create a new probe with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            config,
            real_ip: Arc::new(OnceCell::new()),
        }
    }

    /// Our public address, looked up once and shared by all clones
    async fn real_ip(&self) -> Option<&str> {
        self.real_ip
            .get_or_init(|| async {
                match self.fetch_real_ip().await {
                    Ok(ip) => {
                        tracing::debug!("Public address is {}", ip);
                        Some(ip)
                    }
                    Err(e) => {
                        tracing::debug!("Could not determine public address: {:#}", e);
                        None
                    }
                }
            })
            .await
            .as_deref()
    }

    async fn fetch_real_ip(&self) -> Result<String> {
        let client = Client::builder()
            .no_proxy()
            .timeout(self.config.timeout)
            .build()?;
        let body = client
            .get(&self.config.real_ip_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let ip = body.trim();
        ip.parse::<IpAddr>()
            .with_context(|| format!("unexpected address {:?}", ip))?;
        Ok(ip.to_string())
    }

    /// Create a reqwest client routed through the candidate
    fn create_client(&self, proxy: &Proxy, protocol: Protocol) -> Result<Client> {
        let reqwest_proxy = match protocol {
            Protocol::Http => ReqwestProxy::http(proxy.url_for(Protocol::Http))?,
            // HTTPS support means the proxy tunnels with CONNECT; the proxy
            // itself is still spoken to in plain HTTP.
            Protocol::Https => ReqwestProxy::https(proxy.url_for(Protocol::Http))?,
            Protocol::Socks5 => ReqwestProxy::all(proxy.url_for(Protocol::Socks5))?,
            Protocol::Socks4 => bail!("socks4 is not routed through reqwest"),
        };

        let client = Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }

    async fn echo_through(&self, proxy: &Proxy, protocol: Protocol) -> Result<JudgeEcho> {
        tokio::time::timeout(self.config.timeout, async {
            match protocol {
                Protocol::Socks4 => self.socks4_echo(proxy).await,
                Protocol::Https => self.reqwest_echo(proxy, protocol, &self.config.secure_judge_url).await,
                Protocol::Http | Protocol::Socks5 => {
                    self.reqwest_echo(proxy, protocol, &self.config.judge_url).await
                }
            }
        })
        .await
        .map_err(|_| anyhow!("{} probe timed out", protocol))?
    }

    async fn reqwest_echo(&self, proxy: &Proxy, protocol: Protocol, url: &str) -> Result<JudgeEcho> {
        let client = self.create_client(proxy, protocol)?;
        let body = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&body).context("malformed judge response")
    }

    /// reqwest has no SOCKS4 connector, so speak the handshake directly and
    /// send a bare HTTP/1.0 request through the tunnel.
    async fn socks4_echo(&self, proxy: &Proxy) -> Result<JudgeEcho> {
        let url = Url::parse(&self.config.judge_url)?;
        if url.scheme() != "http" {
            bail!("socks4 probing needs a plain http judge url");
        }
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("judge url has no host"))?;
        let port = url.port_or_known_default().unwrap_or(80);

        // SOCKS4 (without the 4a extension) only carries IPv4 targets
        let target = tokio::net::lookup_host((host, port))
            .await?
            .find_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(v4),
                SocketAddr::V6(_) => None,
            })
            .ok_or_else(|| anyhow!("judge host {} has no IPv4 address", host))?;

        let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;

        let mut handshake = vec![0x04, 0x01];
        handshake.extend_from_slice(&target.port().to_be_bytes());
        handshake.extend_from_slice(&target.ip().octets());
        if let Some(auth) = &proxy.auth {
            handshake.extend_from_slice(auth.username.as_bytes());
        }
        handshake.push(0x00);
        stream.write_all(&handshake).await?;

        let mut reply = [0u8; 8];
        stream.read_exact(&mut reply).await?;
        if reply[1] != 0x5A {
            bail!("socks4 request rejected (code {:#04x})", reply[1]);
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        let request = format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
            path, host
        );
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        stream
            .take(MAX_RAW_RESPONSE_BYTES)
            .read_to_end(&mut raw)
            .await?;

        parse_raw_http_echo(&raw)
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProxyProbe for HttpProbe {
    async fn probe(&self, proxy: &Proxy) -> ValidationOutcome {
        let start = Instant::now();

        let protocols: Vec<Protocol> = if proxy.protocols.is_empty() {
            vec![Protocol::Http]
        } else {
            proxy.protocols.iter().copied().collect()
        };

        let (attempts, real_ip) = tokio::join!(
            join_all(
                protocols
                    .iter()
                    .map(|protocol| self.echo_through(proxy, *protocol)),
            ),
            self.real_ip()
        );

        let mut confirmed = BTreeSet::new();
        let mut echoes = Vec::new();
        let mut last_error = None;
        for (protocol, attempt) in protocols.into_iter().zip(attempts) {
            match attempt {
                Ok(echo) => {
                    confirmed.insert(protocol);
                    echoes.push(echo);
                }
                Err(e) => last_error = Some(e),
            }
        }

        if confirmed.is_empty() {
            let reason = last_error.map_or_else(
                || "no protocol answered".to_string(),
                |e| format!("{:#}", e),
            );
            return ValidationOutcome::rejected(proxy.clone(), reason);
        }

        // The least private answer is the one the caller can rely on
        let anonymity = echoes
            .iter()
            .map(|echo| judge_anonymity(echo, real_ip))
            .min();

        let mut observed = proxy.clone();
        observed.protocols = confirmed;
        observed.anonymity = anonymity;

        ValidationOutcome::confirmed(observed, start.elapsed().as_millis() as u64)
    }
}

/// Split a raw HTTP/1.x response and decode its body as a judge echo
pub(crate) fn parse_raw_http_echo(raw: &[u8]) -> Result<JudgeEcho> {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text
        .split_once("\r\n\r\n")
        .ok_or_else(|| anyhow!("truncated http response"))?;

    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| anyhow!("missing http status line"))?;
    if !(200..300).contains(&status) {
        bail!("HTTP status: {}", status);
    }

    serde_json::from_str(body.trim()).context("malformed judge response")
}
