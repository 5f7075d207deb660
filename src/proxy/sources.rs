//! Built-in listing sources
//!
//! Three listing formats are understood:
//! - the HTML table served by the free-proxy-list.net family of sites
//! - the Geonode JSON API
//! - the proxy-list.download plain-text API

use crate::proxy::models::{Anonymity, Protocol, Proxy};
use crate::proxy::parser::ProxyParser;
use crate::proxy::provider::{absorb, fetch_text, ProviderConfig, ProxyProvider};
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::sync::Arc;

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table tr").expect("Invalid table row selector"));

static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Invalid table cell selector"));

const GEONODE_URL: &str = "https://proxylist.geonode.com/api/proxy-list?limit=500&page=1&sort_by=lastChecked&sort_type=desc";

const PROXY_LIST_DOWNLOAD_URL: &str = "https://www.proxy-list.download/api/v1/get";

/// Column layout of a free-proxy-list.net style table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// `IP | Port | Code | Country | Anonymity | Google | Https | Last Checked`
    HttpsColumn,
    /// `IP | Port | Code | Country | Version | Anonymity | Https | Last Checked`
    SocksVersion,
}

/// Provider for the free-proxy-list.net family of HTML listings
#[derive(Debug, Clone)]
pub struct HtmlTableProvider {
    name: String,
    url: String,
    layout: TableLayout,
    config: ProviderConfig,
}

impl HtmlTableProvider {
    pub fn new(name: &str, url: &str, layout: TableLayout, config: ProviderConfig) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            layout,
            config,
        }
    }

    pub fn ssl_proxies(config: ProviderConfig) -> Self {
        Self::new(
            "sslproxies.org",
            "https://www.sslproxies.org/",
            TableLayout::HttpsColumn,
            config,
        )
    }

    pub fn free_proxy_list(config: ProviderConfig) -> Self {
        Self::new(
            "free-proxy-list.net",
            "https://free-proxy-list.net/",
            TableLayout::HttpsColumn,
            config,
        )
    }

    pub fn us_proxy(config: ProviderConfig) -> Self {
        Self::new(
            "us-proxy.org",
            "https://www.us-proxy.org/",
            TableLayout::HttpsColumn,
            config,
        )
    }

    pub fn socks_proxy(config: ProviderConfig) -> Self {
        Self::new(
            "socks-proxy.net",
            "https://www.socks-proxy.net/",
            TableLayout::SocksVersion,
            config,
        )
    }

    async fn try_gather(&self) -> Result<Vec<Proxy>> {
        let client = self.config.build_client()?;
        let html = fetch_text(&client, &self.url).await?;
        Ok(parse_table(&html, self.layout))
    }
}

#[async_trait]
impl ProxyProvider for HtmlTableProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn gather(&self) -> Vec<Proxy> {
        absorb(&self.name, self.try_gather().await)
    }
}

/// Parse the rows of a free-proxy-list.net style table.
///
/// Rows that do not start with a valid IPv4 address and port are skipped, so
/// header rows and unrelated tables on the page fall out naturally.
pub(crate) fn parse_table(html: &str, layout: TableLayout) -> Vec<Proxy> {
    let document = Html::parse_document(html);

    document
        .select(&ROW_SELECTOR)
        .filter_map(|row| {
            let texts: Vec<String> = row
                .select(&CELL_SELECTOR)
                .map(|cell| cell.text().collect::<String>())
                .collect();
            let cells: Vec<&str> = texts.iter().map(|text| text.trim()).collect();
            parse_table_row(&cells, layout)
        })
        .collect()
}

fn parse_table_row(cells: &[&str], layout: TableLayout) -> Option<Proxy> {
    if cells.len() < 7 {
        return None;
    }

    let host = cells[0].parse::<Ipv4Addr>().ok()?.to_string();
    let port = cells[1].parse::<u16>().ok().filter(|port| *port != 0)?;

    let (protocols, anonymity) = match layout {
        TableLayout::HttpsColumn => {
            let mut protocols = vec![Protocol::Http];
            if cells[6].eq_ignore_ascii_case("yes") {
                protocols.push(Protocol::Https);
            }
            (protocols, cells[4])
        }
        TableLayout::SocksVersion => {
            let protocol: Protocol = cells[4].parse().ok()?;
            (vec![protocol], cells[5])
        }
    };

    let mut proxy = Proxy::with_protocols(host, port, protocols);
    proxy.anonymity = anonymity.parse().ok();
    Some(proxy)
}

/// Provider for the Geonode JSON API
#[derive(Debug, Clone)]
pub struct GeonodeProvider {
    url: String,
    config: ProviderConfig,
}

#[derive(Debug, Deserialize)]
struct GeonodeResponse {
    data: Vec<GeonodeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeonodeEntry {
    ip: String,
    port: serde_json::Value,
    #[serde(default)]
    protocols: Vec<String>,
    anonymity_level: Option<String>,
}

impl GeonodeProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            url: GEONODE_URL.to_string(),
            config,
        }
    }

    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }

    async fn try_gather(&self) -> Result<Vec<Proxy>> {
        let client = self.config.build_client()?;
        let body = fetch_text(&client, &self.url).await?;
        parse_geonode(&body)
    }
}

#[async_trait]
impl ProxyProvider for GeonodeProvider {
    fn name(&self) -> &str {
        "geonode.com"
    }

    async fn gather(&self) -> Vec<Proxy> {
        absorb(self.name(), self.try_gather().await)
    }
}

/// Parse a Geonode API response body. Entries without a usable port or any
/// known protocol are dropped.
pub(crate) fn parse_geonode(body: &str) -> Result<Vec<Proxy>> {
    let response: GeonodeResponse = serde_json::from_str(body)?;

    let proxies = response
        .data
        .into_iter()
        .filter_map(|entry| {
            // The API has served ports both as strings and as numbers
            let port = match &entry.port {
                serde_json::Value::String(s) => s.parse::<u16>().ok(),
                serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
                _ => None,
            }
            .filter(|port| *port != 0)?;

            let protocols: Vec<Protocol> = entry
                .protocols
                .iter()
                .filter_map(|p| p.parse().ok())
                .collect();
            if protocols.is_empty() {
                return None;
            }

            let mut proxy = Proxy::with_protocols(entry.ip, port, protocols);
            proxy.anonymity = entry
                .anonymity_level
                .as_deref()
                .and_then(|level| level.parse().ok());
            Some(proxy)
        })
        .collect();

    Ok(proxies)
}

/// Provider for the proxy-list.download plain-text API.
///
/// One list is requested per protocol; HTTP lists are additionally split by
/// anonymity grade so each candidate arrives with a known grade.
#[derive(Debug, Clone)]
pub struct ProxyListDownloadProvider {
    base_url: String,
    config: ProviderConfig,
}

impl ProxyListDownloadProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            base_url: PROXY_LIST_DOWNLOAD_URL.to_string(),
            config,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Every `(url, protocol, anonymity)` list this provider requests
    pub(crate) fn lists(&self) -> Vec<(String, Protocol, Option<Anonymity>)> {
        let mut lists: Vec<_> = Anonymity::ALL
            .iter()
            .map(|anonymity| {
                (
                    format!("{}?type=http&anon={}", self.base_url, anonymity),
                    Protocol::Http,
                    Some(*anonymity),
                )
            })
            .collect();

        for protocol in [Protocol::Https, Protocol::Socks4, Protocol::Socks5] {
            lists.push((
                format!("{}?type={}", self.base_url, protocol),
                protocol,
                None,
            ));
        }

        lists
    }

    async fn try_gather(&self) -> Result<Vec<Proxy>> {
        let client = self.config.build_client()?;

        let requests = self.lists().into_iter().map(|(url, protocol, anonymity)| {
            let client = &client;
            async move {
                match fetch_text(client, &url).await {
                    Ok(body) => parse_plain_list(&body, protocol, anonymity),
                    Err(e) => {
                        tracing::debug!("Skipping {}: {:#}", url, e);
                        Vec::new()
                    }
                }
            }
        });

        Ok(join_all(requests).await.into_iter().flatten().collect())
    }
}

#[async_trait]
impl ProxyProvider for ProxyListDownloadProvider {
    fn name(&self) -> &str {
        "proxy-list.download"
    }

    async fn gather(&self) -> Vec<Proxy> {
        absorb(self.name(), self.try_gather().await)
    }
}

pub(crate) fn parse_plain_list(
    body: &str,
    protocol: Protocol,
    anonymity: Option<Anonymity>,
) -> Vec<Proxy> {
    ProxyParser::parse_string(body, protocol)
        .into_iter()
        .map(|mut proxy| {
            proxy.anonymity = anonymity;
            proxy
        })
        .collect()
}

/// The six listing sources used when the caller does not supply its own
pub fn default_providers(config: &ProviderConfig) -> Vec<Arc<dyn ProxyProvider>> {
    vec![
        Arc::new(HtmlTableProvider::ssl_proxies(config.clone())),
        Arc::new(HtmlTableProvider::free_proxy_list(config.clone())),
        Arc::new(GeonodeProvider::new(config.clone())),
        Arc::new(HtmlTableProvider::us_proxy(config.clone())),
        Arc::new(ProxyListDownloadProvider::new(config.clone())),
        Arc::new(HtmlTableProvider::socks_proxy(config.clone())),
    ]
}
