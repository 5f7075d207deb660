use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use proxy_fetcher::{
    configure, Anonymity, HttpProbe, ProbeConfig, Protocol, Proxy, ProxyFetcher, ProxyValidator,
    ValidatorConfig,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// Extra time the validator allows a probe beyond its per-request timeout
const PROBE_GRACE: Duration = Duration::from_secs(2);

/// Fetch working proxies from public proxy lists
#[derive(Parser)]
#[command(name = "proxy-fetcher")]
#[command(about = "Fetch working proxies from public proxy lists")]
struct Cli {
    /// Print diagnostic output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get proxies
    Get {
        /// Search proxies only with the given protocols (http, https, socks4, socks5)
        #[arg(short = 'p', long = "protocol", value_parser = Protocol::from_str)]
        protocols: Vec<Protocol>,
        /// Search proxies only with the given anonymities (transparent, anonymous, elite)
        #[arg(short = 'a', long = "anonymity", value_parser = Anonymity::from_str)]
        anonymities: Vec<Anonymity>,
        /// Amount of proxies to fetch
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
        limit: u64,
        /// Gather all proxies it can find
        #[arg(long)]
        all: bool,
        /// Output format of proxies
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
        /// Number of concurrent validation probes
        #[arg(short = 'n', long, default_value = "50")]
        concurrency: usize,
        /// Timeout in seconds for each request made through a proxy
        #[arg(long, default_value = "8")]
        timeout: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    configure(cli.debug);

    match cli.command {
        Commands::Get {
            protocols,
            anonymities,
            limit,
            all,
            output,
            concurrency,
            timeout,
        } => {
            let limit = if all { 0 } else { usize::try_from(limit)? };

            let timeout = Duration::from_secs(timeout);
            let probe = HttpProbe::with_config(ProbeConfig::new().with_timeout(timeout));
            let validator = ProxyValidator::with_probe(
                Arc::new(probe),
                ValidatorConfig::new()
                    .with_timeout(timeout + PROBE_GRACE)
                    .with_concurrency(concurrency),
            );

            let fetched = match ProxyFetcher::builder().validator(validator).build().await {
                Ok(fetcher) => fetcher.get(&protocols, &anonymities, limit).await,
                Err(e) => Err(e),
            };

            match fetched {
                Ok(proxies) => print_proxies(&proxies, output)?,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

#[derive(Tabled)]
struct ProxyRow {
    #[tabled(rename = "IP")]
    host: String,
    #[tabled(rename = "PORT")]
    port: u16,
    #[tabled(rename = "PROTOCOLS")]
    protocols: String,
    #[tabled(rename = "ANONYMITY")]
    anonymity: String,
}

impl From<&Proxy> for ProxyRow {
    fn from(proxy: &Proxy) -> Self {
        Self {
            host: proxy.host.clone(),
            port: proxy.port,
            protocols: proxy
                .protocols
                .iter()
                .map(Protocol::to_string)
                .collect::<Vec<_>>()
                .join(","),
            anonymity: proxy
                .anonymity
                .map_or_else(|| "unknown".to_string(), |a| a.to_string()),
        }
    }
}

fn print_proxies(proxies: &[Proxy], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(proxies)?);
        }
        OutputFormat::Table => {
            let rows: Vec<ProxyRow> = proxies.iter().map(ProxyRow::from).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
