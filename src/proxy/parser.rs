//! Line parser for plain-text proxy lists

use crate::proxy::models::{Protocol, Proxy};
use once_cell::sync::Lazy;
use regex::Regex;

static URL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(https?|socks[45])://(?:([^:@]+):([^@]+)@)?([^:/@]+):(\d+)/?$")
        .expect("Invalid URL format regex")
});

static AUTH_AT_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:@]+):([^@]+)@([^:@]+):(\d+)$").expect("Invalid auth format regex")
});

/// Proxy parser for list lines
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Supports formats:
    /// - IP:PORT
    /// - IP:PORT:USER:PASS
    /// - USER:PASS@IP:PORT
    /// - scheme://IP:PORT
    /// - scheme://USER:PASS@IP:PORT
    ///
    /// `default_protocol` is used unless the line carries a scheme.
    pub fn parse_line(line: &str, default_protocol: Protocol) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        Self::parse_url_format(line)
            .or_else(|| Self::parse_auth_at_format(line, default_protocol))
            .or_else(|| Self::parse_colon_format(line, default_protocol))
    }

    fn parse_url_format(line: &str) -> Option<Proxy> {
        let caps = URL_FORMAT.captures(line)?;

        let protocol: Protocol = caps[1].parse().ok()?;
        let host = caps[4].to_string();
        let port = Self::parse_port(&caps[5])?;

        match (caps.get(2), caps.get(3)) {
            (Some(user), Some(pass)) => Some(Proxy::with_auth(
                host,
                port,
                protocol,
                user.as_str().to_string(),
                pass.as_str().to_string(),
            )),
            _ => Some(Proxy::new(host, port, protocol)),
        }
    }

    fn parse_auth_at_format(line: &str, default_protocol: Protocol) -> Option<Proxy> {
        let caps = AUTH_AT_FORMAT.captures(line)?;

        let username = caps[1].to_string();
        let password = caps[2].to_string();
        let host = caps[3].to_string();
        let port = Self::parse_port(&caps[4])?;

        Some(Proxy::with_auth(
            host,
            port,
            default_protocol,
            username,
            password,
        ))
    }

    fn parse_colon_format(line: &str, default_protocol: Protocol) -> Option<Proxy> {
        let parts: Vec<&str> = line.split(':').collect();

        match parts.as_slice() {
            [host, port] if !host.is_empty() => {
                let port = Self::parse_port(port)?;
                Some(Proxy::new(host.to_string(), port, default_protocol))
            }
            [host, port, username, password] if !host.is_empty() => {
                let port = Self::parse_port(port)?;
                Some(Proxy::with_auth(
                    host.to_string(),
                    port,
                    default_protocol,
                    username.to_string(),
                    password.to_string(),
                ))
            }
            _ => None,
        }
    }

    fn parse_port(s: &str) -> Option<u16> {
        s.trim().parse::<u16>().ok().filter(|port| *port != 0)
    }

    /// Parse proxies from a string (multiple lines)
    pub fn parse_string(content: &str, default_protocol: Protocol) -> Vec<Proxy> {
        content
            .lines()
            .filter_map(|line| Self::parse_line(line, default_protocol))
            .collect()
    }
}
