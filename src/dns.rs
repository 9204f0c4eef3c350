// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Custom nameserver for backend hostnames
//
// Lets the service discover its backends through a DNS server other than
// the system resolver (typically Consul DNS). Only backend hostnames are
// affected; resolved addresses are substituted into connection URLs just
// before a client or pool is built.

use crate::config::DnsConfig;
use anyhow::{bail, Context, Result};
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info, warn};
use url::{Host, Url};

const DEFAULT_DNS_PORT: u16 = 53;

/// Resolver for backend hostnames; passes names through when disabled
#[derive(Clone, Default)]
pub struct DnsOverride {
    resolver: Option<TokioAsyncResolver>,
}

impl DnsOverride {
    /// No custom nameserver; hostnames go to the system resolver
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build from configuration, or [`DnsOverride::disabled`] if no server is set
    pub async fn from_config(config: &DnsConfig) -> Result<Self> {
        let server = match config.server.as_deref().map(str::trim) {
            Some(server) if !server.is_empty() => normalize_server_addr(server),
            _ => return Ok(Self::disabled()),
        };

        let protocol = match config.network.as_str() {
            "udp" => Protocol::Udp,
            "tcp" => Protocol::Tcp,
            other => bail!("Unsupported DNS network '{}'", other),
        };

        let socket_addr = match server.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(_) => tokio::net::lookup_host(server.as_str())
                .await
                .with_context(|| format!("Failed to resolve DNS server {}", server))?
                .next()
                .with_context(|| format!("DNS server {} has no address", server))?,
        };

        let mut resolver_config = ResolverConfig::new();
        resolver_config.add_name_server(NameServerConfig::new(socket_addr, protocol));

        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout();

        info!(
            "Custom DNS resolver enabled: {}://{}",
            config.network, socket_addr
        );

        Ok(Self {
            resolver: Some(TokioAsyncResolver::tokio(resolver_config, opts)),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.resolver.is_some()
    }

    /// Resolve `host` to an IP literal
    ///
    /// Returns `None` when the override is disabled, `host` is already an
    /// IP address, or the lookup fails (logged).
    pub async fn resolve_host(&self, host: &str) -> Option<IpAddr> {
        let resolver = self.resolver.as_ref()?;
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            return None;
        }

        match resolver.lookup_ip(host).await {
            Ok(lookup) => {
                let ip = lookup.iter().next();
                debug!("Resolved {} -> {:?}", host, ip);
                ip
            }
            Err(e) => {
                warn!("Custom DNS lookup for {} failed: {}. Using system resolver.", host, e);
                None
            }
        }
    }

    /// Replace the host of a connection URL with its resolved address
    pub async fn rewrite_url(&self, raw: &str) -> String {
        if !self.is_enabled() {
            return raw.to_string();
        }

        let mut url = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => return raw.to_string(),
        };
        // Bracketed IPv6 literals come back as Host::Ipv6 and are left alone
        let host = match url.host() {
            Some(Host::Domain(host)) => host.to_string(),
            _ => return raw.to_string(),
        };

        match self.resolve_host(&host).await {
            Some(ip) => match url.set_host(Some(&ip_host(ip))) {
                Ok(()) => url.to_string(),
                Err(e) => {
                    warn!("Cannot substitute {} into {}: {}", ip, host, e);
                    raw.to_string()
                }
            },
            None => raw.to_string(),
        }
    }

    /// Replace the host of a `host:port` address with its resolved address
    pub async fn rewrite_address(&self, address: &str) -> String {
        if !self.is_enabled() {
            return address.to_string();
        }

        let Some((host, port)) = address.rsplit_once(':') else {
            return address.to_string();
        };

        match self.resolve_host(host).await {
            Some(ip) => format!("{}:{}", ip_host(ip), port),
            None => address.to_string(),
        }
    }
}

/// Append the default DNS port when `server` has none
pub fn normalize_server_addr(server: &str) -> String {
    if server.parse::<SocketAddr>().is_ok() {
        return server.to_string();
    }
    if let Ok(ip) = server.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_DNS_PORT).to_string();
    }
    match server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            server.to_string()
        }
        _ => format!("{}:{}", server, DEFAULT_DNS_PORT),
    }
}

fn ip_host(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}
