use crate::error::PreviewError;
use crate::security::AddressFilter;
use async_trait::async_trait;
use hyper::client::connect::dns::Name;
use reqwest::dns::{Addrs, Resolve, Resolving};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, warn};
use url::{Host, Url};

/// Resolves a hostname to every address it has (A and AAAA).
#[async_trait]
pub trait HostLookup: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Uses the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

#[async_trait]
impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = lookup_host((host, 0)).await?;
        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        Ok(ips)
    }
}

/// Resolves hosts once, drops disallowed addresses and connects only to what
/// is left.
///
/// The dialer is also plugged into reqwest as its DNS resolver, so the HTTP
/// client connects to exactly the addresses returned here and never performs
/// a second lookup of its own.
#[derive(Clone)]
pub struct SafeDialer {
    filter: Arc<AddressFilter>,
    lookup: Arc<dyn HostLookup>,
}

impl SafeDialer {
    pub fn new(filter: AddressFilter, lookup: Arc<dyn HostLookup>) -> Self {
        Self {
            filter: Arc::new(filter),
            lookup,
        }
    }

    pub fn filter(&self) -> &AddressFilter {
        &self.filter
    }

    /// Resolves `host` and returns the socket addresses a connection may use.
    ///
    /// When nothing was filtered every address is returned in resolver order.
    /// When something was filtered a single address is chosen, preferring
    /// IPv4.
    pub async fn resolve_allowed(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Vec<SocketAddr>, PreviewError> {
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let addrs = match host.parse::<IpAddr>() {
            Ok(ip) => vec![ip],
            Err(_) => self
                .lookup
                .lookup(host)
                .await
                .map_err(|e| PreviewError::ResolutionError {
                    host: host.to_string(),
                    message: e.to_string(),
                })?,
        };

        if addrs.is_empty() {
            return Err(PreviewError::ResolutionError {
                host: host.to_string(),
                message: "no addresses found".to_string(),
            });
        }

        let (allowed, filtered) = self.filter.partition(&addrs);
        if !filtered {
            return Ok(addrs.into_iter().map(|ip| SocketAddr::new(ip, port)).collect());
        }

        let chosen = allowed
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| allowed.first())
            .copied()
            .ok_or_else(|| {
                warn!(host = %host, candidates = addrs.len(), "All resolved addresses are blacklisted");
                PreviewError::AllBlacklisted(host.to_string())
            })?;

        debug!(host = %host, address = %chosen, "Filtered resolution, pinning address");
        Ok(vec![SocketAddr::new(chosen, port)])
    }

    /// Opens a TCP connection to `host:port` through the address filter.
    pub async fn dial(&self, host_port: &str) -> Result<TcpStream, PreviewError> {
        let (host, port) = split_host_port(host_port)?;
        let targets = self.resolve_allowed(host, port).await?;

        TcpStream::connect(targets.as_slice())
            .await
            .map_err(|e| PreviewError::NetworkError(format!("connect to {host_port} failed: {e}")))
    }

    /// IP-literal hosts never reach the DNS resolver, so they are checked
    /// against the filter up front.
    pub fn check_url(&self, url: &Url) -> Result<(), PreviewError> {
        let ip = match url.host() {
            Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
            Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
            Some(Host::Domain(_)) => return Ok(()),
            None => return Err(PreviewError::InvalidUrl(format!("no host in {url}"))),
        };

        if self.filter.is_allowed(ip) {
            Ok(())
        } else {
            Err(PreviewError::AllBlacklisted(ip.to_string()))
        }
    }
}

impl Resolve for SafeDialer {
    fn resolve(&self, name: Name) -> Resolving {
        let dialer = self.clone();
        Box::pin(async move {
            // reqwest replaces the port with the one from the request URL.
            let addrs = dialer.resolve_allowed(name.as_str(), 0).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

fn split_host_port(host_port: &str) -> Result<(&str, u16), PreviewError> {
    let invalid = || PreviewError::InvalidUrl(format!("expected host:port, got {host_port}"));

    let (host, port) = if let Some(rest) = host_port.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        (host, rest.strip_prefix(':').ok_or_else(invalid)?)
    } else {
        let (host, port) = host_port.rsplit_once(':').ok_or_else(invalid)?;
        if host.contains(':') {
            return Err(invalid());
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host, port))
}
