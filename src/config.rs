use crate::error::PreviewError;
use crate::security::{host_network, parse_networks, AddressFilter};
use ip_network::IpNetwork;
use std::net::IpAddr;
use std::time::Duration;

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-us";
pub const DEFAULT_USER_AGENT: &str = "url-unfurl/0.1 (link preview bot)";
pub const DEFAULT_MAX_HTML_BODY_SIZE: usize = 50_000;
pub const DEFAULT_MAX_BINARY_BODY_SIZE: usize = 4096;
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of requests a single resolution may issue along redirect chains.
pub const MAX_REDIRECTS: usize = 10;

/// Settings shared by every `parse` call of a resolver.
///
/// # Examples
/// ```ignore
/// let config = ResolverConfig::default()
///     .with_user_agent("my-bot/1.0")
///     .with_wait_timeout(Duration::from_secs(5))
///     .with_blacklisted_cidrs(&["203.0.113.0/24"])?;
/// ```
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub accept_language: String,
    pub user_agent: String,
    /// Read cap for HTML or untyped responses.
    pub max_html_body_size: usize,
    /// Read cap for everything else; enough for sniffing and image headers.
    pub max_binary_body_size: usize,
    /// Deadline for one whole fetch, redirects and body read included.
    pub wait_timeout: Duration,
    pub blacklisted_networks: Vec<IpNetwork>,
    pub whitelisted_networks: Vec<IpNetwork>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_html_body_size: DEFAULT_MAX_HTML_BODY_SIZE,
            max_binary_body_size: DEFAULT_MAX_BINARY_BODY_SIZE,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            blacklisted_networks: Vec::new(),
            whitelisted_networks: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn with_accept_language(mut self, accept_language: &str) -> Self {
        self.accept_language = accept_language.to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_max_html_body_size(mut self, size: usize) -> Self {
        self.max_html_body_size = size;
        self
    }

    pub fn with_max_binary_body_size(mut self, size: usize) -> Self {
        self.max_binary_body_size = size;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_blacklisted_networks(mut self, networks: Vec<IpNetwork>) -> Self {
        self.blacklisted_networks = networks;
        self
    }

    pub fn with_whitelisted_networks(mut self, networks: Vec<IpNetwork>) -> Self {
        self.whitelisted_networks = networks;
        self
    }

    pub fn with_blacklisted_cidrs<S: AsRef<str>>(mut self, cidrs: &[S]) -> Result<Self, PreviewError> {
        self.blacklisted_networks = parse_networks(cidrs)?;
        Ok(self)
    }

    pub fn with_whitelisted_cidrs<S: AsRef<str>>(mut self, cidrs: &[S]) -> Result<Self, PreviewError> {
        self.whitelisted_networks = parse_networks(cidrs)?;
        Ok(self)
    }

    /// Legacy single-address blacklist; each address is added as a host network.
    pub fn with_blacklisted_ips(mut self, ips: &[IpAddr]) -> Result<Self, PreviewError> {
        for ip in ips {
            self.blacklisted_networks.push(host_network(*ip)?);
        }
        Ok(self)
    }

    pub fn address_filter(&self) -> AddressFilter {
        AddressFilter::new(
            self.blacklisted_networks.clone(),
            self.whitelisted_networks.clone(),
        )
    }

    pub(crate) fn validate(&self) -> Result<(), PreviewError> {
        if self.max_html_body_size == 0 || self.max_binary_body_size == 0 {
            return Err(PreviewError::ConfigError(
                "body size caps must be greater than zero".to_string(),
            ));
        }
        if self.wait_timeout.is_zero() {
            return Err(PreviewError::ConfigError(
                "wait timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
