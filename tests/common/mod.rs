#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use url_unfurl::{
    Fetcher, HostLookup, Metadata, PreviewError, ProviderMatch, ProviderRegistry,
    ProviderResponse, Resolver, ResolverBuilder, ResolverConfig,
};
use wiremock::MockServer;

/// Answers every lookup with the same addresses.
pub struct StaticLookup(pub Vec<IpAddr>);

impl StaticLookup {
    pub fn loopback() -> Arc<Self> {
        Arc::new(Self(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]))
    }
}

#[async_trait]
impl HostLookup for StaticLookup {
    async fn lookup(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
        Ok(self.0.clone())
    }
}

/// Default policy plus a loopback whitelist so mock servers are reachable.
pub fn loopback_config() -> ResolverConfig {
    ResolverConfig::default()
        .with_wait_timeout(Duration::from_secs(5))
        .with_whitelisted_cidrs(&["127.0.0.0/8"])
        .unwrap()
}

pub fn builder(config: ResolverConfig) -> ResolverBuilder {
    Resolver::builder(config).host_lookup(StaticLookup::loopback())
}

pub fn loopback_resolver() -> Resolver {
    builder(loopback_config()).build().unwrap()
}

/// `http://example.com:<port><path>`, routed to the mock server by
/// [`StaticLookup`].
pub fn page_url(server: &MockServer, path: &str) -> String {
    format!("http://example.com:{}{}", server.address().port(), path)
}

/// Records every error handed to the resolver's hook.
#[derive(Clone, Default)]
pub struct ErrorLog(Arc<Mutex<Vec<PreviewError>>>);

impl ErrorLog {
    pub fn hook(&self) -> url_unfurl::ErrorHook {
        let errors = self.0.clone();
        Arc::new(move |_url: &str, err: &PreviewError| {
            errors.lock().unwrap().push(err.clone());
        })
    }

    pub fn errors(&self) -> Vec<PreviewError> {
        self.0.lock().unwrap().clone()
    }
}

/// Claims URLs whose path starts with a prefix and answers with canned
/// metadata, counting how often it was asked.
pub struct StubRegistry {
    pub path_prefix: &'static str,
    pub status: u16,
    pub metadata: Option<Metadata>,
    pub calls: AtomicUsize,
}

impl StubRegistry {
    pub fn new(path_prefix: &'static str, status: u16, metadata: Option<Metadata>) -> Arc<Self> {
        Arc::new(Self {
            path_prefix,
            status,
            metadata,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderRegistry for StubRegistry {
    fn find_provider(&self, url: &Url) -> Option<ProviderMatch> {
        url.path()
            .starts_with(self.path_prefix)
            .then(|| ProviderMatch {
                provider_name: "Stub Video".to_string(),
                provider_url: "https://video.example".to_string(),
                endpoint: "https://video.example/oembed".to_string(),
            })
    }

    async fn fetch_metadata(
        &self,
        _provider: &ProviderMatch,
        _url: &Url,
        _fetcher: &Fetcher,
    ) -> Option<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(ProviderResponse {
            status: self.status,
            metadata: self.metadata.clone(),
        })
    }
}

/// Minimal PNG: signature plus an IHDR chunk.
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data
}

pub fn html_page(head: &str) -> String {
    format!("<!DOCTYPE html>\n<html>\n<head>\n{head}\n</head>\n<body><p>content</p></body>\n</html>")
}
