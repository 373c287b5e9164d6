use crate::fetcher::Fetcher;
use crate::metadata::Metadata;
use crate::PreviewError;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// A provider that claims a URL. Opaque to the resolver; only the registry
/// that produced it interprets `endpoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMatch {
    pub provider_name: String,
    pub provider_url: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub metadata: Option<Metadata>,
}

impl ProviderResponse {
    /// Metadata from a successful (< 300) provider response.
    pub fn into_usable(self) -> Option<Metadata> {
        if self.status < 300 {
            self.metadata
        } else {
            None
        }
    }
}

/// Registry of embeddable-resource providers.
#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    fn find_provider(&self, url: &Url) -> Option<ProviderMatch>;

    /// Fetches structured metadata for `url` from a matched provider. All
    /// network access must go through `fetcher`.
    async fn fetch_metadata(
        &self,
        provider: &ProviderMatch,
        url: &Url,
        fetcher: &Fetcher,
    ) -> Option<ProviderResponse>;
}

/// One entry of an oEmbed `providers.json` list.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub provider_name: String,
    pub provider_url: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointEntry {
    #[serde(default)]
    pub schemes: Vec<String>,
    pub url: String,
}

struct CompiledEndpoint {
    provider_name: String,
    provider_url: String,
    endpoint: String,
    schemes: Vec<Regex>,
}

/// [`ProviderRegistry`] backed by the public oEmbed provider list format.
///
/// Scheme patterns use `*` as a wildcard and match `http` and `https` alike.
pub struct OEmbedRegistry {
    endpoints: Vec<CompiledEndpoint>,
}

impl OEmbedRegistry {
    pub fn new(providers: Vec<ProviderEntry>) -> Result<Self, PreviewError> {
        let mut endpoints = Vec::new();

        for provider in providers {
            for entry in provider.endpoints {
                // Endpoints without schemes cannot be matched against a URL.
                if entry.schemes.is_empty() {
                    continue;
                }
                let schemes = entry
                    .schemes
                    .iter()
                    .map(|s| scheme_to_regex(s))
                    .collect::<Result<Vec<_>, _>>()?;

                endpoints.push(CompiledEndpoint {
                    provider_name: provider.provider_name.clone(),
                    provider_url: provider.provider_url.clone(),
                    endpoint: entry.url.replace("{format}", "json"),
                    schemes,
                });
            }
        }

        debug!(endpoints = endpoints.len(), "Loaded oEmbed providers");
        Ok(Self { endpoints })
    }

    pub fn from_json(data: &str) -> Result<Self, PreviewError> {
        let providers: Vec<ProviderEntry> = serde_json::from_str(data)
            .map_err(|e| PreviewError::ConfigError(format!("invalid provider list: {e}")))?;
        Self::new(providers)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[async_trait]
impl ProviderRegistry for OEmbedRegistry {
    fn find_provider(&self, url: &Url) -> Option<ProviderMatch> {
        self.endpoints
            .iter()
            .find(|e| e.schemes.iter().any(|re| re.is_match(url.as_str())))
            .map(|e| ProviderMatch {
                provider_name: e.provider_name.clone(),
                provider_url: e.provider_url.clone(),
                endpoint: e.endpoint.clone(),
            })
    }

    async fn fetch_metadata(
        &self,
        provider: &ProviderMatch,
        url: &Url,
        fetcher: &Fetcher,
    ) -> Option<ProviderResponse> {
        let request = Url::parse_with_params(
            &provider.endpoint,
            &[("url", url.as_str()), ("format", "json")],
        )
        .map_err(|e| warn!(endpoint = %provider.endpoint, error = %e, "Invalid oEmbed endpoint"))
        .ok()?;

        let resource = match fetcher.fetch_document(&request).await {
            Ok(resource) => resource,
            Err(e) => {
                debug!(endpoint = %request, error = %e, "oEmbed request failed");
                return None;
            }
        };

        let metadata = serde_json::from_slice::<Metadata>(&resource.body)
            .map_err(|e| debug!(endpoint = %request, error = %e, "oEmbed response is not valid"))
            .ok()
            .map(|meta| {
                let mut meta = meta.normalize();
                meta.provider_name
                    .get_or_insert_with(|| provider.provider_name.clone());
                meta.provider_url
                    .get_or_insert_with(|| provider.provider_url.clone());
                meta.url.get_or_insert_with(|| url.to_string());
                meta
            });

        Some(ProviderResponse {
            status: resource.status,
            metadata,
        })
    }
}

fn scheme_to_regex(scheme: &str) -> Result<Regex, PreviewError> {
    let rest = scheme
        .strip_prefix("http://")
        .or_else(|| scheme.strip_prefix("https://"));

    let (prefix, body) = match rest {
        Some(rest) => ("https?://", rest),
        None => ("", scheme),
    };

    let body = regex::escape(body).replace(r"\*", ".*");
    Regex::new(&format!("^{prefix}{body}$"))
        .map_err(|e| PreviewError::ConfigError(format!("invalid provider scheme {scheme}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDERS: &str = r#"[
        {
            "provider_name": "YouTube",
            "provider_url": "https://www.youtube.com/",
            "endpoints": [{
                "schemes": ["https://*.youtube.com/watch*", "https://youtu.be/*"],
                "url": "https://www.youtube.com/oembed"
            }]
        },
        {
            "provider_name": "Flickr",
            "provider_url": "https://www.flickr.com/",
            "endpoints": [
                {"url": "https://www.flickr.com/services/oembed/"},
                {"schemes": ["http://*.flickr.com/photos/*"], "url": "https://www.flickr.com/services/oembed.{format}"}
            ]
        }
    ]"#;

    #[test]
    fn test_match_by_scheme() {
        let registry = OEmbedRegistry::from_json(PROVIDERS).unwrap();
        assert_eq!(registry.len(), 2);

        let url = Url::parse("http://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        let found = registry.find_provider(&url).unwrap();
        assert_eq!(found.provider_name, "YouTube");
        assert_eq!(found.endpoint, "https://www.youtube.com/oembed");

        let url = Url::parse("https://www.flickr.com/photos/someone/123").unwrap();
        let found = registry.find_provider(&url).unwrap();
        assert_eq!(found.endpoint, "https://www.flickr.com/services/oembed.json");
    }

    #[test]
    fn test_no_match() {
        let registry = OEmbedRegistry::from_json(PROVIDERS).unwrap();

        let url = Url::parse("https://example.com/watch").unwrap();
        assert!(registry.find_provider(&url).is_none());

        // Dots are literal, not wildcards.
        let url = Url::parse("https://youtuxbe/abc").unwrap();
        assert!(registry.find_provider(&url).is_none());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            OEmbedRegistry::from_json("{not json"),
            Err(PreviewError::ConfigError(_))
        ));
    }

    #[test]
    fn test_usable_response() {
        let ok = ProviderResponse {
            status: 200,
            metadata: Some(Metadata::new(crate::ResourceType::Video)),
        };
        assert!(ok.into_usable().is_some());

        let not_found = ProviderResponse {
            status: 404,
            metadata: Some(Metadata::new(crate::ResourceType::Video)),
        };
        assert!(not_found.into_usable().is_none());
    }
}
