use crate::classify::ContentClassifier;
use crate::config::ResolverConfig;
use crate::dialer::{HostLookup, SafeDialer, SystemLookup};
use crate::extractor::{HtmlExtractor, MetadataExtractor};
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::provider::{ProviderMatch, ProviderRegistry};
use crate::redirect::{FetchState, RedirectInterceptor};
use crate::thumbnail::backfill_thumbnail;
use crate::{Metadata, PreviewError};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Receives every error swallowed by [`Resolver::parse`], with the URL that
/// was being resolved.
pub type ErrorHook = Arc<dyn Fn(&str, &PreviewError) + Send + Sync>;

/// Turns an untrusted URL into a [`Metadata`] record.
///
/// Cheap to clone and safe to share: every `parse` call keeps its own
/// request counter.
#[derive(Clone)]
pub struct Resolver {
    fetcher: Fetcher,
    registry: Option<Arc<dyn ProviderRegistry>>,
    classifier: ContentClassifier,
    error_hook: ErrorHook,
}

pub struct ResolverBuilder {
    config: ResolverConfig,
    registry: Option<Arc<dyn ProviderRegistry>>,
    extractor: Arc<dyn HtmlExtractor>,
    lookup: Arc<dyn HostLookup>,
    error_hook: ErrorHook,
}

impl ResolverBuilder {
    pub fn provider_registry(mut self, registry: Arc<dyn ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn html_extractor(mut self, extractor: Arc<dyn HtmlExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn host_lookup(mut self, lookup: Arc<dyn HostLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = hook;
        self
    }

    pub fn build(self) -> Result<Resolver, PreviewError> {
        let dialer = SafeDialer::new(self.config.address_filter(), self.lookup);
        let fetcher = Fetcher::new(self.config, dialer)?;

        Ok(Resolver {
            fetcher,
            registry: self.registry,
            classifier: ContentClassifier::new(self.extractor),
            error_hook: self.error_hook,
        })
    }
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Result<Self, PreviewError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ResolverConfig) -> ResolverBuilder {
        ResolverBuilder {
            config,
            registry: None,
            extractor: Arc::new(MetadataExtractor::new()),
            lookup: Arc::new(SystemLookup),
            error_hook: Arc::new(|_url: &str, error: &PreviewError| error.log()),
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Resolves `url` into metadata. Never fails: malformed, blocked or
    /// unreachable URLs yield `None` and the reason goes to the error hook.
    #[instrument(level = "debug", skip(self))]
    pub async fn parse(&self, url: &str) -> Option<Metadata> {
        let mut state = FetchState::new();

        let mut meta = match self.resolve(url, &mut state).await {
            Ok(Some(meta)) => meta,
            Ok(None) => return None,
            Err(e) => {
                (self.error_hook)(url, &e);
                return None;
            }
        };

        backfill_thumbnail(&mut meta, &self.fetcher).await;
        debug!(url, kind = %meta.kind, requests = state.requests(), "Resolved URL");
        Some(meta)
    }

    /// Resolves several URLs concurrently. Results keep the input order.
    pub async fn parse_batch(&self, urls: &[&str]) -> Vec<Option<Metadata>> {
        let futures = urls.iter().map(|url| self.parse(url));
        futures::future::join_all(futures).await
    }

    async fn resolve(
        &self,
        url: &str,
        state: &mut FetchState,
    ) -> Result<Option<Metadata>, PreviewError> {
        let url = Url::parse(url.trim())?;

        if let Some(registry) = self.registry.as_deref() {
            if let Some(provider) = registry.find_provider(&url) {
                if let Some(meta) = self.fetch_provider(registry, &provider, &url).await {
                    return Ok(Some(meta));
                }
            }
        }

        let interceptor = RedirectInterceptor::new(self.registry.as_deref());
        let mut target = url;

        // Each short-circuit consumed a redirect slot, so this loop ends in
        // a fetched resource or a redirect-limit error.
        let resource = loop {
            match self.fetcher.fetch_url(&target, state, &interceptor).await? {
                FetchOutcome::Fetched(resource) => break resource,
                FetchOutcome::ShortCircuit(short) => {
                    if let Some(registry) = self.registry.as_deref() {
                        if let Some(meta) =
                            self.fetch_provider(registry, &short.provider, &short.url).await
                        {
                            return Ok(Some(meta));
                        }
                    }
                    debug!(url = %short.url, "Provider gave no usable metadata, fetching directly");
                    target = short.url;
                }
            }
        };

        Ok(self.classifier.classify(&resource, &self.fetcher).await)
    }

    async fn fetch_provider(
        &self,
        registry: &dyn ProviderRegistry,
        provider: &ProviderMatch,
        url: &Url,
    ) -> Option<Metadata> {
        registry
            .fetch_metadata(provider, url, &self.fetcher)
            .await
            .and_then(|response| response.into_usable())
            .map(Metadata::normalize)
    }
}
