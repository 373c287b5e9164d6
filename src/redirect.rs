use crate::config::MAX_REDIRECTS;
use crate::provider::{ProviderMatch, ProviderRegistry};
use crate::PreviewError;
use tracing::debug;
use url::Url;

/// Per-resolution request counter.
///
/// Created fresh for every top-level `parse` call (and for every thumbnail
/// backfill) and passed down by `&mut`, so concurrent calls never share it.
/// It counts the initial request of every fetch plus every redirect hop
/// taken, including hops that ended in a provider match.
#[derive(Debug, Default)]
pub struct FetchState {
    requests: usize,
}

impl FetchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub(crate) fn record_request(&mut self) {
        self.requests += 1;
    }
}

/// A redirect target recognised by the provider registry. Following the
/// chain any further would be wasted work.
#[derive(Debug, Clone)]
pub struct RedirectShortCircuit {
    pub url: Url,
    pub provider: ProviderMatch,
}

#[derive(Debug)]
pub enum RedirectDecision {
    Follow,
    Abort(PreviewError),
    Matched(RedirectShortCircuit),
}

/// Hook consulted by the fetcher before it follows each redirect.
#[derive(Clone, Copy)]
pub struct RedirectInterceptor<'a> {
    registry: Option<&'a dyn ProviderRegistry>,
    max_redirects: usize,
}

impl<'a> RedirectInterceptor<'a> {
    pub fn new(registry: Option<&'a dyn ProviderRegistry>) -> Self {
        Self {
            registry,
            max_redirects: MAX_REDIRECTS,
        }
    }

    /// Follows every redirect up to the limit without consulting providers.
    pub fn passthrough() -> Self {
        Self::new(None)
    }

    pub fn before_redirect(&self, target: &Url, state: &mut FetchState) -> RedirectDecision {
        if state.requests() >= self.max_redirects {
            return RedirectDecision::Abort(PreviewError::TooManyRedirects(self.max_redirects));
        }

        state.record_request();

        if let Some(provider) = self.registry.and_then(|r| r.find_provider(target)) {
            debug!(url = %target, provider = %provider.provider_name, "Redirect target matches a provider");
            return RedirectDecision::Matched(RedirectShortCircuit {
                url: target.clone(),
                provider,
            });
        }

        RedirectDecision::Follow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::Fetcher;
    use crate::provider::ProviderResponse;
    use async_trait::async_trait;

    struct PathRegistry(&'static str);

    #[async_trait]
    impl ProviderRegistry for PathRegistry {
        fn find_provider(&self, url: &Url) -> Option<ProviderMatch> {
            (url.path() == self.0).then(|| ProviderMatch {
                provider_name: "Tube".to_string(),
                provider_url: "https://tube.example".to_string(),
                endpoint: "https://tube.example/oembed".to_string(),
            })
        }

        async fn fetch_metadata(
            &self,
            _provider: &ProviderMatch,
            _url: &Url,
            _fetcher: &Fetcher,
        ) -> Option<ProviderResponse> {
            None
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_limit_is_reached_after_ten_requests() {
        let interceptor = RedirectInterceptor::passthrough();
        let mut state = FetchState::new();
        state.record_request();

        for _ in 0..9 {
            assert!(matches!(
                interceptor.before_redirect(&url("https://a.example/next"), &mut state),
                RedirectDecision::Follow
            ));
        }
        assert_eq!(state.requests(), 10);

        assert!(matches!(
            interceptor.before_redirect(&url("https://a.example/next"), &mut state),
            RedirectDecision::Abort(PreviewError::TooManyRedirects(10))
        ));
    }

    #[test]
    fn test_provider_match_short_circuits() {
        let registry = PathRegistry("/watch");
        let interceptor = RedirectInterceptor::new(Some(&registry));
        let mut state = FetchState::new();
        state.record_request();

        assert!(matches!(
            interceptor.before_redirect(&url("https://a.example/hop"), &mut state),
            RedirectDecision::Follow
        ));

        match interceptor.before_redirect(&url("https://tube.example/watch"), &mut state) {
            RedirectDecision::Matched(short) => {
                assert_eq!(short.url.as_str(), "https://tube.example/watch");
                assert_eq!(short.provider.provider_name, "Tube");
            }
            other => panic!("expected a match, got {other:?}"),
        }
        assert_eq!(state.requests(), 3);
    }
}
