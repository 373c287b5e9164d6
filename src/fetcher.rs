use crate::config::ResolverConfig;
use crate::dialer::SafeDialer;
use crate::redirect::{FetchState, RedirectDecision, RedirectInterceptor, RedirectShortCircuit};
use crate::{sniff, PreviewError};
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, instrument};
use url::Url;

/// Bytes read from the end of a redirect chain.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub body: Vec<u8>,
    /// URL after all redirects were followed.
    pub final_url: Url,
    /// Declared `Content-Type`, empty when the server sent none.
    pub content_type: String,
    pub status: u16,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(FetchedResource),
    ShortCircuit(RedirectShortCircuit),
}

#[derive(Debug, Clone, Copy)]
enum ReadLimit {
    ByContentType,
    Fixed(usize),
}

/// HTTP GET client whose every connection goes through [`SafeDialer`].
///
/// Redirects are followed here rather than by reqwest so that each hop can be
/// checked against the address filter and offered to a
/// [`RedirectInterceptor`].
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    dialer: SafeDialer,
    config: Arc<ResolverConfig>,
}

impl Fetcher {
    pub fn new(config: ResolverConfig, dialer: SafeDialer) -> Result<Self, PreviewError> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(Policy::none())
            .dns_resolver(Arc::new(dialer.clone()))
            .connect_timeout(config.wait_timeout)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|e| PreviewError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        debug!("Fetcher initialized");
        Ok(Self {
            client,
            dialer,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn dialer(&self) -> &SafeDialer {
        &self.dialer
    }

    /// Fetches `url`, following redirects until the interceptor stops the
    /// chain or a non-redirect response arrives.
    ///
    /// HTML and untyped bodies are read up to `max_html_body_size`, anything
    /// else up to `max_binary_body_size`. Truncation is not an error.
    #[instrument(level = "debug", skip_all, fields(url = %url), err)]
    pub async fn fetch_url(
        &self,
        url: &Url,
        state: &mut FetchState,
        interceptor: &RedirectInterceptor<'_>,
    ) -> Result<FetchOutcome, PreviewError> {
        self.with_deadline(self.follow(url, state, interceptor, ReadLimit::ByContentType))
            .await
    }

    /// Fetches a small document (such as an oEmbed JSON response) with its
    /// own request counter and no provider interception. The HTML size cap
    /// applies whatever the content type.
    #[instrument(level = "debug", skip_all, fields(url = %url), err)]
    pub async fn fetch_document(&self, url: &Url) -> Result<FetchedResource, PreviewError> {
        let mut state = FetchState::new();
        let interceptor = RedirectInterceptor::passthrough();
        let limit = ReadLimit::Fixed(self.config.max_html_body_size);

        match self
            .with_deadline(self.follow(url, &mut state, &interceptor, limit))
            .await?
        {
            FetchOutcome::Fetched(resource) => Ok(resource),
            // A passthrough interceptor never matches.
            FetchOutcome::ShortCircuit(short) => Err(PreviewError::NetworkError(format!(
                "unexpected short-circuit at {}",
                short.url
            ))),
        }
    }

    async fn with_deadline<F>(&self, fetch: F) -> Result<FetchOutcome, PreviewError>
    where
        F: std::future::Future<Output = Result<FetchOutcome, PreviewError>>,
    {
        let wait = self.config.wait_timeout;
        timeout(wait, fetch)
            .await
            .unwrap_or_else(|_| Err(PreviewError::TimeoutError(format!("no result within {wait:?}"))))
    }

    async fn follow(
        &self,
        url: &Url,
        state: &mut FetchState,
        interceptor: &RedirectInterceptor<'_>,
        limit: ReadLimit,
    ) -> Result<FetchOutcome, PreviewError> {
        state.record_request();
        let mut current = url.clone();

        loop {
            let response = self.send(&current).await?;

            if let Some(next) = redirect_target(&current, &response)? {
                drop(response);
                debug!(from = %current, to = %next, "Redirect received");

                match interceptor.before_redirect(&next, state) {
                    RedirectDecision::Follow => {
                        current = next;
                        continue;
                    }
                    RedirectDecision::Abort(e) => return Err(e),
                    RedirectDecision::Matched(short) => {
                        return Ok(FetchOutcome::ShortCircuit(short));
                    }
                }
            }

            let resource = self.read_resource(current, response, limit).await?;
            return Ok(FetchOutcome::Fetched(resource));
        }
    }

    async fn send(&self, url: &Url) -> Result<Response, PreviewError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(PreviewError::InvalidUrlScheme(other.to_string())),
        }
        self.dialer.check_url(url)?;

        self.client
            .get(url.clone())
            .header(ACCEPT_LANGUAGE, self.config.accept_language.as_str())
            .send()
            .await
            .map_err(PreviewError::from_reqwest)
    }

    async fn read_resource(
        &self,
        final_url: Url,
        mut response: Response,
        limit: ReadLimit,
    ) -> Result<FetchedResource, PreviewError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_string();

        let cap = match limit {
            ReadLimit::Fixed(cap) => cap,
            ReadLimit::ByContentType if content_type.is_empty() || sniff::is_html(&content_type) => {
                self.config.max_html_body_size
            }
            ReadLimit::ByContentType => self.config.max_binary_body_size,
        };

        let mut body = Vec::new();
        while body.len() < cap {
            let Some(chunk) = response.chunk().await.map_err(PreviewError::from_reqwest)? else {
                break;
            };
            let take = chunk.len().min(cap - body.len());
            body.extend_from_slice(&chunk[..take]);
        }

        debug!(
            url = %final_url,
            status,
            content_type = %content_type,
            bytes = body.len(),
            "Fetched resource"
        );

        Ok(FetchedResource {
            body,
            final_url,
            content_type,
            status,
        })
    }
}

fn redirect_target(current: &Url, response: &Response) -> Result<Option<Url>, PreviewError> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return Ok(None);
    }

    // A redirect without a Location is handed back like any other response.
    let Some(location) = response.headers().get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };

    current
        .join(location.trim())
        .map(Some)
        .map_err(|e| PreviewError::InvalidUrl(format!("bad redirect location {location}: {e}")))
}
