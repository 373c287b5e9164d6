use crate::fetcher::Fetcher;
use crate::metadata::{Metadata, ResourceType};
use crate::utils::provider_from_url;
use crate::PreviewError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Extracts preview metadata from a fetched HTML page.
#[async_trait]
pub trait HtmlExtractor: Send + Sync {
    /// `content_type` is the header the server declared, possibly empty.
    /// An `Err` means the page could not be interpreted at all.
    async fn extract(
        &self,
        html: &[u8],
        page_url: &Url,
        content_type: &str,
        fetcher: &Fetcher,
    ) -> Result<Metadata, PreviewError>;
}

/// What a single pass over the document found.
#[derive(Debug, Default, Clone, PartialEq)]
struct PageHints {
    title: Option<String>,
    description: Option<String>,
    image: Option<Url>,
    site_name: Option<String>,
    oembed: Option<Url>,
}

/// Default [`HtmlExtractor`]: Open Graph and standard meta tags, plus oEmbed
/// discovery links.
#[derive(Clone)]
pub struct MetadataExtractor {
    /// Fetch a discovered `application/json+oembed` link (one extra request).
    pub allow_oembed_fetching: bool,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HtmlExtractor for MetadataExtractor {
    async fn extract(
        &self,
        html: &[u8],
        page_url: &Url,
        content_type: &str,
        fetcher: &Fetcher,
    ) -> Result<Metadata, PreviewError> {
        // The bytes already sniffed as HTML, so they are ASCII-compatible
        // whatever charset the header claims.
        debug!(url = %page_url, declared = content_type, "Extracting page metadata");

        let hints = self.scan(&String::from_utf8_lossy(html), page_url);

        if self.allow_oembed_fetching {
            if let Some(endpoint) = &hints.oembed {
                if let Some(meta) = fetch_oembed(endpoint, fetcher).await {
                    return Ok(merge_hints(meta, &hints, page_url));
                }
            }
        }

        Ok(self.link_from_hints(hints, page_url))
    }
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {
            allow_oembed_fetching: true,
        }
    }

    pub fn without_oembed_fetching() -> Self {
        Self {
            allow_oembed_fetching: false,
        }
    }

    /// Builds a `link` record from the page alone, without any network access.
    pub fn extract_offline(&self, html: &str, page_url: &Url) -> Metadata {
        let hints = self.scan(html, page_url);
        self.link_from_hints(hints, page_url)
    }

    fn scan(&self, html: &str, page_url: &Url) -> PageHints {
        let document = Html::parse_document(html);

        PageHints {
            title: self.extract_title(&document),
            description: self.extract_description(&document),
            image: self
                .extract_image(&document)
                .and_then(|src| page_url.join(&src).ok()),
            site_name: self.extract_site_name(&document),
            oembed: self
                .extract_oembed_link(&document)
                .and_then(|href| page_url.join(&href).ok()),
        }
    }

    fn link_from_hints(&self, hints: PageHints, page_url: &Url) -> Metadata {
        let (host_name, provider_url) = provider_from_url(page_url);

        let mut meta = Metadata::new(ResourceType::Link);
        meta.url = Some(page_url.to_string());
        meta.title = hints.title;
        meta.description = hints.description;
        meta.thumbnail_url = hints.image.map(String::from);
        meta.provider_name = Some(hints.site_name.unwrap_or(host_name));
        meta.provider_url = Some(provider_url);
        meta
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        let og_title_selector = Selector::parse("meta[property='og:title']").ok()?;
        let title_selector = Selector::parse("title").ok()?;

        let og_title = document
            .select(&og_title_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.to_string());

        og_title
            .or_else(|| {
                document
                    .select(&title_selector)
                    .next()
                    .map(|el| el.text().collect::<String>())
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_description(&self, document: &Html) -> Option<String> {
        let og_desc_selector = Selector::parse("meta[property='og:description']").ok()?;
        let meta_desc_selector = Selector::parse("meta[name='description']").ok()?;

        document
            .select(&og_desc_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .or_else(|| {
                document
                    .select(&meta_desc_selector)
                    .next()
                    .and_then(|el| el.value().attr("content"))
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_image(&self, document: &Html) -> Option<String> {
        let og_image_selector =
            Selector::parse("meta[property='og:image'],meta[itemprop='image']").ok()?;
        let twitter_image_selector = Selector::parse("meta[name='twitter:image']").ok()?;

        document
            .select(&og_image_selector)
            .next()
            .or_else(|| document.select(&twitter_image_selector).next())
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_site_name(&self, document: &Html) -> Option<String> {
        let og_site_selector = Selector::parse("meta[property='og:site_name']").ok()?;

        document
            .select(&og_site_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_oembed_link(&self, document: &Html) -> Option<String> {
        let selector = Selector::parse("link[type='application/json+oembed']").ok()?;

        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

async fn fetch_oembed(endpoint: &Url, fetcher: &Fetcher) -> Option<Metadata> {
    let resource = match fetcher.fetch_document(endpoint).await {
        Ok(resource) if resource.status < 300 => resource,
        Ok(resource) => {
            debug!(endpoint = %endpoint, status = resource.status, "oEmbed link returned an error status");
            return None;
        }
        Err(e) => {
            debug!(endpoint = %endpoint, error = %e, "oEmbed link fetch failed");
            return None;
        }
    };

    serde_json::from_slice::<Metadata>(&resource.body)
        .map(Metadata::normalize)
        .map_err(|e| debug!(endpoint = %endpoint, error = %e, "oEmbed link is not valid JSON"))
        .ok()
}

// Page-level hints fill whatever the oEmbed response left out.
fn merge_hints(mut meta: Metadata, hints: &PageHints, page_url: &Url) -> Metadata {
    let (host_name, provider_url) = provider_from_url(page_url);

    meta.url.get_or_insert_with(|| page_url.to_string());
    if meta.title.is_none() {
        meta.title = hints.title.clone();
    }
    if meta.description.is_none() {
        meta.description = hints.description.clone();
    }
    if meta.thumbnail_url.is_none() {
        meta.thumbnail_url = hints.image.as_ref().map(Url::to_string);
    }
    if meta.provider_name.is_none() {
        meta.provider_name = Some(hints.site_name.clone().unwrap_or(host_name));
    }
    meta.provider_url.get_or_insert(provider_url);
    meta
}
