use crate::extractor::HtmlExtractor;
use crate::fetcher::{FetchedResource, Fetcher};
use crate::metadata::{Metadata, ResourceType};
use crate::sniff::{self, sniff_content_type};
use crate::utils::provider_from_url;
use crate::PreviewError;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Decides what fetched bytes are from what they look like, not from what
/// the server declared.
#[derive(Clone)]
pub struct ContentClassifier {
    extractor: Arc<dyn HtmlExtractor>,
}

impl ContentClassifier {
    pub fn new(extractor: Arc<dyn HtmlExtractor>) -> Self {
        Self { extractor }
    }

    /// Images become `photo` records, HTML goes to the page extractor and
    /// anything else becomes a plain `link`. `None` only when the HTML
    /// extractor could not interpret the page.
    pub async fn classify(&self, resource: &FetchedResource, fetcher: &Fetcher) -> Option<Metadata> {
        let sniffed = sniff_content_type(&resource.body);
        let url = &resource.final_url;
        debug!(url = %url, sniffed, declared = %resource.content_type, "Classifying content");

        if sniff::is_image(sniffed) {
            return Some(image_info(url, &resource.body));
        }

        if sniff::is_html(sniffed) {
            return match self
                .extractor
                .extract(&resource.body, url, &resource.content_type, fetcher)
                .await
            {
                Ok(meta) => Some(meta),
                Err(e) => {
                    e.log();
                    None
                }
            };
        }

        Some(link_info(url))
    }
}

/// `photo` record for image bytes. Dimensions are left out when the header
/// cannot be decoded.
pub fn image_info(url: &Url, data: &[u8]) -> Metadata {
    let (name, provider_url) = provider_from_url(url);

    let mut meta = Metadata::new(ResourceType::Photo);
    meta.url = Some(url.to_string());
    meta.provider_name = Some(name);
    meta.provider_url = Some(provider_url);

    match decode_image_size(data) {
        Ok((width, height)) => meta.set_dimensions(width, height),
        Err(e) => e.log(),
    }

    meta
}

pub fn link_info(url: &Url) -> Metadata {
    let (name, provider_url) = provider_from_url(url);

    let mut meta = Metadata::new(ResourceType::Link);
    meta.url = Some(url.to_string());
    meta.provider_name = Some(name);
    meta.provider_url = Some(provider_url);
    meta
}

/// Reads pixel dimensions from an image header. Truncated input is fine as
/// long as the header itself is complete.
pub fn decode_image_size(data: &[u8]) -> Result<(u32, u32), PreviewError> {
    let size = imagesize::blob_size(data).map_err(|e| PreviewError::DecodeError(e.to_string()))?;

    let width = u32::try_from(size.width)
        .map_err(|_| PreviewError::DecodeError(format!("width {} out of range", size.width)))?;
    let height = u32::try_from(size.height)
        .map_err(|_| PreviewError::DecodeError(format!("height {} out of range", size.height)))?;
    Ok((width, height))
}
