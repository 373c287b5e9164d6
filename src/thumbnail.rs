use crate::classify::decode_image_size;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::metadata::Metadata;
use crate::redirect::{FetchState, RedirectInterceptor};
use tracing::debug;
use url::Url;

/// Fills in missing thumbnail dimensions by fetching the thumbnail and
/// decoding its header.
///
/// Runs with its own request counter. Any failure leaves `meta` as it was,
/// except that a successful fetch records the post-redirect thumbnail URL.
/// Returns whether a fetch was attempted.
pub async fn backfill_thumbnail(meta: &mut Metadata, fetcher: &Fetcher) -> bool {
    if !meta.needs_thumbnail_size() {
        return false;
    }
    let Some(thumbnail) = meta
        .thumbnail_url
        .as_deref()
        .and_then(|u| Url::parse(u.trim()).ok())
    else {
        return false;
    };

    let mut state = FetchState::new();
    let outcome = fetcher
        .fetch_url(&thumbnail, &mut state, &RedirectInterceptor::passthrough())
        .await;

    let resource = match outcome {
        Ok(FetchOutcome::Fetched(resource)) => resource,
        Ok(FetchOutcome::ShortCircuit(_)) => return true,
        Err(e) => {
            debug!(url = %thumbnail, error = %e, "Thumbnail fetch failed");
            return true;
        }
    };

    meta.thumbnail_url = Some(resource.final_url.to_string());
    match decode_image_size(&resource.body) {
        Ok((width, height)) => meta.set_thumbnail_dimensions(width, height),
        Err(e) => e.log(),
    }
    true
}
