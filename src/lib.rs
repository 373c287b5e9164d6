//! Resolve untrusted URLs into oEmbed-shaped metadata without letting the
//! fetch reach private or otherwise forbidden network addresses.
//!
//! ```no_run
//! use url_unfurl::{Resolver, ResolverConfig};
//!
//! # async fn run() -> Result<(), url_unfurl::PreviewError> {
//! let resolver = Resolver::new(ResolverConfig::default())?;
//! if let Some(meta) = resolver.parse("https://www.rust-lang.org/").await {
//!     println!("{} {:?}", meta.kind, meta.title);
//! }
//! # Ok(())
//! # }
//! ```

mod classify;
mod config;
mod dialer;
mod error;
mod extractor;
mod fetcher;
#[cfg(feature = "logging")]
mod logging;
mod metadata;
mod provider;
mod redirect;
mod resolver;
mod security;
pub mod sniff;
mod thumbnail;
mod utils;

pub use classify::{decode_image_size, image_info, link_info, ContentClassifier};
pub use config::{
    ResolverConfig, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_MAX_BINARY_BODY_SIZE,
    DEFAULT_MAX_HTML_BODY_SIZE, DEFAULT_USER_AGENT, DEFAULT_WAIT_TIMEOUT, MAX_REDIRECTS,
};
pub use dialer::{HostLookup, SafeDialer, SystemLookup};
pub use error::PreviewError;
pub use extractor::{HtmlExtractor, MetadataExtractor};
pub use fetcher::{FetchOutcome, FetchedResource, Fetcher};
#[cfg(feature = "logging")]
pub use logging::{log_error_card, log_metadata_card, setup_logging, LogConfig, LogLevelGuard};
pub use metadata::{Metadata, ResourceType};
pub use provider::{
    EndpointEntry, OEmbedRegistry, ProviderEntry, ProviderMatch, ProviderRegistry,
    ProviderResponse,
};
pub use redirect::{FetchState, RedirectDecision, RedirectInterceptor, RedirectShortCircuit};
pub use resolver::{ErrorHook, Resolver, ResolverBuilder};
pub use security::{is_global_unicast, AddressFilter};
pub use thumbnail::backfill_thumbnail;
pub use utils::provider_from_url;

// `ip_network` types appear in `ResolverConfig` and `AddressFilter`.
pub use ip_network::IpNetwork;
